//! Redis-backed coordinator.
//!
//! Leases are plain keys written with `SET NX PX`; renewal, release and the
//! dead/alive flags run as Lua scripts so that each check-then-write is a
//! single atomic step on the server.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use redis::{aio::MultiplexedConnection, AsyncCommands, Client, Script};
use tokio::sync::mpsc;

use crate::config::StoreConfig;
use crate::coordinator::{keys, Coordinator, CoordinatorError, CoordinatorResult, Presence};
use crate::health::NotificationRecord;

/// Messages buffered between the pub/sub connection and the dispatcher.
const SUBSCRIPTION_BUFFER: usize = 1024;

/// KEYS[1] lease, ARGV[1] owner, ARGV[2] ttl ms.
const RENEW_LEASE: &str = r#"
if redis.call('GET', KEYS[1]) == ARGV[1] then
    redis.call('PEXPIRE', KEYS[1], ARGV[2])
    return 1
end
return 0
"#;

/// KEYS[1] lease, ARGV[1] owner.
const RELEASE_LEASE: &str = r#"
if redis.call('GET', KEYS[1]) == ARGV[1] then
    return redis.call('DEL', KEYS[1])
end
return 0
"#;

/// KEYS[1] frontend list, KEYS[2] dead set.
/// ARGV[1] list index, ARGV[2] backend origin, ARGV[3] backend id,
/// ARGV[4] "1" to flag dead / "0" to clear, ARGV[5] dead ttl seconds.
const MARK_BACKEND: &str = r#"
local listed = redis.call('LINDEX', KEYS[1], ARGV[1])
if not listed then
    return 0
end
listed = string.gsub(listed, '/+$', '')
if listed ~= ARGV[2] then
    return 0
end
if ARGV[4] == '1' then
    redis.call('SADD', KEYS[2], ARGV[3])
    redis.call('EXPIRE', KEYS[2], ARGV[5])
else
    redis.call('SREM', KEYS[2], ARGV[3])
end
return 1
"#;

/// TTLs applied to the keys this process writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreSettings {
    pub lease_ttl: Duration,
    pub dead_ttl: Duration,
    pub heartbeat_ttl: Duration,
}

impl From<&StoreConfig> for StoreSettings {
    fn from(config: &StoreConfig) -> Self {
        Self {
            lease_ttl: Duration::from_secs(config.lease_ttl_secs),
            dead_ttl: Duration::from_secs(config.dead_ttl_secs),
            heartbeat_ttl: Duration::from_secs(config.heartbeat_ttl_secs),
        }
    }
}

/// Coordinator talking to a Redis server.
pub struct RedisCoordinator {
    client: Client,
    connection: MultiplexedConnection,
    url: String,
    instance_id: String,
    settings: StoreSettings,
    renew_lease: Script,
    release_lease: Script,
    mark_backend: Script,
}

impl RedisCoordinator {
    /// Connect to the store. Failing here is fatal for the process.
    pub async fn connect(
        url: &str,
        instance_id: impl Into<String>,
        settings: StoreSettings,
    ) -> CoordinatorResult<Self> {
        let connection_failed = |e: redis::RedisError| CoordinatorError::ConnectionFailed {
            url: url.to_string(),
            reason: e.to_string(),
        };

        let client = Client::open(url).map_err(connection_failed)?;
        let connection = client
            .get_multiplexed_async_connection()
            .await
            .map_err(connection_failed)?;

        tracing::info!(url = %url, "Connected to store");

        Ok(Self {
            client,
            connection,
            url: url.to_string(),
            instance_id: instance_id.into(),
            settings,
            renew_lease: Script::new(RENEW_LEASE),
            release_lease: Script::new(RELEASE_LEASE),
            mark_backend: Script::new(MARK_BACKEND),
        })
    }

    async fn mark(&self, target: &NotificationRecord, dead: bool) -> CoordinatorResult<bool> {
        let mut conn = self.connection.clone();
        let (script_keys, args) = mark_arguments(target, dead, self.settings.dead_ttl);
        let mut invocation = self.mark_backend.prepare_invoke();
        for key in &script_keys {
            invocation.key(key);
        }
        for arg in &args {
            invocation.arg(arg);
        }
        let found: i64 = invocation.invoke_async(&mut conn).await?;
        Ok(found == 1)
    }
}

#[async_trait]
impl Coordinator for RedisCoordinator {
    async fn acquire_lease(&self, backend_url: &str) -> CoordinatorResult<bool> {
        let mut conn = self.connection.clone();
        let reply: Option<String> = redis::cmd("SET")
            .arg(keys::lease(backend_url))
            .arg(&self.instance_id)
            .arg("NX")
            .arg("PX")
            .arg(self.settings.lease_ttl.as_millis() as u64)
            .query_async(&mut conn)
            .await?;
        Ok(reply.is_some())
    }

    async fn is_lease_lost(&self, backend_url: &str) -> CoordinatorResult<bool> {
        let mut conn = self.connection.clone();
        let renewed: i64 = self
            .renew_lease
            .key(keys::lease(backend_url))
            .arg(&self.instance_id)
            .arg(self.settings.lease_ttl.as_millis() as u64)
            .invoke_async(&mut conn)
            .await?;
        Ok(renewed == 0)
    }

    async fn release_lease(&self, backend_url: &str) -> CoordinatorResult<()> {
        let mut conn = self.connection.clone();
        let _deleted: i64 = self
            .release_lease
            .key(keys::lease(backend_url))
            .arg(&self.instance_id)
            .invoke_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn mark_unhealthy(&self, target: &NotificationRecord) -> CoordinatorResult<bool> {
        self.mark(target, true).await
    }

    async fn mark_healthy(&self, target: &NotificationRecord) -> CoordinatorResult<bool> {
        self.mark(target, false).await
    }

    async fn heartbeat(&self, presence: &Presence) -> CoordinatorResult<()> {
        let mut conn = self.connection.clone();
        let payload = serde_json::to_string(presence)?;
        let _: () = conn
            .set_ex(
                keys::presence(&presence.instance_id),
                payload,
                self.settings.heartbeat_ttl.as_secs(),
            )
            .await?;
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> CoordinatorResult<mpsc::Receiver<String>> {
        let mut pubsub = self.client.get_async_pubsub().await.map_err(|e| {
            CoordinatorError::ConnectionFailed {
                url: self.url.clone(),
                reason: e.to_string(),
            }
        })?;
        pubsub.subscribe(channel).await?;
        tracing::info!(channel = %channel, "Subscribed to channel");

        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
        let channel = channel.to_string();
        tokio::spawn(async move {
            let mut messages = Box::pin(pubsub.into_on_message());
            while let Some(msg) = messages.next().await {
                match msg.get_payload::<String>() {
                    Ok(payload) => {
                        if tx.send(payload).await.is_err() {
                            return;
                        }
                    }
                    Err(e) => {
                        tracing::warn!(channel = %channel, error = %e, "Dropping undecodable message");
                    }
                }
            }
            tracing::error!(channel = %channel, "Subscription stream ended");
        });

        Ok(rx)
    }

    async fn store_identity(&self) -> CoordinatorResult<String> {
        let mut conn = self.connection.clone();
        let info: String = redis::cmd("INFO").arg("server").query_async(&mut conn).await?;
        parse_process_id(&info).ok_or_else(|| {
            CoordinatorError::IdentityUnavailable("no process_id in INFO server".to_string())
        })
    }
}

/// KEYS and ARGV for `MARK_BACKEND`, in script order.
fn mark_arguments(target: &NotificationRecord, dead: bool, dead_ttl: Duration) -> ([String; 2], [String; 5]) {
    (
        [keys::frontend(&target.frontend_key), keys::dead(&target.frontend_key)],
        [
            keys::frontend_index(target.backend_id).to_string(),
            target.backend_url.clone(),
            target.backend_id.to_string(),
            if dead { "1" } else { "0" }.to_string(),
            dead_ttl.as_secs().to_string(),
        ],
    )
}

/// Extract `process_id` from an `INFO` reply.
fn parse_process_id(info: &str) -> Option<String> {
    info.lines()
        .find_map(|line| line.trim().strip_prefix("process_id:"))
        .map(|pid| pid.trim().to_string())
        .filter(|pid| !pid.is_empty())
}
