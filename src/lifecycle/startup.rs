//! Startup orchestration.
//!
//! # Responsibilities
//! - Connect to the store and subscribe to the dead channel
//! - Wire dispatcher, checks and supervisor together
//! - Race the supervisor against the dispatcher and the interrupt
//!
//! # Design Decisions
//! - Fail fast: connect and subscribe errors are fatal
//! - The initial store identity is best effort; the supervisor records the
//!   first one it sees

use std::net::SocketAddr;
use std::sync::Arc;

use crate::config::CheckerConfig;
use crate::coordinator::{Coordinator, DryRunCoordinator, RedisCoordinator, StoreSettings};
use crate::dispatcher::Dispatcher;
use crate::error::CheckerError;
use crate::health::{ActiveChecks, CheckSettings, HttpProber};
use crate::lifecycle::signals;
use crate::lifecycle::supervisor::{IdentityWatch, Supervisor};
use crate::observability::metrics;

/// `hostname#pid`, unique per process across the fleet.
pub fn instance_id() -> String {
    let host = std::env::var("HOSTNAME")
        .ok()
        .or_else(|| std::fs::read_to_string("/etc/hostname").ok())
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "localhost".to_string());
    format!("{}#{}", host, std::process::id())
}

/// Run until interrupted (`Ok`) or until the process can no longer do its
/// job (`Err`).
pub async fn run(config: CheckerConfig) -> Result<(), CheckerError> {
    let instance = config.instance_id.clone().unwrap_or_else(instance_id);
    tracing::info!(
        instance = %instance,
        store = %config.store.url,
        channel = %config.store.channel,
        method = %config.probe.method,
        path = %config.probe.path,
        host = %config.probe.host,
        interval_secs = config.check.interval_secs,
        dry_run = config.dry_run,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        let addr: SocketAddr = config
            .observability
            .metrics_address
            .parse()
            .map_err(|e: std::net::AddrParseError| CheckerError::Metrics(e.to_string()))?;
        metrics::init_metrics(addr).map_err(CheckerError::Metrics)?;
    }

    let prober = Arc::new(HttpProber::new(&config.probe)?);

    let store = RedisCoordinator::connect(&config.store.url, instance.clone(), StoreSettings::from(&config.store)).await?;
    let store: Arc<dyn Coordinator> = Arc::new(store);

    let initial_identity = match store.store_identity().await {
        Ok(identity) => {
            tracing::info!(identity = %identity, "Store identity");
            Some(identity)
        }
        Err(e) => {
            tracing::warn!(error = %e, "Store identity unavailable");
            None
        }
    };

    let coordinator: Arc<dyn Coordinator> = if config.dry_run {
        tracing::warn!("Dry run: the store will not be modified");
        Arc::new(DryRunCoordinator::new(store))
    } else {
        store
    };

    let channel = config.store.channel.clone();
    let lines = coordinator.subscribe(&channel).await?;

    let checks = ActiveChecks::new();
    let dispatcher = Dispatcher::new(
        coordinator.clone(),
        prober,
        checks.clone(),
        CheckSettings::new(&config.check, config.dry_run),
        instance.clone(),
    );
    let dispatch_channel = channel.clone();
    let mut dispatch = tokio::spawn(async move { dispatcher.run(lines, &dispatch_channel).await });

    let supervisor = Supervisor::new(
        coordinator,
        checks,
        &config.supervisor,
        IdentityWatch::new(initial_identity),
        instance,
        config.dry_run,
    );

    tokio::select! {
        result = supervisor.run() => result,
        joined = &mut dispatch => match joined {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(error = %e, "Dispatcher task failed");
                Err(CheckerError::SubscriptionClosed(channel))
            }
        },
        _ = signals::interrupted() => Ok(()),
    }
}
