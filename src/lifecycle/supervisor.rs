//! Periodic process upkeep: presence heartbeat and store identity.
//!
//! A store that restarts loses every lease and dead record, and the
//! subscription silently points at a fresh server. The process cannot
//! repair that in place, so an identity change ends it.

use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::config::SupervisorConfig;
use crate::coordinator::{Coordinator, Presence};
use crate::error::CheckerError;
use crate::health::ActiveChecks;

/// Remembers the first store identity seen and flags any later change.
#[derive(Debug, Default)]
pub struct IdentityWatch {
    known: Option<String>,
}

impl IdentityWatch {
    pub fn new(initial: Option<String>) -> Self {
        Self { known: initial }
    }

    pub fn known(&self) -> Option<&str> {
        self.known.as_deref()
    }

    pub fn observe(&mut self, current: String) -> Result<(), CheckerError> {
        match &self.known {
            None => {
                tracing::info!(identity = %current, "Store identity recorded");
                self.known = Some(current);
                Ok(())
            }
            Some(previous) if *previous == current => Ok(()),
            Some(previous) => Err(CheckerError::StoreRestarted {
                previous: previous.clone(),
                current,
            }),
        }
    }
}

pub struct Supervisor {
    coordinator: Arc<dyn Coordinator>,
    checks: ActiveChecks,
    identity: IdentityWatch,
    heartbeat_interval: Duration,
    identity_interval: Duration,
    instance_id: String,
    dry_run: bool,
}

impl Supervisor {
    pub fn new(
        coordinator: Arc<dyn Coordinator>,
        checks: ActiveChecks,
        config: &SupervisorConfig,
        identity: IdentityWatch,
        instance_id: impl Into<String>,
        dry_run: bool,
    ) -> Self {
        Self {
            coordinator,
            checks,
            identity,
            heartbeat_interval: Duration::from_secs(config.heartbeat_interval_secs),
            identity_interval: Duration::from_secs(config.identity_interval_secs),
            instance_id: instance_id.into(),
            dry_run,
        }
    }

    /// Runs until the store identity changes.
    pub async fn run(mut self) -> Result<(), CheckerError> {
        let mut heartbeat = time::interval(self.heartbeat_interval);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut identity = time::interval_at(Instant::now() + self.identity_interval, self.identity_interval);
        identity.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = heartbeat.tick() => self.heartbeat().await,
                _ = identity.tick() => {
                    self.check_identity().await?;
                    self.log_status();
                }
            }
        }
    }

    async fn heartbeat(&self) {
        if self.dry_run {
            return;
        }
        let presence = Presence {
            instance_id: self.instance_id.clone(),
            version: env!("CARGO_PKG_VERSION"),
            active_checks: self.checks.len(),
            dry_run: self.dry_run,
        };
        if let Err(e) = self.coordinator.heartbeat(&presence).await {
            tracing::warn!(error = %e, "Failed to send heartbeat");
        }
    }

    async fn check_identity(&mut self) -> Result<(), CheckerError> {
        match self.coordinator.store_identity().await {
            Ok(current) => self.identity.observe(current).inspect_err(|e| {
                tracing::error!(error = %e, "Store identity changed");
            }),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read store identity");
                Ok(())
            }
        }
    }

    fn log_status(&self) {
        let runtime = Handle::current().metrics();
        tracing::info!(
            instance = %self.instance_id,
            active_checks = self.checks.len(),
            tasks = runtime.num_alive_tasks(),
            workers = runtime.num_workers(),
            identity = self.identity.known().unwrap_or("unknown"),
            dry_run = self.dry_run,
            "Status"
        );
    }
}
