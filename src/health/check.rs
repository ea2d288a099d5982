//! Per-backend check loop.
//!
//! # Responsibilities
//! - Probe one backend on a fixed cadence
//! - Report transitions and refreshes to every frontend listing the backend
//! - Decide when to stop: lease lost, backend gone, stable and healthy
//! - Release the lease and the local slot on the way out

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{self, Instant};

use crate::config::CheckConfig;
use crate::coordinator::Coordinator;
use crate::health::notification::NotificationRecord;
use crate::health::probe::{classify, Prober};
use crate::health::registry::Registration;
use crate::health::state::{CheckState, CheckStatus, ExitReason, Timings, Transition};
use crate::observability::metrics;

/// Settings shared by every check of a process.
#[derive(Debug, Clone)]
pub struct CheckSettings {
    pub timings: Timings,
    pub dry_run: bool,
}

impl CheckSettings {
    pub fn new(config: &CheckConfig, dry_run: bool) -> Self {
        Self {
            timings: Timings {
                poll_interval: Duration::from_secs(config.interval_secs),
                break_interval: Duration::from_secs(config.break_interval_secs),
                stable_duration: Duration::from_secs(config.duration_secs),
                unhealthy_refresh: Duration::from_secs(config.unhealthy_refresh_secs),
            },
            dry_run,
        }
    }
}

/// A running check on one backend, reporting to every frontend that lists it.
pub struct Check {
    backend_url: String,
    /// One record per (frontend, backend id) mapping being maintained.
    mappings: Vec<NotificationRecord>,
    state: CheckState,
    dry_run: bool,
    coordinator: Arc<dyn Coordinator>,
    prober: Arc<dyn Prober>,
    registration: Registration,
}

impl Check {
    /// The caller must already hold the backend's lease.
    pub fn new(
        target: NotificationRecord,
        settings: &CheckSettings,
        coordinator: Arc<dyn Coordinator>,
        prober: Arc<dyn Prober>,
        registration: Registration,
    ) -> Self {
        Self {
            backend_url: target.backend_url.clone(),
            mappings: vec![target],
            state: CheckState::new(settings.timings, Instant::now()),
            dry_run: settings.dry_run,
            coordinator,
            prober,
            registration,
        }
    }

    /// Poll until a terminal condition, then clean up.
    pub async fn run(mut self) -> ExitReason {
        let reason = self.poll().await;

        let Check {
            backend_url,
            coordinator,
            registration,
            ..
        } = self;
        // Lease first: while the slot is held, a new notification for this
        // backend is not mistaken for another process's incident.
        if let Err(e) = coordinator.release_lease(&backend_url).await {
            // The lease expires on its own.
            tracing::warn!(error = %e, "Failed to release lease");
        }
        let remaining = registration.release();

        metrics::record_exit(reason);
        tracing::info!(
            reason = %reason,
            active_checks = remaining,
            "Removed check for backend"
        );
        reason
    }

    async fn poll(&mut self) -> ExitReason {
        loop {
            let resyncs = self.registration.take_resync();
            if !resyncs.is_empty() {
                tracing::debug!("Re-sync requested, reporting next result");
                self.adopt(resyncs);
                self.state.resync();
            }

            tracing::debug!(
                poll = self.state.poll_count() + 1,
                in_state_secs = self.state.time_in_state(Instant::now()).as_secs(),
                "Checking backend"
            );
            let result = self.prober.probe(&self.backend_url).await;
            match &result {
                Ok(status) => tracing::debug!(status = status.as_u16(), "Response from backend"),
                Err(e) => tracing::info!(error = %e, "Backend unreachable"),
            }

            let status = classify(&result);
            match self.state.observe(status, Instant::now()) {
                Transition::Report(status) => {
                    metrics::record_transition(status);
                    if !self.flag(status).await {
                        return ExitReason::BackendGone;
                    }
                }
                Transition::RefreshUnhealthy => {
                    if !self.flag(CheckStatus::Unhealthy).await {
                        return ExitReason::BackendGone;
                    }
                }
                Transition::Steady => {}
            }

            time::sleep(self.state.timings().poll_interval).await;

            if self.state.tick(Instant::now()) {
                if self.lease_lost().await {
                    tracing::info!("Lost the lease on backend");
                    return ExitReason::LeaseLost;
                }
                if self.state.is_stable_healthy(Instant::now()) {
                    tracing::info!("Backend state is stable and healthy");
                    return ExitReason::StableHealthy;
                }
            }
        }
    }

    /// Start maintaining mappings announced by other frontends.
    fn adopt(&mut self, records: Vec<NotificationRecord>) {
        for record in records {
            let known = self.mappings.iter().any(|m| {
                m.frontend_key == record.frontend_key && m.backend_id == record.backend_id
            });
            if !known {
                tracing::info!(
                    frontend = %record.frontend_key,
                    backend_id = record.backend_id,
                    "Added frontend to check"
                );
                self.mappings.push(record);
            }
        }
    }

    /// Write the flag for every mapping. A mapping whose frontend no longer
    /// lists the backend is dropped; transport failures keep it for the next
    /// refresh or transition. Returns false once no mapping is left.
    async fn flag(&mut self, status: CheckStatus) -> bool {
        let mut kept = Vec::with_capacity(self.mappings.len());
        for target in std::mem::take(&mut self.mappings) {
            let result = match status {
                CheckStatus::Healthy => self.coordinator.mark_healthy(&target).await,
                CheckStatus::Unhealthy => self.coordinator.mark_unhealthy(&target).await,
            };

            match result {
                Ok(true) => {
                    tracing::info!(
                        frontend = %target.frontend_key,
                        backend_id = target.backend_id,
                        status = %status,
                        dry_run = self.dry_run,
                        "Flagging backend"
                    );
                    kept.push(target);
                }
                Ok(false) => {
                    tracing::warn!(
                        frontend = %target.frontend_key,
                        backend_id = target.backend_id,
                        "Backend not found in frontend"
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        frontend = %target.frontend_key,
                        status = %status,
                        error = %e,
                        "Failed to flag backend"
                    );
                    kept.push(target);
                }
            }
        }
        self.mappings = kept;
        !self.mappings.is_empty()
    }

    async fn lease_lost(&self) -> bool {
        match self.coordinator.is_lease_lost(&self.backend_url).await {
            Ok(lost) => lost,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to verify lease");
                false
            }
        }
    }
}
