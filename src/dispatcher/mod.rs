//! Turns dead channel lines into running checks.
//!
//! # Data Flow
//! ```text
//! subscription (mpsc) → parse → filter → local registry → lease → spawn Check
//! ```
//!
//! Lines are handled one at a time, so the registry claim and the lease
//! acquire for a backend never interleave within this process.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::coordinator::Coordinator;
use crate::error::CheckerError;
use crate::health::{ActiveChecks, Check, CheckSettings, ExitReason, NotificationRecord, Prober};
use crate::observability::metrics;

/// What happened to one notification.
#[derive(Debug)]
pub enum Dispatch {
    /// Malformed line, dropped.
    Invalid,
    /// Single-backend frontend, nothing to fail over to.
    Ignored,
    /// A check already runs here; it will report its next result.
    Resynced,
    /// Another process owns the backend.
    LeaseHeld,
    /// The lease could not be requested; the next notification retries.
    StoreError,
    Spawned(JoinHandle<ExitReason>),
}

impl Dispatch {
    pub fn outcome(&self) -> &'static str {
        match self {
            Dispatch::Invalid => "invalid",
            Dispatch::Ignored => "ignored",
            Dispatch::Resynced => "resynced",
            Dispatch::LeaseHeld => "lease_held",
            Dispatch::StoreError => "store_error",
            Dispatch::Spawned(_) => "spawned",
        }
    }
}

pub struct Dispatcher {
    coordinator: Arc<dyn Coordinator>,
    prober: Arc<dyn Prober>,
    checks: ActiveChecks,
    settings: CheckSettings,
    instance_id: String,
}

impl Dispatcher {
    pub fn new(
        coordinator: Arc<dyn Coordinator>,
        prober: Arc<dyn Prober>,
        checks: ActiveChecks,
        settings: CheckSettings,
        instance_id: impl Into<String>,
    ) -> Self {
        Self {
            coordinator,
            prober,
            checks,
            settings,
            instance_id: instance_id.into(),
        }
    }

    /// Consume the subscription until it closes. A closed subscription means
    /// the process can no longer learn about incidents, so it is an error.
    pub async fn run(self, mut lines: mpsc::Receiver<String>, channel: &str) -> Result<(), CheckerError> {
        tracing::info!(channel, "Waiting for dead backend notifications");
        while let Some(line) = lines.recv().await {
            self.dispatch_line(&line).await;
        }
        tracing::error!(channel, "Subscription closed");
        Err(CheckerError::SubscriptionClosed(channel.to_string()))
    }

    pub async fn dispatch_line(&self, line: &str) -> Dispatch {
        let outcome = match line.parse::<NotificationRecord>() {
            Ok(record) => self.dispatch(record).await,
            Err(e) => {
                tracing::warn!(error = %e, payload = line, "Invalid notification");
                Dispatch::Invalid
            }
        };
        metrics::record_notification(outcome.outcome());
        outcome
    }

    pub async fn dispatch(&self, record: NotificationRecord) -> Dispatch {
        if !record.is_checkable() {
            tracing::debug!(
                frontend = %record.frontend_key,
                backend = %record.backend_url,
                group_length = record.group_length,
                "Ignoring backend of single-backend frontend"
            );
            return Dispatch::Ignored;
        }

        let Some(registration) = self.checks.register(&record.backend_url) else {
            // The running check also takes over this record's frontend.
            self.checks.resync(&record);
            tracing::debug!(
                frontend = %record.frontend_key,
                backend = %record.backend_url,
                "Check already running, re-sync sent"
            );
            return Dispatch::Resynced;
        };

        match self.coordinator.acquire_lease(&record.backend_url).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::debug!(backend = %record.backend_url, "Backend is checked by another process");
                return Dispatch::LeaseHeld;
            }
            Err(e) => {
                tracing::warn!(backend = %record.backend_url, error = %e, "Failed to acquire lease");
                return Dispatch::StoreError;
            }
        }

        let span = tracing::info_span!(
            "check",
            instance = %self.instance_id,
            frontend = %record.frontend_key,
            backend = %record.backend_url,
        );
        span.in_scope(|| {
            tracing::info!(
                backend_id = record.backend_id,
                active_checks = self.checks.len(),
                "Added check for backend"
            )
        });

        let check = Check::new(
            record,
            &self.settings,
            self.coordinator.clone(),
            self.prober.clone(),
            registration,
        );
        Dispatch::Spawned(tokio::spawn(check.run().instrument(span)))
    }
}
