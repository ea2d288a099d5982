//! Checks running in this process.
//!
//! # Responsibilities
//! - Know which backends already have a check here
//! - Hand re-sync requests, with the notifying frontend's mapping, to the
//!   running check
//! - Count active checks
//!
//! Fleet-wide exclusivity is the lease's job; this registry only keeps one
//! process from racing itself.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::mpsc;

use crate::health::notification::NotificationRecord;
use crate::observability::metrics;

/// Registry of running checks keyed by backend URL.
#[derive(Debug, Clone, Default)]
pub struct ActiveChecks {
    inner: Arc<DashMap<String, mpsc::UnboundedSender<NotificationRecord>>>,
}

impl ActiveChecks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the slot for a backend. `None` if a check is already running.
    pub fn register(&self, backend_url: &str) -> Option<Registration> {
        let (tx, rx) = mpsc::unbounded_channel();
        match self.inner.entry(backend_url.to_string()) {
            Entry::Occupied(_) => return None,
            Entry::Vacant(slot) => {
                slot.insert(tx);
            }
        }
        metrics::set_active_checks(self.len());

        Some(Registration {
            checks: self.clone(),
            backend_url: backend_url.to_string(),
            resync: rx,
        })
    }

    pub fn is_active(&self, backend_url: &str) -> bool {
        self.inner.contains_key(backend_url)
    }

    /// Ask the running check for the record's backend to report its next
    /// result unconditionally, to every frontend including this record's.
    /// Returns false when no check runs for the backend.
    pub fn resync(&self, record: &NotificationRecord) -> bool {
        match self.inner.get(&record.backend_url) {
            // A closed receiver means the check is exiting.
            Some(tx) => tx.send(record.clone()).is_ok(),
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

/// A running check's slot. Dropping it frees the slot.
#[derive(Debug)]
pub struct Registration {
    checks: ActiveChecks,
    backend_url: String,
    resync: mpsc::UnboundedReceiver<NotificationRecord>,
}

impl Registration {
    /// Records of the re-syncs that arrived since the last call.
    pub fn take_resync(&mut self) -> Vec<NotificationRecord> {
        let mut records = Vec::new();
        while let Ok(record) = self.resync.try_recv() {
            records.push(record);
        }
        records
    }

    /// Free the slot and return how many checks remain.
    pub fn release(self) -> usize {
        let checks = self.checks.clone();
        drop(self);
        checks.len()
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.checks.inner.remove(&self.backend_url);
        metrics::set_active_checks(self.checks.len());
    }
}
