//! Simulation mode.
//!
//! Reads (store identity, the dead channel) go to the real store. Nothing is
//! ever written: leases live in this process only, flags report the backend
//! as found, heartbeats are dropped.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashSet;
use tokio::sync::mpsc;

use crate::coordinator::{Coordinator, CoordinatorResult, Presence};
use crate::health::NotificationRecord;

pub struct DryRunCoordinator {
    inner: Arc<dyn Coordinator>,
    leases: DashSet<String>,
}

impl DryRunCoordinator {
    pub fn new(inner: Arc<dyn Coordinator>) -> Self {
        Self {
            inner,
            leases: DashSet::new(),
        }
    }
}

#[async_trait]
impl Coordinator for DryRunCoordinator {
    async fn acquire_lease(&self, backend_url: &str) -> CoordinatorResult<bool> {
        Ok(self.leases.insert(backend_url.to_string()))
    }

    async fn is_lease_lost(&self, backend_url: &str) -> CoordinatorResult<bool> {
        Ok(!self.leases.contains(backend_url))
    }

    async fn release_lease(&self, backend_url: &str) -> CoordinatorResult<()> {
        self.leases.remove(backend_url);
        Ok(())
    }

    async fn mark_unhealthy(&self, _target: &NotificationRecord) -> CoordinatorResult<bool> {
        Ok(true)
    }

    async fn mark_healthy(&self, _target: &NotificationRecord) -> CoordinatorResult<bool> {
        Ok(true)
    }

    async fn heartbeat(&self, _presence: &Presence) -> CoordinatorResult<()> {
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> CoordinatorResult<mpsc::Receiver<String>> {
        self.inner.subscribe(channel).await
    }

    async fn store_identity(&self) -> CoordinatorResult<String> {
        self.inner.store_identity().await
    }
}
