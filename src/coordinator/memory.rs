//! Test double for the coordination store.
//!
//! Several `MemoryCoordinator`s sharing one `MemoryStore` behave like several
//! checker processes sharing one Redis. Every mutating call is recorded so
//! tests can assert on what reached the store. Compiled for unit tests only.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::coordinator::{Coordinator, CoordinatorError, CoordinatorResult, Presence};
use crate::health::NotificationRecord;

/// A mutating operation that reached the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOp {
    AcquireLease { owner: String, backend_url: String },
    RenewLease { owner: String, backend_url: String },
    ReleaseLease { owner: String, backend_url: String },
    MarkUnhealthy { frontend_key: String, backend_id: u32 },
    MarkHealthy { frontend_key: String, backend_id: u32 },
    Heartbeat { owner: String },
}

#[derive(Debug, Default)]
struct State {
    frontends: HashMap<String, Vec<String>>,
    dead: HashMap<String, HashSet<u32>>,
    leases: HashMap<String, String>,
    ops: Vec<StoreOp>,
    identity: String,
    offline: bool,
    subscribers: HashMap<String, Vec<mpsc::Sender<String>>>,
}

/// Shared in-memory store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        let store = Self::default();
        store.lock().identity = "1".to_string();
        Arc::new(store)
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // A panicking test thread must not hide the store from the others.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register a frontend and its backends (without the identifier slot).
    pub fn set_frontend(&self, frontend_key: &str, backends: &[&str]) {
        self.lock().frontends.insert(
            frontend_key.to_string(),
            backends.iter().map(|b| b.to_string()).collect(),
        );
    }

    pub fn remove_frontend(&self, frontend_key: &str) {
        self.lock().frontends.remove(frontend_key);
    }

    pub fn dead_backends(&self, frontend_key: &str) -> HashSet<u32> {
        self.lock().dead.get(frontend_key).cloned().unwrap_or_default()
    }

    pub fn lease_owner(&self, backend_url: &str) -> Option<String> {
        self.lock().leases.get(backend_url).cloned()
    }

    /// Simulate TTL expiry of a lease.
    pub fn expire_lease(&self, backend_url: &str) {
        self.lock().leases.remove(backend_url);
    }

    /// Simulate a store restart.
    pub fn set_identity(&self, identity: &str) {
        self.lock().identity = identity.to_string();
    }

    /// Make every call fail like an unreachable server.
    pub fn set_offline(&self, offline: bool) {
        self.lock().offline = offline;
    }

    pub fn ops(&self) -> Vec<StoreOp> {
        self.lock().ops.clone()
    }

    /// Deliver a payload to every live subscriber of a channel.
    pub fn publish(&self, channel: &str, payload: &str) -> usize {
        let mut state = self.lock();
        let Some(subscribers) = state.subscribers.get_mut(channel) else {
            return 0;
        };
        subscribers.retain(|tx| tx.try_send(payload.to_string()).is_ok());
        subscribers.len()
    }

    /// Drop every subscription, as a lost pub/sub connection would.
    pub fn close_subscriptions(&self) {
        self.lock().subscribers.clear();
    }

    fn online(&self) -> CoordinatorResult<MutexGuard<'_, State>> {
        let state = self.lock();
        if state.offline {
            return Err(CoordinatorError::ConnectionFailed {
                url: "memory://".to_string(),
                reason: "store offline".to_string(),
            });
        }
        Ok(state)
    }
}

/// One process's view of a `MemoryStore`.
#[derive(Debug, Clone)]
pub struct MemoryCoordinator {
    store: Arc<MemoryStore>,
    owner: String,
}

impl MemoryCoordinator {
    pub fn new(store: Arc<MemoryStore>, owner: impl Into<String>) -> Self {
        Self {
            store,
            owner: owner.into(),
        }
    }

    fn mark(&self, target: &NotificationRecord, dead: bool) -> CoordinatorResult<bool> {
        let mut state = self.store.online()?;
        let listed = state
            .frontends
            .get(&target.frontend_key)
            .and_then(|backends| backends.get(target.backend_id as usize))
            .is_some_and(|url| url.trim_end_matches('/') == target.backend_url);
        if !listed {
            return Ok(false);
        }

        let frontend_key = target.frontend_key.clone();
        let backend_id = target.backend_id;
        if dead {
            state.dead.entry(frontend_key.clone()).or_default().insert(backend_id);
            state.ops.push(StoreOp::MarkUnhealthy { frontend_key, backend_id });
        } else {
            if let Some(ids) = state.dead.get_mut(&frontend_key) {
                ids.remove(&backend_id);
            }
            state.ops.push(StoreOp::MarkHealthy { frontend_key, backend_id });
        }
        Ok(true)
    }
}

#[async_trait]
impl Coordinator for MemoryCoordinator {
    async fn acquire_lease(&self, backend_url: &str) -> CoordinatorResult<bool> {
        let mut state = self.store.online()?;
        state.ops.push(StoreOp::AcquireLease {
            owner: self.owner.clone(),
            backend_url: backend_url.to_string(),
        });
        if state.leases.contains_key(backend_url) {
            return Ok(false);
        }
        state.leases.insert(backend_url.to_string(), self.owner.clone());
        Ok(true)
    }

    async fn is_lease_lost(&self, backend_url: &str) -> CoordinatorResult<bool> {
        let mut state = self.store.online()?;
        let owned = state.leases.get(backend_url) == Some(&self.owner);
        if owned {
            state.ops.push(StoreOp::RenewLease {
                owner: self.owner.clone(),
                backend_url: backend_url.to_string(),
            });
        }
        Ok(!owned)
    }

    async fn release_lease(&self, backend_url: &str) -> CoordinatorResult<()> {
        let mut state = self.store.online()?;
        if state.leases.get(backend_url) == Some(&self.owner) {
            state.leases.remove(backend_url);
            state.ops.push(StoreOp::ReleaseLease {
                owner: self.owner.clone(),
                backend_url: backend_url.to_string(),
            });
        }
        Ok(())
    }

    async fn mark_unhealthy(&self, target: &NotificationRecord) -> CoordinatorResult<bool> {
        self.mark(target, true)
    }

    async fn mark_healthy(&self, target: &NotificationRecord) -> CoordinatorResult<bool> {
        self.mark(target, false)
    }

    async fn heartbeat(&self, _presence: &Presence) -> CoordinatorResult<()> {
        let mut state = self.store.online()?;
        state.ops.push(StoreOp::Heartbeat {
            owner: self.owner.clone(),
        });
        Ok(())
    }

    async fn subscribe(&self, channel: &str) -> CoordinatorResult<mpsc::Receiver<String>> {
        let mut state = self.store.online()?;
        let (tx, rx) = mpsc::channel(64);
        state.subscribers.entry(channel.to_string()).or_default().push(tx);
        Ok(rx)
    }

    async fn store_identity(&self) -> CoordinatorResult<String> {
        Ok(self.store.online()?.identity.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(frontend: &str, url: &str, id: u32) -> NotificationRecord {
        NotificationRecord {
            frontend_key: frontend.into(),
            backend_url: url.into(),
            backend_id: id,
            group_length: 2,
        }
    }

    #[tokio::test]
    async fn test_lease_is_exclusive_across_owners() {
        let store = MemoryStore::new();
        let a = MemoryCoordinator::new(store.clone(), "a");
        let b = MemoryCoordinator::new(store.clone(), "b");

        assert!(a.acquire_lease("http://x:80").await.unwrap());
        assert!(!b.acquire_lease("http://x:80").await.unwrap());
        assert!(!a.is_lease_lost("http://x:80").await.unwrap());
        assert!(b.is_lease_lost("http://x:80").await.unwrap());

        // Releasing someone else's lease is a no-op.
        b.release_lease("http://x:80").await.unwrap();
        assert_eq!(store.lease_owner("http://x:80"), Some("a".into()));

        a.release_lease("http://x:80").await.unwrap();
        a.release_lease("http://x:80").await.unwrap();
        assert!(b.acquire_lease("http://x:80").await.unwrap());
    }

    #[tokio::test]
    async fn test_mark_requires_listed_backend() {
        let store = MemoryStore::new();
        store.set_frontend("www", &["http://a:80/", "http://b:80"]);
        let coordinator = MemoryCoordinator::new(store.clone(), "a");

        assert!(coordinator.mark_unhealthy(&target("www", "http://a:80", 0)).await.unwrap());
        assert!(coordinator.mark_unhealthy(&target("www", "http://b:80", 1)).await.unwrap());
        assert_eq!(store.dead_backends("www"), HashSet::from([0, 1]));

        assert!(coordinator.mark_healthy(&target("www", "http://a:80", 0)).await.unwrap());
        assert_eq!(store.dead_backends("www"), HashSet::from([1]));

        // Wrong slot, unknown frontend.
        assert!(!coordinator.mark_unhealthy(&target("www", "http://a:80", 1)).await.unwrap());
        assert!(!coordinator.mark_unhealthy(&target("api", "http://a:80", 0)).await.unwrap());
    }

    #[tokio::test]
    async fn test_publish_reaches_subscribers() {
        let store = MemoryStore::new();
        let coordinator = MemoryCoordinator::new(store.clone(), "a");
        let mut rx = coordinator.subscribe("dead").await.unwrap();

        assert_eq!(store.publish("dead", "line"), 1);
        assert_eq!(rx.recv().await.as_deref(), Some("line"));

        store.close_subscriptions();
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_offline_store_fails_calls() {
        let store = MemoryStore::new();
        let coordinator = MemoryCoordinator::new(store.clone(), "a");
        store.set_offline(true);
        assert!(coordinator.acquire_lease("http://x:80").await.is_err());
        assert!(coordinator.store_identity().await.is_err());
    }
}
