//! Shared in-process store standing in for Redis in integration tests.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;

use health_checker::coordinator::{Coordinator, CoordinatorResult, Presence};
use health_checker::health::NotificationRecord;

#[derive(Default)]
struct State {
    frontends: HashMap<String, Vec<String>>,
    dead: HashMap<String, HashSet<u32>>,
    leases: HashMap<String, String>,
    lease_requests: usize,
    subscribers: Vec<mpsc::Sender<String>>,
}

#[derive(Default)]
pub struct FakeStore {
    state: Mutex<State>,
}

impl FakeStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_frontend(&self, frontend_key: &str, backends: &[&str]) {
        self.state.lock().unwrap().frontends.insert(
            frontend_key.to_string(),
            backends.iter().map(|b| b.to_string()).collect(),
        );
    }

    pub fn dead_backends(&self, frontend_key: &str) -> HashSet<u32> {
        self.state
            .lock()
            .unwrap()
            .dead
            .get(frontend_key)
            .cloned()
            .unwrap_or_default()
    }

    pub fn lease_owner(&self, backend_url: &str) -> Option<String> {
        self.state.lock().unwrap().leases.get(backend_url).cloned()
    }

    pub fn lease_requests(&self) -> usize {
        self.state.lock().unwrap().lease_requests
    }

    pub fn publish(&self, payload: &str) {
        let mut state = self.state.lock().unwrap();
        state
            .subscribers
            .retain(|tx| tx.try_send(payload.to_string()).is_ok());
    }

    pub fn close_subscriptions(&self) {
        self.state.lock().unwrap().subscribers.clear();
    }
}

/// One process's connection to a `FakeStore`.
pub struct FakeCoordinator {
    store: Arc<FakeStore>,
    owner: String,
}

impl FakeCoordinator {
    pub fn new(store: Arc<FakeStore>, owner: &str) -> Self {
        Self {
            store,
            owner: owner.to_string(),
        }
    }

    fn mark(&self, target: &NotificationRecord, dead: bool) -> bool {
        let mut state = self.store.state.lock().unwrap();
        let listed = state
            .frontends
            .get(&target.frontend_key)
            .and_then(|backends| backends.get(target.backend_id as usize))
            .is_some_and(|url| url.trim_end_matches('/') == target.backend_url);
        if listed {
            let ids = state.dead.entry(target.frontend_key.clone()).or_default();
            if dead {
                ids.insert(target.backend_id);
            } else {
                ids.remove(&target.backend_id);
            }
        }
        listed
    }
}

#[async_trait]
impl Coordinator for FakeCoordinator {
    async fn acquire_lease(&self, backend_url: &str) -> CoordinatorResult<bool> {
        let mut state = self.store.state.lock().unwrap();
        state.lease_requests += 1;
        if state.leases.contains_key(backend_url) {
            return Ok(false);
        }
        state.leases.insert(backend_url.to_string(), self.owner.clone());
        Ok(true)
    }

    async fn is_lease_lost(&self, backend_url: &str) -> CoordinatorResult<bool> {
        Ok(self.store.lease_owner(backend_url).as_deref() != Some(self.owner.as_str()))
    }

    async fn release_lease(&self, backend_url: &str) -> CoordinatorResult<()> {
        let mut state = self.store.state.lock().unwrap();
        if state.leases.get(backend_url) == Some(&self.owner) {
            state.leases.remove(backend_url);
        }
        Ok(())
    }

    async fn mark_unhealthy(&self, target: &NotificationRecord) -> CoordinatorResult<bool> {
        Ok(self.mark(target, true))
    }

    async fn mark_healthy(&self, target: &NotificationRecord) -> CoordinatorResult<bool> {
        Ok(self.mark(target, false))
    }

    async fn heartbeat(&self, _presence: &Presence) -> CoordinatorResult<()> {
        Ok(())
    }

    async fn subscribe(&self, _channel: &str) -> CoordinatorResult<mpsc::Receiver<String>> {
        let (tx, rx) = mpsc::channel(64);
        self.store.state.lock().unwrap().subscribers.push(tx);
        Ok(rx)
    }

    async fn store_identity(&self) -> CoordinatorResult<String> {
        Ok("1".to_string())
    }
}
