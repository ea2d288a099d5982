//! Coordination store subsystem.
//!
//! # Data Flow
//! ```text
//! Dispatcher ──acquire_lease──▶ ┌─────────────┐
//! Check ──mark_*/is_lease_lost─▶│ Coordinator │──▶ Redis (keys.rs layout)
//! Supervisor ──heartbeat/id────▶└─────────────┘
//!                                      │
//!          dead channel ◀──subscribe───┘
//! ```
//!
//! # Implementations
//! - redis_store.rs: the real store
//! - dry_run.rs: wraps a real store, never mutates it
//! - memory.rs: test double shared by unit tests (test builds only)
//!
//! # Design Decisions
//! - Every operation is a single atomic store command or script, so no
//!   cross-task locking is needed
//! - "Not found" is a value (`Ok(false)`), transport failures are errors

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::health::NotificationRecord;

pub mod dry_run;
pub mod keys;
#[cfg(test)]
pub mod memory;
pub mod redis_store;

pub use self::dry_run::DryRunCoordinator;
#[cfg(test)]
pub use self::memory::{MemoryCoordinator, MemoryStore, StoreOp};
pub use self::redis_store::{RedisCoordinator, StoreSettings};

#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("failed to connect to store at '{url}': {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("store error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("store identity unavailable: {0}")]
    IdentityUnavailable(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type CoordinatorResult<T> = Result<T, CoordinatorError>;

/// Presence announcement written by the supervisor.
#[derive(Debug, Clone, Serialize)]
pub struct Presence {
    pub instance_id: String,
    pub version: &'static str,
    pub active_checks: usize,
    pub dry_run: bool,
}

/// Operations on the shared coordination store.
#[async_trait]
pub trait Coordinator: Send + Sync {
    /// Claim a backend if nobody holds it. Never blocks on a held lease.
    async fn acquire_lease(&self, backend_url: &str) -> CoordinatorResult<bool>;

    /// True when this process no longer holds a live lease on the backend.
    /// A lease still held is renewed.
    async fn is_lease_lost(&self, backend_url: &str) -> CoordinatorResult<bool>;

    /// Drop the lease if this process still holds it.
    async fn release_lease(&self, backend_url: &str) -> CoordinatorResult<()>;

    /// Flag the backend dead for its frontend. `Ok(false)` when the frontend
    /// no longer lists the backend.
    async fn mark_unhealthy(&self, target: &NotificationRecord) -> CoordinatorResult<bool>;

    /// Clear the dead flag. Same not-found semantics as `mark_unhealthy`.
    async fn mark_healthy(&self, target: &NotificationRecord) -> CoordinatorResult<bool>;

    async fn heartbeat(&self, presence: &Presence) -> CoordinatorResult<()>;

    /// Subscribe to a channel; payloads arrive on the returned receiver until
    /// the subscription drops.
    async fn subscribe(&self, channel: &str) -> CoordinatorResult<mpsc::Receiver<String>>;

    /// Opaque identity of the store process currently answering.
    async fn store_identity(&self) -> CoordinatorResult<String>;
}
