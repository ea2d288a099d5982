//! Process-level errors.
//!
//! Anything that reaches `main` as a `CheckerError` ends the process with a
//! failure status.

use thiserror::Error;

use crate::config::ConfigError;
use crate::coordinator::CoordinatorError;
use crate::health::ProbeError;

#[derive(Debug, Error)]
pub enum CheckerError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("store error: {0}")]
    Store(#[from] CoordinatorError),

    #[error("probe setup failed: {0}")]
    Probe(#[from] ProbeError),

    #[error("store restarted (process id {previous} -> {current})")]
    StoreRestarted { previous: String, current: String },

    #[error("subscription to channel '{0}' closed")]
    SubscriptionClosed(String),

    #[error("metrics exporter failed: {0}")]
    Metrics(String),
}
