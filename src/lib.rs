//! Distributed backend health checker library.

pub mod config;
pub mod coordinator;
pub mod dispatcher;
pub mod error;
pub mod health;
pub mod lifecycle;
pub mod observability;

pub use config::CheckerConfig;
pub use dispatcher::{Dispatch, Dispatcher};
pub use error::CheckerError;
