//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Connect store → Identity → Subscribe → Spawn dispatcher → Supervise
//!
//! Supervision (supervisor.rs):
//!     Heartbeat → Identity check → Status line
//!
//! Signals (signals.rs):
//!     SIGINT → Exit 0, leases expire on their own
//! ```
//!
//! # Design Decisions
//! - Fail fast: store connect and subscribe errors are fatal
//! - A restarted store is fatal; a supervisor restarts the process
//! - No drain on interrupt; another process picks up expired leases

pub mod signals;
pub mod startup;
pub mod supervisor;

pub use startup::{instance_id, run};
pub use supervisor::{IdentityWatch, Supervisor};
