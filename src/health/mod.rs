//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Dead channel line
//!     → notification.rs (parse NotificationRecord)
//!     → registry.rs (one check per backend in this process)
//!     → check.rs (poll loop)
//!         → probe.rs (one HTTP request, classify)
//!         → state.rs (transition / refresh / exit decisions)
//!         → coordinator (dead/alive flags, lease)
//! ```
//!
//! # Design Decisions
//! - One task per backend under incident, nothing for healthy backends
//! - Hysteresis comes from the store TTL and the stability window, not
//!   from consecutive-result thresholds
//! - Health state is per (frontend, backend) pair

pub mod check;
pub mod notification;
pub mod probe;
pub mod registry;
pub mod state;

pub use check::{Check, CheckSettings};
pub use notification::{NotificationError, NotificationRecord};
pub use probe::{classify, HttpProber, ProbeError, Prober};
pub use registry::{ActiveChecks, Registration};
pub use state::{CheckStatus, ExitReason};
