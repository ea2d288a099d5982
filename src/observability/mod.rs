//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout (pretty for terminals, JSON for collectors)
//!     → Metrics endpoint (Prometheus scrape, opt-in)
//! ```
//!
//! # Design Decisions
//! - Every check runs inside a span carrying instance, frontend, backend
//! - Metric updates are no-ops until an exporter is installed

pub mod logging;
pub mod metrics;
