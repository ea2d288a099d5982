//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → command-line overrides
//!     → validation.rs (semantic checks)
//!     → CheckerConfig (validated, immutable)
//!     → split into per-subsystem settings at startup
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow running with no file at all
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError, ConfigOverrides};
pub use schema::{
    CheckConfig, CheckerConfig, LogFormat, ObservabilityConfig, ProbeConfig, StoreConfig,
    SupervisorConfig,
};
