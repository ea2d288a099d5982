//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the checker.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the health checker.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct CheckerConfig {
    /// HTTP probe settings.
    pub probe: ProbeConfig,

    /// Per-backend check loop timing.
    pub check: CheckConfig,

    /// Coordination store (Redis) settings.
    pub store: StoreConfig,

    /// Supervisor loop timing.
    pub supervisor: SupervisorConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Simulation mode: run every check but never write to the store.
    pub dry_run: bool,

    /// Overrides the `hostname#pid` identity announced to the store.
    pub instance_id: Option<String>,
}

/// HTTP probe configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// HTTP method used for each probe.
    pub method: String,

    /// Request path.
    pub path: String,

    /// Value of the Host header.
    pub host: String,

    /// User-Agent header value.
    pub user_agent: String,

    /// TCP connection timeout in seconds.
    pub connect_timeout_secs: u64,

    /// Read/write timeout once connected, in seconds.
    pub io_timeout_secs: u64,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            method: "HEAD".to_string(),
            path: "/CloudHealthCheck".to_string(),
            host: "ping".to_string(),
            user_agent: format!("hchecker/{}", env!("CARGO_PKG_VERSION")),
            connect_timeout_secs: 20,
            io_timeout_secs: 20,
        }
    }
}

impl ProbeConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn io_timeout(&self) -> Duration {
        Duration::from_secs(self.io_timeout_secs)
    }
}

/// Check loop timing.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CheckConfig {
    /// Poll interval in seconds.
    pub interval_secs: u64,

    /// A check healthy for this long since its last change stops itself.
    pub duration_secs: u64,

    /// How often the lease and stability exits are evaluated.
    pub break_interval_secs: u64,

    /// How often a still-dead backend is re-flagged to beat the store TTL.
    pub unhealthy_refresh_secs: u64,
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            interval_secs: 5,
            duration_secs: 300,
            break_interval_secs: 60,
            unhealthy_refresh_secs: 30,
        }
    }
}

/// Coordination store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Redis connection URL.
    pub url: String,

    /// Pub/sub channel announcing dead backends.
    pub channel: String,

    /// Backend lease time-to-live in seconds.
    pub lease_ttl_secs: u64,

    /// Time-to-live of the dead set written for a frontend, in seconds.
    pub dead_ttl_secs: u64,

    /// Time-to-live of the presence heartbeat key, in seconds.
    pub heartbeat_ttl_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            channel: "dead".to_string(),
            lease_ttl_secs: 120,
            dead_ttl_secs: 60,
            heartbeat_ttl_secs: 30,
        }
    }
}

/// Supervisor loop configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SupervisorConfig {
    /// Presence heartbeat period in seconds.
    pub heartbeat_interval_secs: u64,

    /// Store identity check and status line period in seconds.
    pub identity_interval_secs: u64,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_secs: 10,
            identity_interval_secs: 60,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log line format.
    pub log_format: LogFormat,

    /// Enable the Prometheus scrape endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9464".to_string(),
        }
    }
}
