//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, intervals > 0)
//! - Check that TTLs outlive the schedules that refresh them
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: CheckerConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;

use hyper::Method;

use crate::config::schema::CheckerConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a fully merged configuration.
pub fn validate_config(config: &CheckerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if Method::from_bytes(config.probe.method.as_bytes()).is_err() {
        errors.push(ValidationError::new(
            "probe.method",
            format!("'{}' is not a valid HTTP method", config.probe.method),
        ));
    }
    if !config.probe.path.starts_with('/') {
        errors.push(ValidationError::new("probe.path", "must start with '/'"));
    }

    let non_zero = [
        ("probe.connect_timeout_secs", config.probe.connect_timeout_secs),
        ("probe.io_timeout_secs", config.probe.io_timeout_secs),
        ("check.interval_secs", config.check.interval_secs),
        ("check.break_interval_secs", config.check.break_interval_secs),
        ("check.unhealthy_refresh_secs", config.check.unhealthy_refresh_secs),
        ("store.heartbeat_ttl_secs", config.store.heartbeat_ttl_secs),
        ("supervisor.heartbeat_interval_secs", config.supervisor.heartbeat_interval_secs),
        ("supervisor.identity_interval_secs", config.supervisor.identity_interval_secs),
    ];
    for (field, value) in non_zero {
        if value == 0 {
            errors.push(ValidationError::new(field, "must be greater than zero"));
        }
    }

    // Renewal happens at the first break boundary checked after the break
    // interval, which can trail it by one full probe plus one poll sleep.
    let renewal_gap = config.check.break_interval_secs
        + config.probe.connect_timeout_secs
        + config.probe.io_timeout_secs
        + config.check.interval_secs;
    if config.store.lease_ttl_secs <= renewal_gap {
        errors.push(ValidationError::new(
            "store.lease_ttl_secs",
            format!(
                "must exceed break interval + connect and IO timeouts + poll interval ({})",
                renewal_gap
            ),
        ));
    }
    if config.store.dead_ttl_secs <= config.check.unhealthy_refresh_secs {
        errors.push(ValidationError::new(
            "store.dead_ttl_secs",
            format!(
                "must exceed check.unhealthy_refresh_secs ({})",
                config.check.unhealthy_refresh_secs
            ),
        ));
    }

    if config.store.channel.trim().is_empty() {
        errors.push(ValidationError::new("store.channel", "must not be empty"));
    }
    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<std::net::SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
