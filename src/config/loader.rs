//! Configuration loading from disk and the command line.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::CheckerConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Values given on the command line. `None` keeps the file/default value.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub method: Option<String>,
    pub path: Option<String>,
    pub host: Option<String>,
    pub interval_secs: Option<u64>,
    pub connect_timeout_secs: Option<u64>,
    pub io_timeout_secs: Option<u64>,
    pub store_url: Option<String>,
    pub dry_run: bool,
}

impl ConfigOverrides {
    pub fn apply(self, config: &mut CheckerConfig) {
        if let Some(method) = self.method {
            config.probe.method = method;
        }
        if let Some(path) = self.path {
            config.probe.path = path;
        }
        if let Some(host) = self.host {
            config.probe.host = host;
        }
        if let Some(secs) = self.interval_secs {
            config.check.interval_secs = secs;
        }
        if let Some(secs) = self.connect_timeout_secs {
            config.probe.connect_timeout_secs = secs;
        }
        if let Some(secs) = self.io_timeout_secs {
            config.probe.io_timeout_secs = secs;
        }
        if let Some(url) = self.store_url {
            config.store.url = normalize_store_url(&url);
        }
        config.dry_run |= self.dry_run;
    }
}

/// Accept a bare `host:port` address as well as a `redis://` URL.
fn normalize_store_url(address: &str) -> String {
    if address.contains("://") {
        address.to_string()
    } else {
        format!("redis://{}", address)
    }
}

/// Parse a configuration file without validating it.
pub fn read_config(path: &Path) -> Result<CheckerConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Build the effective configuration: file (or defaults), then overrides,
/// then validation.
pub fn load_config(
    path: Option<&Path>,
    overrides: ConfigOverrides,
) -> Result<CheckerConfig, ConfigError> {
    let mut config = match path {
        Some(path) => read_config(path)?,
        None => CheckerConfig::default(),
    };
    overrides.apply(&mut config);

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}
