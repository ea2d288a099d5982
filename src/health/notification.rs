//! Records published on the dead-backend channel.
//!
//! Wire format, one message per line:
//! ```text
//! <frontend key>;<backend url>;<backend id>;<group length>
//! ```

use std::fmt;
use std::str::FromStr;

use thiserror::Error;
use url::Url;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NotificationError {
    #[error("expected 4 fields, got {0}")]
    FieldCount(usize),

    #[error("invalid backend URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("invalid {field} '{value}'")]
    InvalidNumber { field: &'static str, value: String },
}

/// One "backend became unhealthy" announcement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationRecord {
    pub frontend_key: String,
    /// Origin only (`scheme://authority`), authority kept as written.
    pub backend_url: String,
    /// Position of the backend in the frontend's pool.
    pub backend_id: u32,
    /// Number of backends in the frontend's pool.
    pub group_length: u32,
}

impl NotificationRecord {
    /// Singleton pools have nothing to fail over to, so they are never checked.
    pub fn is_checkable(&self) -> bool {
        self.group_length > 1
    }
}

impl FromStr for NotificationRecord {
    type Err = NotificationError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = line.trim().split(';').collect();
        if parts.len() != 4 {
            return Err(NotificationError::FieldCount(parts.len()));
        }

        Ok(Self {
            frontend_key: parts[0].to_string(),
            backend_url: backend_origin(parts[1])?,
            backend_id: parse_number("backend id", parts[2])?,
            group_length: parse_number("group length", parts[3])?,
        })
    }
}

impl fmt::Display for NotificationRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{};{};{};{}",
            self.frontend_key, self.backend_url, self.backend_id, self.group_length
        )
    }
}

fn parse_number(field: &'static str, value: &str) -> Result<u32, NotificationError> {
    value
        .trim()
        .parse()
        .map_err(|_| NotificationError::InvalidNumber {
            field,
            value: value.to_string(),
        })
}

/// Reduce a backend URL to `scheme://authority`.
///
/// `Url` normalizes default ports away, so the authority is sliced from the
/// raw input once the URL is known to be well formed.
fn backend_origin(raw: &str) -> Result<String, NotificationError> {
    let raw = raw.trim();
    let invalid = |reason: &str| NotificationError::InvalidUrl {
        url: raw.to_string(),
        reason: reason.to_string(),
    };

    let parsed = Url::parse(raw).map_err(|e| invalid(&e.to_string()))?;
    if parsed.scheme() != "http" {
        return Err(invalid("only http backends can be probed"));
    }
    if parsed.host_str().is_none() {
        return Err(invalid("missing host"));
    }

    let rest = raw
        .split_once("://")
        .map(|(_, rest)| rest)
        .ok_or_else(|| invalid("missing scheme separator"))?;
    let authority = rest.split(['/', '?', '#']).next().unwrap_or_default();
    let host = authority.rsplit_once('@').map_or(authority, |(_, host)| host);

    Ok(format!("{}://{}", parsed.scheme(), host))
}
