//! Store key layout.
//!
//! ```text
//! frontend:<frontend>            list   [identifier, backend0, backend1, ...]
//! dead:<frontend>                set    backend ids, expires
//! hchecker:lease:<backend url>   string owner instance id, expires
//! hchecker:ping:<instance>       string presence JSON, expires
//! ```
//!
//! `frontend:` and `dead:` are shared with the load balancer and must not
//! change.

pub const LEASE_PREFIX: &str = "hchecker:lease:";
pub const PRESENCE_PREFIX: &str = "hchecker:ping:";

pub fn frontend(frontend_key: &str) -> String {
    format!("frontend:{}", frontend_key)
}

pub fn dead(frontend_key: &str) -> String {
    format!("dead:{}", frontend_key)
}

pub fn lease(backend_url: &str) -> String {
    format!("{}{}", LEASE_PREFIX, backend_url)
}

pub fn presence(instance_id: &str) -> String {
    format!("{}{}", PRESENCE_PREFIX, instance_id)
}

/// Position of a backend in its frontend list; slot 0 is the identifier.
pub fn frontend_index(backend_id: u32) -> i64 {
    i64::from(backend_id) + 1
}
