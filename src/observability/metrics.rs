//! Metrics collection and exposition.
//!
//! # Metrics
//! - `hchecker_active_checks` (gauge): checks running in this process
//! - `hchecker_notifications_total` (counter): dead channel lines by outcome
//! - `hchecker_transitions_total` (counter): reported status changes
//! - `hchecker_check_exits_total` (counter): finished checks by reason
//! - `hchecker_probe_duration_seconds` (histogram): probe latency

use std::net::SocketAddr;
use std::time::Duration;

use metrics_exporter_prometheus::PrometheusBuilder;

use crate::health::{CheckStatus, ExitReason};

/// Start the Prometheus scrape endpoint.
pub fn init_metrics(addr: SocketAddr) -> Result<(), String> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| e.to_string())?;

    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn set_active_checks(count: usize) {
    ::metrics::gauge!("hchecker_active_checks").set(count as f64);
}

/// Outcome of one dead channel line: spawned, resynced, ignored, invalid,
/// lease_held or store_error.
pub fn record_notification(outcome: &'static str) {
    ::metrics::counter!("hchecker_notifications_total", "outcome" => outcome).increment(1);
}

pub fn record_transition(status: CheckStatus) {
    ::metrics::counter!("hchecker_transitions_total", "status" => status.as_str()).increment(1);
}

pub fn record_exit(reason: ExitReason) {
    ::metrics::counter!("hchecker_check_exits_total", "reason" => reason.as_str()).increment(1);
}

pub fn record_probe(elapsed: Duration) {
    ::metrics::histogram!("hchecker_probe_duration_seconds").record(elapsed.as_secs_f64());
}
