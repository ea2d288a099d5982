//! Backend health state machine.
//!
//! # States
//! - FirstCheck: nothing reported yet, the next result is always reported
//! - Healthy: backend answers
//! - Unhealthy: backend excluded from traffic by its dead flag
//!
//! # State Transitions
//! ```text
//! FirstCheck → Healthy | Unhealthy: always reported
//! Healthy ↔ Unhealthy: reported on every change
//! Unhealthy → Unhealthy: re-reported every refresh interval (store TTL)
//! ```
//!
//! The machine is pure: it is fed probe results and clock readings and
//! answers with the store action to take. `check.rs` drives it.

use std::fmt;
use std::time::Duration;

use tokio::time::Instant;

/// Classified probe outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckStatus {
    Healthy,
    Unhealthy,
}

impl CheckStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckStatus::Healthy => "healthy",
            CheckStatus::Unhealthy => "unhealthy",
        }
    }
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a check loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// Another process owns the backend now, or the lease expired.
    LeaseLost,
    /// Healthy for a whole stability window.
    StableHealthy,
    /// The frontend mapping no longer lists the backend.
    BackendGone,
}

impl ExitReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExitReason::LeaseLost => "lease_lost",
            ExitReason::StableHealthy => "stable_healthy",
            ExitReason::BackendGone => "backend_gone",
        }
    }
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Store action requested by a single observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Nothing to report.
    Steady,
    /// Status changed (or first check): report it.
    Report(CheckStatus),
    /// Still unhealthy: flag dead again before the store forgets.
    RefreshUnhealthy,
}

/// Timing knobs for the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timings {
    pub poll_interval: Duration,
    pub break_interval: Duration,
    pub stable_duration: Duration,
    pub unhealthy_refresh: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            break_interval: Duration::from_secs(60),
            stable_duration: Duration::from_secs(300),
            unhealthy_refresh: Duration::from_secs(30),
        }
    }
}

/// Transient state of one check.
#[derive(Debug)]
pub struct CheckState {
    timings: Timings,
    status: CheckStatus,
    first_check: bool,
    last_state_change: Instant,
    last_unhealthy_refresh: Option<Instant>,
    poll_count: u64,
    last_break: Instant,
}

impl CheckState {
    pub fn new(timings: Timings, now: Instant) -> Self {
        Self {
            timings,
            status: CheckStatus::Unhealthy,
            first_check: true,
            last_state_change: now,
            last_unhealthy_refresh: None,
            poll_count: 0,
            last_break: now,
        }
    }

    /// Force the next observation to be reported.
    pub fn resync(&mut self) {
        self.first_check = true;
    }

    /// Feed one classified probe result.
    pub fn observe(&mut self, new_status: CheckStatus, now: Instant) -> Transition {
        self.poll_count += 1;

        let transition = if new_status != self.status || self.first_check {
            self.last_state_change = now;
            Transition::Report(new_status)
        } else if new_status == CheckStatus::Unhealthy
            && self
                .last_unhealthy_refresh
                .is_some_and(|at| now.duration_since(at) >= self.timings.unhealthy_refresh)
        {
            Transition::RefreshUnhealthy
        } else {
            Transition::Steady
        };

        match transition {
            Transition::Report(CheckStatus::Healthy) => self.last_unhealthy_refresh = None,
            Transition::Report(CheckStatus::Unhealthy) | Transition::RefreshUnhealthy => {
                self.last_unhealthy_refresh = Some(now)
            }
            Transition::Steady => {}
        }

        self.status = new_status;
        self.first_check = false;
        transition
    }

    /// Returns true when a break interval of wall-clock time has passed since
    /// the previous boundary. Probe time counts, so a slow backend cannot
    /// stretch the lease renewal cadence.
    pub fn tick(&mut self, now: Instant) -> bool {
        if now.duration_since(self.last_break) >= self.timings.break_interval {
            self.last_break = now;
            true
        } else {
            false
        }
    }

    /// Healthy for the whole stability window since the last change.
    pub fn is_stable_healthy(&self, now: Instant) -> bool {
        self.status == CheckStatus::Healthy
            && now.duration_since(self.last_state_change) >= self.timings.stable_duration
    }

    pub fn status(&self) -> CheckStatus {
        self.status
    }

    pub fn poll_count(&self) -> u64 {
        self.poll_count
    }

    pub fn time_in_state(&self, now: Instant) -> Duration {
        now.duration_since(self.last_state_change)
    }

    pub fn timings(&self) -> &Timings {
        &self.timings
    }
}
