//! Point-in-time view of the reconciliation state
//!
//! A [`StatusSnapshot`] is a plain copy taken under the state lock. Readers
//! (the status server, tests) work on the copy and never see a cycle half
//! applied.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::net::IpAddr;
use std::time::Duration;

/// Derived liveness flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// A check happened within interval + grace
    Active,
    /// No check yet, or the last one is too old
    Unhealthy,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Unhealthy => "unhealthy",
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a timestamp is recent enough to count as alive
///
/// Timestamps in the future (clock adjustments) count as fresh.
pub fn is_fresh(timestamp: DateTime<Utc>, now: DateTime<Utc>, limit: Duration) -> bool {
    let age_ms = now.signed_duration_since(timestamp).num_milliseconds();
    age_ms <= limit.as_millis() as i64
}

/// Copy of the reconciliation state
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusSnapshot {
    /// Most recent IP lookup attempt, successful or not
    pub last_check: Option<DateTime<Utc>>,
    /// Most recent cycle whose updates all succeeded and whose IP was persisted
    pub last_update: Option<DateTime<Utc>>,
    /// Last persisted IP
    pub current_ip: Option<IpAddr>,
    /// Number of hosts in the registry
    pub host_count: usize,
    /// Registry host names, sorted
    pub host_names: Vec<String>,
}

impl StatusSnapshot {
    /// Health at `now` given the allowed staleness (interval + grace)
    pub fn health(&self, now: DateTime<Utc>, limit: Duration) -> HealthStatus {
        match self.last_check {
            Some(last_check) if is_fresh(last_check, now, limit) => HealthStatus::Active,
            _ => HealthStatus::Unhealthy,
        }
    }
}
