//! Circuit breaker domain models.
//!
//! These are the plain-data views of a breaker: the state enum, the
//! transition event every state change produces, the per-breaker status
//! reported by the registry summary, and the record persisted across
//! restarts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

use crate::domain::errors::DomainError;

/// State of a circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    /// Calls flow normally.
    Closed,
    /// Calls are rejected without invoking the protected operation.
    Open,
    /// A single trial call is allowed through to probe recovery.
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Closed => "CLOSED",
            Self::Open => "OPEN",
            Self::HalfOpen => "HALF_OPEN",
        }
    }

    /// Health reported for a breaker sitting in this state.
    pub fn health(&self) -> HealthStatus {
        match self {
            Self::Closed => HealthStatus::Healthy,
            Self::HalfOpen => HealthStatus::Degraded,
            Self::Open => HealthStatus::Critical,
        }
    }
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CircuitState {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "CLOSED" => Ok(Self::Closed),
            "OPEN" => Ok(Self::Open),
            "HALF_OPEN" => Ok(Self::HalfOpen),
            _ => Err(DomainError::InvalidCircuitState(s.to_string())),
        }
    }
}

/// Coarse health of a protected component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Critical,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Degraded => write!(f, "degraded"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

/// Emitted on every breaker state transition and kept in the breaker's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateChangeEvent {
    pub breaker_name: String,
    pub old_state: CircuitState,
    pub new_state: CircuitState,
    pub timestamp: DateTime<Utc>,
    /// Why the transition happened, e.g. `failure_threshold_exceeded`.
    pub reason: String,
}

/// Point-in-time status of one breaker, as reported by the registry summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakerStatus {
    pub state: CircuitState,
    pub failure_count: u32,
    pub last_failure: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub last_state_change: DateTime<Utc>,
    pub parent: Option<String>,
    pub health: HealthStatus,
    pub trip_count: u32,
    pub last_trip: Option<DateTime<Utc>>,
    pub last_reset: Option<DateTime<Utc>>,
    /// Failures per minute inside the metric window.
    pub error_density: f64,
    pub avg_recovery_time_secs: Option<f64>,
    /// Seconds spent in each state, including the time in the current one.
    pub state_durations_secs: HashMap<CircuitState, f64>,
}

/// One entry of the registry summary.
///
/// A breaker whose state cannot be read is reported as `{ "error": ... }`
/// instead of failing the whole summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SummaryEntry {
    Status(Box<BreakerStatus>),
    Error { error: String },
}

impl SummaryEntry {
    pub fn status(&self) -> Option<&BreakerStatus> {
        match self {
            Self::Status(status) => Some(status),
            Self::Error { .. } => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }
}

/// Durable form of a breaker, written by the state store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakerRecord {
    pub name: String,
    pub state: CircuitState,
    pub failure_count: u32,
    pub last_failure_time: Option<DateTime<Utc>>,
    pub last_state_change: DateTime<Utc>,
    pub parent: Option<String>,
    pub children: Vec<String>,
    pub trip_count: u32,
    pub last_trip: Option<DateTime<Utc>>,
    pub last_reset: Option<DateTime<Utc>>,
    pub registered_at: DateTime<Utc>,
    pub saved_at: DateTime<Utc>,
}
