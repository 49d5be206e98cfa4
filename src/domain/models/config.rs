use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Main configuration structure for sentinel
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Circuit breaker defaults and per-component overrides
    #[serde(default)]
    pub circuit_breakers: CircuitBreakersConfig,

    /// Background breaker monitoring
    #[serde(default)]
    pub monitoring: MonitoringConfig,

    /// In-process event bus
    #[serde(default)]
    pub event_bus: EventBusConfig,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DatabaseConfig {
    /// Path to `SQLite` database file
    #[serde(default = "default_database_path")]
    pub path: String,

    /// Maximum number of database connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database_path() -> String {
    ".sentinel/sentinel.db".to_string()
}

const fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            max_connections: default_max_connections(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for rolling log files. No file output when unset.
    #[serde(default)]
    pub log_dir: Option<String>,

    /// Number of days to retain logs
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

const fn default_retention_days() -> u32 {
    30
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
            retention_days: default_retention_days(),
        }
    }
}

/// Tunables for a single circuit breaker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct BreakerSettings {
    /// Consecutive failures that open the circuit
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// Seconds an open circuit waits before allowing a trial call
    #[serde(default = "default_recovery_timeout_secs")]
    pub recovery_timeout_secs: u64,

    /// Seconds after the last failure at which the failure count resets
    #[serde(default = "default_failure_window_secs")]
    pub failure_window_secs: u64,

    /// Trial calls admitted while half-open
    #[serde(default = "default_half_open_max_tries")]
    pub half_open_max_tries: u32,
}

const fn default_failure_threshold() -> u32 {
    5
}

const fn default_recovery_timeout_secs() -> u64 {
    30
}

const fn default_failure_window_secs() -> u64 {
    60
}

const fn default_half_open_max_tries() -> u32 {
    1
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            recovery_timeout_secs: default_recovery_timeout_secs(),
            failure_window_secs: default_failure_window_secs(),
            half_open_max_tries: default_half_open_max_tries(),
        }
    }
}

/// Circuit breaker configuration section
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CircuitBreakersConfig {
    /// Settings for breakers with no component override
    #[serde(default)]
    pub default: BreakerSettings,

    /// Overrides keyed by component name
    #[serde(default)]
    pub components: HashMap<String, BreakerSettings>,
}

/// Breaker monitor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct MonitoringConfig {
    /// Seconds between `check_all` sweeps
    #[serde(default = "default_check_interval_secs")]
    pub check_interval_secs: u64,

    /// Seconds of failure history used for error density
    #[serde(default = "default_metric_window_secs")]
    pub metric_window_secs: u64,

    /// Persist every breaker when the monitor stops
    #[serde(default = "default_persist_on_stop")]
    pub persist_on_stop: bool,
}

const fn default_check_interval_secs() -> u64 {
    30
}

const fn default_metric_window_secs() -> u64 {
    3600
}

const fn default_persist_on_stop() -> bool {
    true
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            check_interval_secs: default_check_interval_secs(),
            metric_window_secs: default_metric_window_secs(),
            persist_on_stop: default_persist_on_stop(),
        }
    }
}

/// Event bus configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct EventBusConfig {
    /// Broadcast channel capacity
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

const fn default_channel_capacity() -> usize {
    1024
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
        }
    }
}
