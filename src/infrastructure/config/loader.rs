use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use std::path::Path;
use thiserror::Error;

use crate::domain::models::config::{BreakerSettings, Config};

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Database path cannot be empty")]
    EmptyDatabasePath,

    #[error("Invalid max_connections: {0}. Must be at least 1")]
    InvalidMaxConnections(u32),

    #[error("Invalid failure_threshold for {scope}: must be at least 1")]
    InvalidFailureThreshold { scope: String },

    #[error("Invalid half_open_max_tries for {scope}: must be at least 1")]
    InvalidHalfOpenTries { scope: String },

    #[error("Invalid check_interval_secs: {0}. Must be at least 1")]
    InvalidCheckInterval(u64),

    #[error("Invalid channel_capacity: {0}. Must be at least 1")]
    InvalidChannelCapacity(usize),

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .sentinel/config.yaml (project config)
    /// 3. .sentinel/local.yaml (project local overrides, optional)
    /// 4. Environment variables (SENTINEL_* prefix, `__` for nesting)
    pub fn load() -> Result<Config> {
        let config: Config = Self::figment()
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// The full provider chain used by [`load`](Self::load).
    pub fn figment() -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(".sentinel/config.yaml"))
            .merge(Yaml::file(".sentinel/local.yaml"))
            .merge(Env::prefixed("SENTINEL_").split("__"))
    }

    /// Load configuration from a specific file, still honoring env overrides
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .merge(Env::prefixed("SENTINEL_").split("__"))
            .extract()
            .context(format!(
                "Failed to load config from {}",
                path.as_ref().display()
            ))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.database.path.is_empty() {
            return Err(ConfigError::EmptyDatabasePath);
        }

        if config.database.max_connections == 0 {
            return Err(ConfigError::InvalidMaxConnections(
                config.database.max_connections,
            ));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        validate_breaker("default", &config.circuit_breakers.default)?;
        for (component, settings) in &config.circuit_breakers.components {
            if component.is_empty() {
                return Err(ConfigError::ValidationFailed(
                    "circuit breaker component name cannot be empty".to_string(),
                ));
            }
            validate_breaker(component, settings)?;
        }

        if config.monitoring.check_interval_secs == 0 {
            return Err(ConfigError::InvalidCheckInterval(
                config.monitoring.check_interval_secs,
            ));
        }

        if config.event_bus.channel_capacity == 0 {
            return Err(ConfigError::InvalidChannelCapacity(
                config.event_bus.channel_capacity,
            ));
        }

        Ok(())
    }
}

fn validate_breaker(scope: &str, settings: &BreakerSettings) -> Result<(), ConfigError> {
    if settings.failure_threshold == 0 {
        return Err(ConfigError::InvalidFailureThreshold {
            scope: scope.to_string(),
        });
    }
    if settings.half_open_max_tries == 0 {
        return Err(ConfigError::InvalidHalfOpenTries {
            scope: scope.to_string(),
        });
    }
    Ok(())
}
