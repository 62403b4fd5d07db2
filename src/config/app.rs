//! Main application configuration
//!
//! This module defines the primary configuration structures for the
//! tempo-hall session service, including environment variable loading,
//! TOML file loading, and validation.

use crate::types::TimeSeedPolicy;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub service: ServiceSettings,
    pub session: SessionSettings,
}

/// Service-level settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceSettings {
    /// Service name for logging and metrics
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Host to bind the gateway server to
    pub bind_host: String,
    /// Port for the WebSocket gateway and health endpoints
    pub port: u16,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_seconds: u64,
}

/// Session and clock settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSettings {
    /// Clock tick resolution in milliseconds
    pub clock_tick_ms: u64,
    /// Interval between time-changed notifications in milliseconds
    pub clock_notify_step_ms: u64,
    /// How both players' starting clocks are seeded at game start
    pub time_seed_policy: TimeSeedPolicy,
    /// Smallest accepted preferred starting time in milliseconds
    pub min_preferred_time_ms: u64,
    /// Largest accepted preferred starting time in milliseconds
    pub max_preferred_time_ms: u64,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            name: "tempo-hall".to_string(),
            log_level: "info".to_string(),
            bind_host: "0.0.0.0".to_string(),
            port: 8080,
            shutdown_timeout_seconds: 30,
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            clock_tick_ms: 100,
            clock_notify_step_ms: 1_000,
            time_seed_policy: TimeSeedPolicy::Initiator,
            min_preferred_time_ms: 10_000,        // 10 seconds
            max_preferred_time_ms: 3_600_000,     // 1 hour
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables with fallback to defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        // Service settings
        if let Ok(name) = env::var("SERVICE_NAME") {
            config.service.name = name;
        }
        if let Ok(log_level) = env::var("LOG_LEVEL") {
            config.service.log_level = log_level;
        }
        if let Ok(host) = env::var("BIND_HOST") {
            config.service.bind_host = host;
        }
        if let Ok(port) = env::var("PORT") {
            config.service.port = port
                .parse()
                .map_err(|_| anyhow!("Invalid PORT value: {}", port))?;
        }
        if let Ok(timeout) = env::var("SHUTDOWN_TIMEOUT_SECONDS") {
            config.service.shutdown_timeout_seconds = timeout
                .parse()
                .map_err(|_| anyhow!("Invalid SHUTDOWN_TIMEOUT_SECONDS value: {}", timeout))?;
        }

        // Session settings
        if let Ok(tick) = env::var("CLOCK_TICK_MS") {
            config.session.clock_tick_ms = tick
                .parse()
                .map_err(|_| anyhow!("Invalid CLOCK_TICK_MS value: {}", tick))?;
        }
        if let Ok(step) = env::var("CLOCK_NOTIFY_STEP_MS") {
            config.session.clock_notify_step_ms = step
                .parse()
                .map_err(|_| anyhow!("Invalid CLOCK_NOTIFY_STEP_MS value: {}", step))?;
        }
        if let Ok(policy) = env::var("TIME_SEED_POLICY") {
            config.session.time_seed_policy = policy
                .parse()
                .map_err(|e| anyhow!("Invalid TIME_SEED_POLICY value: {}", e))?;
        }
        if let Ok(min_time) = env::var("MIN_PREFERRED_TIME_MS") {
            config.session.min_preferred_time_ms = min_time
                .parse()
                .map_err(|_| anyhow!("Invalid MIN_PREFERRED_TIME_MS value: {}", min_time))?;
        }
        if let Ok(max_time) = env::var("MAX_PREFERRED_TIME_MS") {
            config.session.max_preferred_time_ms = max_time
                .parse()
                .map_err(|_| anyhow!("Invalid MAX_PREFERRED_TIME_MS value: {}", max_time))?;
        }

        validate_config(&config)?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Self = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        validate_config(&config)?;
        Ok(config)
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.service.shutdown_timeout_seconds)
    }

    /// Get clock tick resolution as Duration
    pub fn clock_tick(&self) -> Duration {
        Duration::from_millis(self.session.clock_tick_ms)
    }
}

/// Validate configuration values
pub fn validate_config(config: &AppConfig) -> Result<()> {
    // Validate log level
    match config.service.log_level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => {}
        _ => return Err(anyhow!("Invalid log level: {}", config.service.log_level)),
    }

    // Validate ports and timeouts
    if config.service.port == 0 {
        return Err(anyhow!("Gateway port cannot be 0"));
    }
    if config.service.shutdown_timeout_seconds == 0 {
        return Err(anyhow!("Shutdown timeout must be greater than 0"));
    }

    // Validate clock settings
    if config.session.clock_tick_ms == 0 {
        return Err(anyhow!("Clock tick must be greater than 0"));
    }
    if config.session.clock_notify_step_ms == 0 {
        return Err(anyhow!("Clock notify step must be greater than 0"));
    }
    if config.session.clock_notify_step_ms % config.session.clock_tick_ms != 0 {
        return Err(anyhow!(
            "Clock notify step ({}ms) must be a multiple of the clock tick ({}ms)",
            config.session.clock_notify_step_ms,
            config.session.clock_tick_ms
        ));
    }

    // Validate time budget bounds
    if config.session.min_preferred_time_ms == 0 {
        return Err(anyhow!("Minimum preferred time must be greater than 0"));
    }
    if config.session.min_preferred_time_ms > config.session.max_preferred_time_ms {
        return Err(anyhow!(
            "Minimum preferred time ({}ms) exceeds maximum ({}ms)",
            config.session.min_preferred_time_ms,
            config.session.max_preferred_time_ms
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        assert!(validate_config(&config).is_ok());
        assert_eq!(config.session.clock_tick_ms, 100);
        assert_eq!(config.session.clock_notify_step_ms, 1_000);
        assert_eq!(config.session.time_seed_policy, TimeSeedPolicy::Initiator);
    }

    #[test]
    fn test_invalid_log_level_rejected() {
        let mut config = AppConfig::default();
        config.service.log_level = "verbose".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_notify_step_must_align_with_tick() {
        let mut config = AppConfig::default();
        config.session.clock_notify_step_ms = 250;
        assert!(validate_config(&config).is_err());

        config.session.clock_notify_step_ms = 500;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_zero_tick_rejected() {
        let mut config = AppConfig::default();
        config.session.clock_tick_ms = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_time_bounds_ordering() {
        let mut config = AppConfig::default();
        config.session.min_preferred_time_ms = 600_000;
        config.session.max_preferred_time_ms = 300_000;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_config_round_trips_through_toml() {
        let config = AppConfig::default();
        let encoded = toml::to_string(&config).unwrap();
        let decoded: AppConfig = toml::from_str(&encoded).unwrap();
        assert_eq!(decoded.service.port, config.service.port);
        assert_eq!(decoded.session.clock_tick_ms, config.session.clock_tick_ms);
    }
}
