//! Configuration module for the dispenser console
//!
//! Provides layered configuration loading from files, environment variables, and defaults.
//!
//! # Configuration Precedence
//!
//! 1. CLI arguments (highest priority)
//! 2. Environment variables (`TOKEN_DISPENSER_*`, `DISPENSER_*`)
//! 3. Configuration file (TOML)
//! 4. Default values (lowest priority)
//!
//! # Example
//!
//! ```rust
//! use dispenser::config::DispenserConfig;
//!
//! let config = DispenserConfig::default();
//! assert_eq!(config.health_check.interval_seconds, 5);
//!
//! let toml = r#"
//! [device]
//! endpoint = "10.0.0.7"
//! "#;
//! let config: DispenserConfig = toml::from_str(toml).unwrap();
//! assert_eq!(config.device.endpoint, "10.0.0.7");
//! assert_eq!(config.device.timeout_ms, 3000);
//! ```

pub mod console;
pub mod device;
pub mod error;
pub mod logging;

pub use console::ConsoleConfig;
pub use device::DeviceConfig;
pub use error::ConfigError;
pub use logging::{LogFormat, LoggingConfig};

// Section types owned by their modules
pub use crate::dispense::DispenseConfig;
pub use crate::health::HealthCheckConfig;

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Environment variable holding the device address.
pub const ENV_ENDPOINT: &str = "TOKEN_DISPENSER_ENDPOINT";
/// Environment variable holding the device credential.
pub const ENV_API_KEY: &str = "TOKEN_DISPENSER_API_KEY";

/// Unified configuration for the dispenser console.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct DispenserConfig {
    /// Device address, credential and timeout
    pub device: DeviceConfig,
    /// Health query cadence
    pub health_check: HealthCheckConfig,
    /// Status polling
    pub dispense: DispenseConfig,
    /// Tick and history bounds
    pub console: ConsoleConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

impl DispenserConfig {
    /// Load configuration from a TOML file
    ///
    /// If path is None, returns default configuration.
    /// If path doesn't exist, returns NotFound error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => {
                if !p.exists() {
                    return Err(ConfigError::NotFound(p.to_path_buf()));
                }
                let content = std::fs::read_to_string(p)?;
                toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
            }
            None => Ok(Self::default()),
        }
    }

    /// Apply environment variable overrides
    ///
    /// Invalid values are silently ignored (defaults are kept).
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(endpoint) = std::env::var(ENV_ENDPOINT) {
            if !endpoint.trim().is_empty() {
                self.device.endpoint = endpoint;
            }
        }
        if let Ok(key) = std::env::var(ENV_API_KEY) {
            self.device.api_key = key;
        }

        if let Ok(level) = std::env::var("DISPENSER_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("DISPENSER_LOG_FORMAT") {
            if let Ok(f) = format.parse() {
                self.logging.format = f;
            }
        }

        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.device.endpoint.trim().is_empty() {
            return Err(ConfigError::invalid(
                "device.endpoint",
                "endpoint cannot be empty",
            ));
        }
        if self.device.timeout_ms == 0 {
            return Err(ConfigError::invalid(
                "device.timeout_ms",
                "timeout must be non-zero",
            ));
        }
        if self.health_check.interval_seconds == 0 {
            return Err(ConfigError::invalid(
                "health_check.interval_seconds",
                "interval must be non-zero",
            ));
        }
        if self.dispense.poll_interval_ms == 0 {
            return Err(ConfigError::invalid(
                "dispense.poll_interval_ms",
                "poll interval must be non-zero",
            ));
        }
        if self.dispense.poll_timeout_seconds == 0 {
            return Err(ConfigError::invalid(
                "dispense.poll_timeout_seconds",
                "poll timeout must be non-zero",
            ));
        }
        if self.dispense.burst_max_polls == 0 {
            return Err(ConfigError::invalid(
                "dispense.burst_max_polls",
                "burst poll budget must be non-zero",
            ));
        }
        if self.console.tick_ms == 0 {
            return Err(ConfigError::invalid(
                "console.tick_ms",
                "tick must be non-zero",
            ));
        }
        if self.console.log_capacity == 0 {
            return Err(ConfigError::invalid(
                "console.log_capacity",
                "capacity must be non-zero",
            ));
        }
        if self.console.latency_capacity == 0 {
            return Err(ConfigError::invalid(
                "console.latency_capacity",
                "capacity must be non-zero",
            ));
        }

        Ok(())
    }
}
