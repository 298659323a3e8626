//! Configuration for the health monitor.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Health query cadence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    /// Minimum seconds between two health query attempts
    pub interval_seconds: u64,
}

impl HealthCheckConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            interval_seconds: 5,
        }
    }
}
