//! Configuration for dispense polling.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Status poll timing for tracked transactions and burst steps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispenseConfig {
    /// Delay between two status polls
    pub poll_interval_ms: u64,
    /// How long a tracked transaction may stay open after the device acknowledged it
    pub poll_timeout_seconds: u64,
    /// Status polls per burst step before giving up on it
    pub burst_max_polls: u32,
}

impl DispenseConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_secs(self.poll_timeout_seconds)
    }
}

impl Default for DispenseConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 250,
            poll_timeout_seconds: 30,
            burst_max_polls: 120,
        }
    }
}
