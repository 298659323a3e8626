//! Console scheduling and history configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tick granularity and history bounds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    /// Scheduling tick driving the health cadence
    pub tick_ms: u64,
    /// Maximum request log entries kept
    pub log_capacity: usize,
    /// Maximum latency samples kept
    pub latency_capacity: usize,
}

impl ConsoleConfig {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            tick_ms: 1000,
            log_capacity: 100,
            latency_capacity: 60,
        }
    }
}
