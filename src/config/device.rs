//! Device connection configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Where the dispenser lives and how to talk to it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Base address, scheme optional (e.g., "192.168.4.20")
    pub endpoint: String,
    /// Value sent in the `X-API-Key` header for dispense calls
    pub api_key: String,
    /// Per-request timeout
    pub timeout_ms: u64,
}

impl DeviceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://192.168.4.20".to_string(),
            api_key: String::new(),
            timeout_ms: 3000,
        }
    }
}
