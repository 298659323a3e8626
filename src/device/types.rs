//! Wire types for the dispenser HTTP protocol.

use super::error::DeviceError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// `GET /health` response body.
///
/// Replaced wholesale on every successful health query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthSnapshot {
    pub status: String,
    /// Seconds since device boot
    pub uptime: u64,
    pub firmware: String,
    /// Device-side transaction state ("idle", "dispensing", ...)
    #[serde(default)]
    pub dispenser: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hopper_low: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wifi: Option<WifiInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gpio: Option<GpioInfo>,
    #[serde(default)]
    pub metrics: DispenseMetrics,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_tx: Option<ActiveTransaction>,
}

impl HealthSnapshot {
    /// Percentage of successful dispenses, `None` before the first dispense.
    pub fn success_rate(&self) -> Option<f64> {
        if self.metrics.total_dispenses == 0 {
            return None;
        }
        Some(self.metrics.successful as f64 / self.metrics.total_dispenses as f64 * 100.0)
    }
}

/// Cumulative dispense counters kept by the device.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispenseMetrics {
    pub total_dispenses: u32,
    pub successful: u32,
    pub jams: u32,
    pub partial: u32,
    pub failures: u32,
    pub last_error: String,
    pub last_error_type: String,
}

/// Summary of the transaction currently active on the device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveTransaction {
    pub tx_id: String,
    pub quantity: u32,
    pub dispensed: u32,
}

/// Radio link information.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WifiInfo {
    pub rssi: i32,
    #[serde(default)]
    pub ip: String,
    #[serde(default)]
    pub ssid: String,
}

/// Raw hopper signal lines.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GpioInfo {
    pub coin_pulse: SignalLine,
    pub error_signal: SignalLine,
    pub hopper_low: SignalLine,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalLine {
    pub raw: i32,
    pub active: bool,
}

/// `POST /dispense` request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispenseRequest {
    pub tx_id: String,
    pub quantity: u32,
}

/// Payload returned by both dispense endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispenseReply {
    pub tx_id: String,
    pub state: String,
    pub quantity: u32,
    pub dispensed: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DispenseReply {
    /// Device state parsed from the wire string.
    pub fn lifecycle(&self) -> WireState {
        WireState::parse(&self.state)
    }
}

/// Body of a 409 response.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct BusyResponse {
    #[serde(default)]
    pub active_tx_id: Option<String>,
}

/// Transaction state as reported by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireState {
    Idle,
    Dispensing,
    Done,
    Error,
    Unknown,
}

impl WireState {
    pub fn parse(s: &str) -> Self {
        match s {
            "idle" => WireState::Idle,
            "dispensing" => WireState::Dispensing,
            "done" => WireState::Done,
            "error" => WireState::Error,
            _ => WireState::Unknown,
        }
    }
}

/// Result of one device call.
///
/// Always produced, even on failure, so that latency and log entries can be
/// recorded the same way for every call.
#[derive(Debug, Clone)]
pub struct OperationOutcome<T> {
    /// Success payload
    pub payload: Option<T>,
    /// HTTP status, `0` when no response was received
    pub status: u16,
    /// Time from issuing the request until the body was read
    pub latency: Duration,
    pub error: Option<DeviceError>,
}

impl<T> OperationOutcome<T> {
    pub fn success(payload: T, status: u16, latency: Duration) -> Self {
        Self {
            payload: Some(payload),
            status,
            latency,
            error: None,
        }
    }

    pub fn failure(error: DeviceError, status: u16, latency: Duration) -> Self {
        Self {
            payload: None,
            status,
            latency,
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.payload.is_some()
    }

    /// Split into the `Result` view of the outcome.
    pub fn result(&self) -> Result<&T, DeviceError> {
        match (&self.payload, &self.error) {
            (Some(payload), None) => Ok(payload),
            (_, Some(error)) => Err(error.clone()),
            (None, None) => Err(DeviceError::Protocol {
                status: self.status,
                message: "empty response".to_string(),
            }),
        }
    }
}

impl fmt::Display for WireState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WireState::Idle => "idle",
            WireState::Dispensing => "dispensing",
            WireState::Done => "done",
            WireState::Error => "error",
            WireState::Unknown => "unknown",
        };
        f.write_str(s)
    }
}
