//! Error types for device operations.

use thiserror::Error;

/// Classified failure of a single device call.
///
/// Every variant is recoverable: the orchestration loop logs it, records it
/// against the affected component and keeps running.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeviceError {
    /// No response was received (connection refused, DNS, timeout).
    #[error("device unreachable: {0}")]
    Unreachable(String),

    /// Missing or rejected `X-API-Key` credential (HTTP 401).
    #[error("unauthorized")]
    Unauthorized,

    /// The device is busy with another transaction (HTTP 409).
    #[error("busy: active tx {}", .active_tx_id.as_deref().unwrap_or("unknown"))]
    Conflict { active_tx_id: Option<String> },

    /// The device has no record of the transaction (HTTP 404).
    #[error("transaction not found: {0}")]
    NotFound(String),

    /// Unexpected status or unparsable payload.
    #[error("protocol error (status {status}): {message}")]
    Protocol { status: u16, message: String },
}

impl DeviceError {
    /// Classify a reqwest transport error.
    pub(crate) fn from_transport(e: reqwest::Error, timeout_ms: u64) -> Self {
        if e.is_timeout() {
            DeviceError::Unreachable(format!("request timeout after {}ms", timeout_ms))
        } else {
            DeviceError::Unreachable(e.to_string())
        }
    }

    /// Whether the failure happened before any response arrived.
    pub fn is_transport(&self) -> bool {
        matches!(self, DeviceError::Unreachable(_))
    }
}
