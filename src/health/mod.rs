//! Device health monitoring.
//!
//! The health query is issued at startup and then whenever at least the
//! configured interval has passed since the last attempt. The monitor keeps
//! the last good snapshot even while the device is unreachable, so the
//! console always has something to show.

mod config;


pub use config::HealthCheckConfig;

use crate::device::{DeviceError, HealthSnapshot, OperationOutcome};
use chrono::{DateTime, Utc};
use std::time::Instant;

/// Latest known device health.
#[derive(Debug, Clone)]
pub struct HealthMonitor {
    config: HealthCheckConfig,
    /// Last successful snapshot (kept across failures)
    snapshot: Option<HealthSnapshot>,
    /// Error of the most recent query, cleared on success
    error: Option<DeviceError>,
    connected: bool,
    last_attempt: Option<Instant>,
    last_success: Option<DateTime<Utc>>,
    consecutive_failures: u32,
}

impl HealthMonitor {
    pub fn new(config: HealthCheckConfig) -> Self {
        Self {
            config,
            snapshot: None,
            error: None,
            connected: false,
            last_attempt: None,
            last_success: None,
            consecutive_failures: 0,
        }
    }

    /// Whether a new query should be issued at `now`.
    pub fn is_due(&self, now: Instant) -> bool {
        match self.last_attempt {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.config.interval(),
        }
    }

    /// Remember that a query was issued at `now`.
    pub fn mark_attempt(&mut self, now: Instant) {
        self.last_attempt = Some(now);
    }

    /// Apply a completed query. Last completion wins.
    pub fn apply(&mut self, outcome: &OperationOutcome<HealthSnapshot>) {
        let was_connected = self.connected;

        match outcome.result() {
            Ok(snapshot) => {
                self.snapshot = Some(snapshot.clone());
                self.error = None;
                self.connected = true;
                self.last_success = Some(Utc::now());
                self.consecutive_failures = 0;

                if !was_connected {
                    tracing::info!(
                        firmware = %snapshot.firmware,
                        status = %snapshot.status,
                        "Device connection established"
                    );
                }
            }
            Err(error) => {
                self.consecutive_failures += 1;
                if was_connected {
                    tracing::warn!(error = %error, "Device connection lost");
                } else {
                    tracing::debug!(
                        error = %error,
                        consecutive_failures = self.consecutive_failures,
                        "Health query failed"
                    );
                }
                self.error = Some(error);
                self.connected = false;
            }
        }
    }

    pub fn snapshot(&self) -> Option<&HealthSnapshot> {
        self.snapshot.as_ref()
    }

    pub fn error(&self) -> Option<&DeviceError> {
        self.error.as_ref()
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn last_success(&self) -> Option<DateTime<Utc>> {
        self.last_success
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }
}
