//! Dispense record and lifecycle state.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::time::Instant;

/// Lifecycle of the tracked transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DispenseState {
    /// No active record
    Idle,
    /// Device acknowledged the start, tokens may still be coming
    Dispensing,
    /// Terminal, every requested token was dispensed
    Done,
    /// Terminal, the start failed or the device reported a failure
    Error,
}

impl DispenseState {
    pub fn is_terminal(self) -> bool {
        matches!(self, DispenseState::Done | DispenseState::Error)
    }
}

impl fmt::Display for DispenseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DispenseState::Idle => "idle",
            DispenseState::Dispensing => "dispensing",
            DispenseState::Done => "done",
            DispenseState::Error => "error",
        };
        f.write_str(s)
    }
}

/// One requested dispense operation.
#[derive(Debug, Clone, Serialize)]
pub struct DispenseRecord {
    /// Client-generated id correlating the start with its polls
    pub tx_id: String,
    pub quantity: u32,
    /// Never decreases and never exceeds `quantity`
    pub dispensed: u32,
    pub state: DispenseState,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    /// When the device acknowledged the start; bounds the poll loop
    #[serde(skip)]
    pub(crate) acknowledged_at: Instant,
}

impl DispenseRecord {
    pub(crate) fn new(tx_id: String, quantity: u32, acknowledged_at: Instant) -> Self {
        Self {
            tx_id,
            quantity,
            dispensed: 0,
            state: DispenseState::Dispensing,
            error: None,
            started_at: Utc::now(),
            acknowledged_at,
        }
    }

    /// Record a progress report, keeping the count monotonic and bounded.
    pub(crate) fn observe_dispensed(&mut self, reported: u32) {
        let reported = reported.min(self.quantity);
        if reported > self.dispensed {
            self.dispensed = reported;
        }
    }

    pub(crate) fn fail(&mut self, message: impl Into<String>) {
        self.state = DispenseState::Error;
        self.error = Some(message.into());
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}

/// A start request issued but not yet answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingStart {
    pub tx_id: String,
    pub quantity: u32,
}
