//! Dispense lifecycle tracking.
//!
//! The device dispenses asynchronously and can only be observed by polling.
//! [`DispenseTracker`] owns the single tracked transaction and decides, for
//! every start or poll result, what the orchestration loop should do next.
//!
//! ```text
//! Idle ──start ok (dispensing)──▶ Dispensing ──poll (done)──▶ Done
//!   │                               │  ▲
//!   │                               └──┘ poll in progress / poll failed
//!   └──start failed──▶ Error ◀──poll (error) / poll ceiling──┘
//! ```
//!
//! Terminal records are only replaced by a new start with a new id.

mod config;
mod state;

#[cfg(test)]
mod tests;

pub use config::DispenseConfig;
pub use state::{DispenseRecord, DispenseState, PendingStart};

use crate::device::{DispenseReply, OperationOutcome, WireState};
use std::time::{Duration, Instant};

/// Message stored on a record that outlived the poll ceiling.
pub const POLL_TIMEOUT_MESSAGE: &str = "timed out waiting for device";

/// What the loop should do after a result was applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackerStep {
    /// The result belongs to a transaction that is no longer tracked
    Stale,
    /// Poll `tx_id` again after `delay`
    Poll { tx_id: String, delay: Duration },
    /// The start call failed; the record is in `Error` and nothing is polled
    Rejected,
    /// The device reported a terminal state (or the poll ceiling was hit)
    Finished,
}

/// Refusal to start while a transaction is open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerBusy {
    pub tx_id: String,
}

/// State machine for the one dispense transaction the console tracks.
#[derive(Debug, Clone)]
pub struct DispenseTracker {
    config: DispenseConfig,
    pending: Option<PendingStart>,
    record: Option<DispenseRecord>,
}

impl DispenseTracker {
    pub fn new(config: DispenseConfig) -> Self {
        Self {
            config,
            pending: None,
            record: None,
        }
    }

    /// Current lifecycle state, `Idle` when nothing is recorded.
    pub fn state(&self) -> DispenseState {
        self.record
            .as_ref()
            .map(|r| r.state)
            .unwrap_or(DispenseState::Idle)
    }

    pub fn record(&self) -> Option<&DispenseRecord> {
        self.record.as_ref()
    }

    pub fn pending(&self) -> Option<&PendingStart> {
        self.pending.as_ref()
    }

    /// True while a start is unanswered or the record is non-terminal.
    pub fn is_busy(&self) -> bool {
        self.pending.is_some()
            || self
                .record
                .as_ref()
                .is_some_and(|r| !r.is_terminal())
    }

    /// Clear any prior record and wait for the answer to a new start.
    pub fn begin(&mut self, tx_id: String, quantity: u32) -> Result<(), TrackerBusy> {
        if let Some(pending) = &self.pending {
            return Err(TrackerBusy {
                tx_id: pending.tx_id.clone(),
            });
        }
        if let Some(record) = self.record.as_ref().filter(|r| !r.is_terminal()) {
            return Err(TrackerBusy {
                tx_id: record.tx_id.clone(),
            });
        }

        self.record = None;
        self.pending = Some(PendingStart { tx_id, quantity });
        Ok(())
    }

    /// Apply the result of `startDispense`.
    pub fn apply_start(
        &mut self,
        tx_id: &str,
        outcome: &OperationOutcome<DispenseReply>,
        now: Instant,
    ) -> TrackerStep {
        let pending = match self.pending.take() {
            Some(p) if p.tx_id == tx_id => p,
            other => {
                self.pending = other;
                return TrackerStep::Stale;
            }
        };

        let mut record = DispenseRecord::new(pending.tx_id, pending.quantity, now);

        let reply = match outcome.result() {
            Ok(reply) => reply,
            Err(error) => {
                tracing::warn!(tx_id = tx_id, error = %error, "Dispense start failed");
                record.fail(error.to_string());
                self.record = Some(record);
                return TrackerStep::Rejected;
            }
        };

        // A different quantity means the device answered for another request
        // (e.g. a replayed transaction id); its progress is not ours to count.
        if reply.quantity > 0 && reply.quantity != record.quantity {
            tracing::warn!(
                tx_id = tx_id,
                requested = record.quantity,
                reported = reply.quantity,
                "Device reported a different quantity"
            );
            record.fail(format!(
                "device reported quantity {}, requested {}",
                reply.quantity, record.quantity
            ));
            self.record = Some(record);
            return TrackerStep::Finished;
        }
        record.observe_dispensed(reply.dispensed);

        let step = match reply.lifecycle() {
            WireState::Dispensing => {
                tracing::info!(
                    tx_id = tx_id,
                    quantity = record.quantity,
                    "Dispense started"
                );
                TrackerStep::Poll {
                    tx_id: record.tx_id.clone(),
                    delay: self.config.poll_interval(),
                }
            }
            WireState::Done => {
                record.state = DispenseState::Done;
                TrackerStep::Finished
            }
            WireState::Error => {
                record.fail(device_error_text(reply));
                TrackerStep::Finished
            }
            state @ (WireState::Idle | WireState::Unknown) => {
                record.fail(format!("unexpected device state '{}'", reply.state));
                tracing::warn!(tx_id = tx_id, state = %state, "Unexpected state after start");
                TrackerStep::Finished
            }
        };

        self.record = Some(record);
        step
    }

    /// Apply the result of `queryDispenseStatus`.
    ///
    /// Failed polls never change state: the transaction may still be
    /// progressing on the device, so polling continues until the ceiling.
    pub fn apply_poll(
        &mut self,
        tx_id: &str,
        outcome: &OperationOutcome<DispenseReply>,
        now: Instant,
    ) -> TrackerStep {
        let poll_interval = self.config.poll_interval();
        let poll_timeout = self.config.poll_timeout();

        let record = match self.record.as_mut() {
            Some(r) if r.tx_id == tx_id && !r.is_terminal() => r,
            _ => return TrackerStep::Stale,
        };

        match outcome.result() {
            Ok(reply) => {
                record.observe_dispensed(reply.dispensed);
                match reply.lifecycle() {
                    WireState::Done => {
                        record.state = DispenseState::Done;
                        record.error = None;
                    }
                    WireState::Error => record.fail(device_error_text(reply)),
                    WireState::Dispensing | WireState::Idle | WireState::Unknown => {}
                }
            }
            Err(error) => {
                tracing::debug!(tx_id = tx_id, error = %error, "Status poll failed, retrying");
            }
        }

        if !record.is_terminal()
            && now.saturating_duration_since(record.acknowledged_at) >= poll_timeout
        {
            tracing::warn!(
                tx_id = tx_id,
                dispensed = record.dispensed,
                quantity = record.quantity,
                "Dispense did not finish before the poll ceiling"
            );
            record.fail(POLL_TIMEOUT_MESSAGE);
        }

        if record.is_terminal() {
            tracing::info!(
                tx_id = tx_id,
                state = %record.state,
                dispensed = record.dispensed,
                quantity = record.quantity,
                "Dispense finished"
            );
            TrackerStep::Finished
        } else {
            TrackerStep::Poll {
                tx_id: record.tx_id.clone(),
                delay: poll_interval,
            }
        }
    }
}

fn device_error_text(reply: &DispenseReply) -> String {
    reply
        .error
        .clone()
        .filter(|e| !e.is_empty())
        .unwrap_or_else(|| "device reported error".to_string())
}
