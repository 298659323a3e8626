//! Burst tests: a run of sequential dispense transactions.
//!
//! Each step is self-contained. It starts one transaction and polls it until
//! the device leaves `dispensing` or the step's poll budget runs out, then
//! reports back to the orchestration loop, which launches the next step.

use crate::device::{generate_tx_id, DeviceApi, DispenseReply, OperationOutcome, WireState};
use serde::Serialize;
use std::time::Duration;

pub const MAX_BURST_TOTAL: u32 = 50;
pub const MAX_BURST_QUANTITY: u32 = 10;

/// Burst parameters and counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BurstState {
    /// Number of transactions in the burst
    pub total: u32,
    /// Tokens per transaction
    pub quantity: u32,
    pub completed: u32,
    pub succeeded: u32,
    pub failed: u32,
    pub running: bool,
}

impl Default for BurstState {
    fn default() -> Self {
        Self {
            total: 10,
            quantity: 1,
            completed: 0,
            succeeded: 0,
            failed: 0,
            running: false,
        }
    }
}

impl BurstState {
    /// Share of successful steps among the completed ones.
    pub fn success_rate(&self) -> Option<f64> {
        if self.completed == 0 {
            return None;
        }
        Some(self.succeeded as f64 / self.completed as f64 * 100.0)
    }
}

/// Everything one burst step observed.
#[derive(Debug, Clone)]
pub struct BurstStepOutcome {
    pub tx_id: String,
    pub start: OperationOutcome<DispenseReply>,
    /// Last successful status reply, if any poll succeeded
    pub last_status: Option<DispenseReply>,
    pub polls: u32,
}

impl BurstStepOutcome {
    /// The most recent payload seen for the transaction.
    pub fn final_reply(&self) -> Option<&DispenseReply> {
        self.last_status.as_ref().or(self.start.payload.as_ref())
    }

    pub fn succeeded(&self) -> bool {
        self.start.is_success()
            && self
                .final_reply()
                .is_some_and(|r| r.lifecycle() == WireState::Done)
    }
}

/// Run one burst step against the device.
pub async fn run_burst_step<D>(
    device: &D,
    quantity: u32,
    poll_interval: Duration,
    max_polls: u32,
) -> BurstStepOutcome
where
    D: DeviceApi + ?Sized,
{
    let tx_id = generate_tx_id();
    let start = device.start_dispense(&tx_id, quantity).await;

    let mut last_status = None;
    let mut polls = 0;

    let in_progress = start
        .payload
        .as_ref()
        .is_some_and(|r| r.lifecycle() == WireState::Dispensing);

    if in_progress {
        while polls < max_polls {
            tokio::time::sleep(poll_interval).await;
            polls += 1;

            let status = device.query_dispense_status(&tx_id).await;
            if let Some(reply) = status.payload {
                let settled = reply.lifecycle() != WireState::Dispensing;
                last_status = Some(reply);
                if settled {
                    break;
                }
            }
        }
    }

    BurstStepOutcome {
        tx_id,
        start,
        last_status,
        polls,
    }
}

/// What the loop should do after a burst step completed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BurstProgress {
    /// The step did not belong to the running burst
    Stale,
    /// Launch step `index`
    Next { index: u32, quantity: u32 },
    /// All steps completed
    Finished,
}

/// Burst state owned by the orchestration loop.
#[derive(Debug, Clone, Default)]
pub struct BurstRunner {
    state: BurstState,
}

impl BurstRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &BurstState {
        &self.state
    }

    pub fn is_running(&self) -> bool {
        self.state.running
    }

    /// Change the number of steps, clamped to 1..=50. Ignored while running.
    pub fn adjust_total(&mut self, delta: i32) -> bool {
        if self.state.running {
            return false;
        }
        self.state.total = clamp_add(self.state.total, delta, MAX_BURST_TOTAL);
        true
    }

    /// Change tokens per step, clamped to 1..=10. Ignored while running.
    pub fn adjust_quantity(&mut self, delta: i32) -> bool {
        if self.state.running {
            return false;
        }
        self.state.quantity = clamp_add(self.state.quantity, delta, MAX_BURST_QUANTITY);
        true
    }

    /// Reset counters and return the first step, `None` if already running.
    pub fn begin(&mut self) -> Option<BurstProgress> {
        if self.state.running {
            return None;
        }
        self.state.running = true;
        self.state.completed = 0;
        self.state.succeeded = 0;
        self.state.failed = 0;
        Some(BurstProgress::Next {
            index: 0,
            quantity: self.state.quantity,
        })
    }

    /// Count a completed step and decide what comes next.
    pub fn apply(&mut self, index: u32, outcome: &BurstStepOutcome) -> BurstProgress {
        if !self.state.running || index != self.state.completed {
            return BurstProgress::Stale;
        }

        self.state.completed += 1;
        if outcome.succeeded() {
            self.state.succeeded += 1;
        } else {
            self.state.failed += 1;
        }

        if self.state.completed < self.state.total {
            BurstProgress::Next {
                index: self.state.completed,
                quantity: self.state.quantity,
            }
        } else {
            self.state.running = false;
            tracing::info!(
                total = self.state.total,
                succeeded = self.state.succeeded,
                failed = self.state.failed,
                "Burst test finished"
            );
            BurstProgress::Finished
        }
    }
}

fn clamp_add(value: u32, delta: i32, max: u32) -> u32 {
    (value as i64 + delta as i64).clamp(1, max as i64) as u32
}
