//! Events consumed and work produced by the orchestration loop.

use crate::device::{DispenseReply, HealthSnapshot, OperationOutcome};
use crate::test_cycle::{BurstStepOutcome, Preset};
use std::time::Duration;

/// Discrete operator input emitted by the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// Query health now, regardless of cadence
    RefreshHealth,
    /// Adjust the manual dispense quantity
    QuantityUp,
    QuantityDown,
    /// Dispense the manual quantity
    Dispense,
    SelectPreset(Preset),
    CustomUp,
    CustomDown,
    StartTestCycle,
    BurstTotalUp,
    BurstTotalDown,
    BurstQuantityUp,
    BurstQuantityDown,
    StartBurst,
    ScrollUp,
    ScrollDown,
    ScrollTop,
    ScrollBottom,
    ClearLog,
    Quit,
}

/// Everything the loop reacts to, processed one at a time.
#[derive(Debug, Clone)]
pub enum Event {
    /// Scheduling tick
    Tick,
    Input(Input),
    HealthCompleted(OperationOutcome<HealthSnapshot>),
    DispenseStarted {
        tx_id: String,
        quantity: u32,
        outcome: OperationOutcome<DispenseReply>,
    },
    DispensePolled {
        tx_id: String,
        outcome: OperationOutcome<DispenseReply>,
    },
    BurstStepCompleted {
        index: u32,
        outcome: BurstStepOutcome,
    },
}

/// Asynchronous work requested by the loop. Its result comes back as an [`Event`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Deferred {
    QueryHealth,
    StartDispense { tx_id: String, quantity: u32 },
    PollDispense { tx_id: String, delay: Duration },
    BurstStep { index: u32, quantity: u32 },
}
