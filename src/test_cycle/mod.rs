//! Scripted test cycles.
//!
//! A test cycle picks a quantity from a preset and drives the dispense
//! tracker through one transaction. It does not poll on its own: it watches
//! the tracker and records the verdict once the record is terminal.

pub mod burst;

pub use burst::{run_burst_step, BurstRunner, BurstState, BurstStepOutcome};

use crate::dispense::{DispenseRecord, DispenseState};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

/// Smallest custom quantity.
pub const MIN_CUSTOM_QUANTITY: u32 = 1;
/// Largest custom quantity (the firmware's per-transaction limit).
pub const MAX_CUSTOM_QUANTITY: u32 = 20;

/// Named quantity shortcut.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Preset {
    /// 1 token
    #[default]
    Single,
    /// 3 tokens
    Typical,
    /// 10 tokens
    Stress,
    /// Operator-chosen quantity
    Custom,
}

impl Preset {
    pub const ALL: [Preset; 4] = [Preset::Single, Preset::Typical, Preset::Stress, Preset::Custom];

    /// Fixed quantity of the preset, `None` for `Custom`.
    pub fn fixed_quantity(self) -> Option<u32> {
        match self {
            Preset::Single => Some(1),
            Preset::Typical => Some(3),
            Preset::Stress => Some(10),
            Preset::Custom => None,
        }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Preset::Single => "single",
            Preset::Typical => "typical",
            Preset::Stress => "stress",
            Preset::Custom => "custom",
        };
        f.write_str(s)
    }
}

impl FromStr for Preset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "single" => Ok(Preset::Single),
            "typical" => Ok(Preset::Typical),
            "stress" => Ok(Preset::Stress),
            "custom" => Ok(Preset::Custom),
            _ => Err(format!("Invalid preset: {}", s)),
        }
    }
}

/// Verdict of a completed test cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestCycleResult {
    /// Pass iff the transaction ended in `Done`
    pub passed: bool,
    pub message: String,
    pub elapsed: Duration,
}

/// Test cycle selection and progress.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestCycleState {
    pub preset: Preset,
    pub custom_quantity: u32,
    pub running: bool,
    pub last_result: Option<TestCycleResult>,
}

impl Default for TestCycleState {
    fn default() -> Self {
        Self {
            preset: Preset::Single,
            custom_quantity: 5,
            running: false,
            last_result: None,
        }
    }
}

impl TestCycleState {
    /// Quantity the selected preset would dispense.
    pub fn quantity(&self) -> u32 {
        self.preset
            .fixed_quantity()
            .unwrap_or(self.custom_quantity)
    }
}

/// Drives test cycles on top of the dispense tracker.
#[derive(Debug, Clone, Default)]
pub struct TestCycleRunner {
    state: TestCycleState,
    started_at: Option<Instant>,
}

impl TestCycleRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &TestCycleState {
        &self.state
    }

    pub fn is_running(&self) -> bool {
        self.state.running
    }

    /// Select a preset. Ignored while a cycle runs.
    pub fn select_preset(&mut self, preset: Preset) -> bool {
        if self.state.running {
            return false;
        }
        self.state.preset = preset;
        true
    }

    /// Change the custom quantity by `delta`, clamped to 1..=20. Ignored while a cycle runs.
    pub fn adjust_custom(&mut self, delta: i32) -> bool {
        if self.state.running {
            return false;
        }
        let next = (self.state.custom_quantity as i64 + delta as i64)
            .clamp(MIN_CUSTOM_QUANTITY as i64, MAX_CUSTOM_QUANTITY as i64);
        self.state.custom_quantity = next as u32;
        true
    }

    /// Start a cycle and return the quantity to dispense, `None` if one is running.
    pub fn begin(&mut self, now: Instant) -> Option<u32> {
        if self.state.running {
            return None;
        }
        self.state.running = true;
        self.started_at = Some(now);
        Some(self.state.quantity())
    }

    /// Finish the running cycle once `record` is terminal.
    pub fn observe(&mut self, record: &DispenseRecord, now: Instant) -> Option<&TestCycleResult> {
        if !self.state.running || !record.is_terminal() {
            return None;
        }

        let elapsed = self
            .started_at
            .take()
            .map(|start| now.saturating_duration_since(start))
            .unwrap_or_default();
        let passed = record.state == DispenseState::Done;

        let mut message = format!(
            "{}: dispensed {}/{} in {:.2}s",
            if passed { "PASS" } else { "FAIL" },
            record.dispensed,
            record.quantity,
            elapsed.as_secs_f64()
        );
        if let Some(error) = record.error.as_deref().filter(|_| !passed) {
            message.push_str(&format!(" ({})", error));
        }

        self.state.running = false;
        self.state.last_result = Some(TestCycleResult {
            passed,
            message,
            elapsed,
        });
        self.state.last_result.as_ref()
    }
}
