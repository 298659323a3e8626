//! Orchestration loop for the operator console.
//!
//! [`Console`] owns every piece of mutable state: health, the tracked
//! dispense transaction, test cycle and burst progress, and the history
//! buffers. It handles one [`Event`] at a time to completion and answers with
//! zero or more [`Deferred`] operations. [`run`] dispatches those operations
//! as independent tasks whose results re-enter the loop as events, so
//! network calls may overlap while state mutation stays strictly sequential.
//!
//! Results are applied in completion order. Health snapshots are full
//! replacements (last completion wins); dispense results are gated on the
//! tracked transaction id and burst results on the expected step index.

mod events;
mod executor;
mod snapshot;


pub use events::{Deferred, Event, Input};
pub use executor::{run, Executor};
pub use snapshot::ConsoleSnapshot;

use crate::config::DispenserConfig;
use crate::device::{generate_tx_id, DispenseReply, HealthSnapshot, OperationOutcome};
use crate::dispense::{DispenseConfig, DispenseTracker, TrackerStep};
use crate::health::HealthMonitor;
use crate::history::{BoundedHistory, LatencySample, LogEntry};
use crate::test_cycle::burst::BurstProgress;
use crate::test_cycle::{BurstRunner, BurstStepOutcome, TestCycleRunner};
use std::time::{Duration, Instant};

/// Largest manual dispense quantity.
pub const MAX_MANUAL_QUANTITY: u32 = 20;
/// Manual dispense quantity at startup.
pub const DEFAULT_MANUAL_QUANTITY: u32 = 3;

/// Single owner of all console state.
#[derive(Debug)]
pub struct Console {
    tick: Duration,
    dispense_config: DispenseConfig,
    health: HealthMonitor,
    tracker: DispenseTracker,
    test_cycle: TestCycleRunner,
    burst: BurstRunner,
    log: BoundedHistory<LogEntry>,
    log_appended: u64,
    log_cursor: usize,
    latency: BoundedHistory<LatencySample>,
    manual_quantity: u32,
    ticks: u64,
    quitting: bool,
}

impl Console {
    pub fn new(config: &DispenserConfig) -> Self {
        Self {
            tick: config.console.tick(),
            dispense_config: config.dispense.clone(),
            health: HealthMonitor::new(config.health_check.clone()),
            tracker: DispenseTracker::new(config.dispense.clone()),
            test_cycle: TestCycleRunner::new(),
            burst: BurstRunner::new(),
            log: BoundedHistory::new(config.console.log_capacity),
            log_appended: 0,
            log_cursor: 0,
            latency: BoundedHistory::new(config.console.latency_capacity),
            manual_quantity: DEFAULT_MANUAL_QUANTITY,
            ticks: 0,
            quitting: false,
        }
    }

    /// Work to schedule at startup: the initial health query.
    pub fn start(&mut self, now: Instant) -> Vec<Deferred> {
        vec![self.schedule_health(now)]
    }

    /// Handle one event using the current time.
    pub fn handle(&mut self, event: Event) -> Vec<Deferred> {
        self.handle_at(event, Instant::now())
    }

    /// Handle one event as if it happened at `now`.
    pub fn handle_at(&mut self, event: Event, now: Instant) -> Vec<Deferred> {
        match event {
            Event::Tick => self.on_tick(now),
            Event::Input(input) => self.on_input(input, now),
            Event::HealthCompleted(outcome) => {
                self.on_health(outcome);
                Vec::new()
            }
            Event::DispenseStarted {
                tx_id,
                quantity,
                outcome,
            } => self.on_dispense_started(&tx_id, quantity, outcome, now),
            Event::DispensePolled { tx_id, outcome } => {
                self.on_dispense_polled(&tx_id, outcome, now)
            }
            Event::BurstStepCompleted { index, outcome } => {
                self.on_burst_step(index, outcome, now)
            }
        }
    }

    /// Read-only copy of everything the presentation layer shows.
    pub fn snapshot(&self) -> ConsoleSnapshot {
        ConsoleSnapshot {
            health: self.health.snapshot().cloned(),
            health_error: self.health.error().map(|e| e.to_string()),
            connected: self.health.is_connected(),
            dispense: self.tracker.record().cloned(),
            pending: self.tracker.pending().cloned(),
            manual_quantity: self.manual_quantity,
            test_cycle: self.test_cycle.state().clone(),
            burst: self.burst.state().clone(),
            log: self.log.to_vec(),
            log_appended: self.log_appended,
            log_cursor: self.log_cursor,
            latency: self.latency.to_vec(),
            latency_stats: self.latency.stats(),
            ticks: self.ticks,
            in_flight: 0,
        }
    }

    pub fn tick_interval(&self) -> Duration {
        self.tick
    }

    pub fn dispense_config(&self) -> &DispenseConfig {
        &self.dispense_config
    }

    pub fn health(&self) -> &HealthMonitor {
        &self.health
    }

    pub fn tracker(&self) -> &DispenseTracker {
        &self.tracker
    }

    pub fn test_cycle(&self) -> &TestCycleRunner {
        &self.test_cycle
    }

    pub fn burst(&self) -> &BurstRunner {
        &self.burst
    }

    pub fn log(&self) -> &BoundedHistory<LogEntry> {
        &self.log
    }

    pub fn latency(&self) -> &BoundedHistory<LatencySample> {
        &self.latency
    }

    pub fn manual_quantity(&self) -> u32 {
        self.manual_quantity
    }

    pub fn is_quitting(&self) -> bool {
        self.quitting
    }

    // ------------------------------------------------------------------------
    // Event handlers
    // ------------------------------------------------------------------------

    fn on_tick(&mut self, now: Instant) -> Vec<Deferred> {
        self.ticks += 1;
        if self.health.is_due(now) {
            vec![self.schedule_health(now)]
        } else {
            Vec::new()
        }
    }

    fn on_input(&mut self, input: Input, now: Instant) -> Vec<Deferred> {
        match input {
            Input::RefreshHealth => return vec![self.schedule_health(now)],
            Input::QuantityUp => {
                self.manual_quantity = (self.manual_quantity + 1).min(MAX_MANUAL_QUANTITY)
            }
            Input::QuantityDown => {
                self.manual_quantity = self.manual_quantity.saturating_sub(1).max(1)
            }
            Input::Dispense => {
                if self.burst.is_running() || self.test_cycle.is_running() {
                    tracing::debug!("Dispense refused while a test is running");
                    return Vec::new();
                }
                return self.begin_dispense(self.manual_quantity).into_iter().collect();
            }
            Input::SelectPreset(preset) => {
                if !self.test_cycle.select_preset(preset) {
                    tracing::debug!(preset = %preset, "Preset change ignored while running");
                }
            }
            Input::CustomUp => {
                self.test_cycle.adjust_custom(1);
            }
            Input::CustomDown => {
                self.test_cycle.adjust_custom(-1);
            }
            Input::StartTestCycle => return self.start_test_cycle(now),
            Input::BurstTotalUp => {
                self.burst.adjust_total(1);
            }
            Input::BurstTotalDown => {
                self.burst.adjust_total(-1);
            }
            Input::BurstQuantityUp => {
                self.burst.adjust_quantity(1);
            }
            Input::BurstQuantityDown => {
                self.burst.adjust_quantity(-1);
            }
            Input::StartBurst => return self.start_burst(),
            Input::ScrollUp => self.log_cursor = self.log_cursor.saturating_sub(1),
            Input::ScrollDown => {
                self.log_cursor = (self.log_cursor + 1).min(self.log.len().saturating_sub(1))
            }
            Input::ScrollTop => self.log_cursor = 0,
            Input::ScrollBottom => self.log_cursor = self.log.len().saturating_sub(1),
            Input::ClearLog => {
                self.log.clear();
                self.log_cursor = 0;
            }
            Input::Quit => self.quitting = true,
        }
        Vec::new()
    }

    fn on_health(&mut self, outcome: OperationOutcome<HealthSnapshot>) {
        let detail = match outcome.result() {
            Ok(health) => format!("status={} dispenser={}", health.status, health.dispenser),
            Err(error) => error.to_string(),
        };
        self.record_call("GET", "/health".to_string(), &outcome, detail);
        self.health.apply(&outcome);
    }

    fn on_dispense_started(
        &mut self,
        tx_id: &str,
        quantity: u32,
        outcome: OperationOutcome<DispenseReply>,
        now: Instant,
    ) -> Vec<Deferred> {
        let detail = match outcome.result() {
            Ok(reply) => format!(
                "tx={} qty={} state={}",
                reply.tx_id, reply.quantity, reply.state
            ),
            Err(error) => format!("tx={} qty={} {}", tx_id, quantity, error),
        };
        self.record_call("POST", "/dispense".to_string(), &outcome, detail);

        let step = self.tracker.apply_start(tx_id, &outcome, now);
        self.after_tracker_step(tx_id, step, now)
    }

    fn on_dispense_polled(
        &mut self,
        tx_id: &str,
        outcome: OperationOutcome<DispenseReply>,
        now: Instant,
    ) -> Vec<Deferred> {
        let detail = match outcome.result() {
            Ok(reply) => format!(
                "dispensed={}/{} state={}",
                reply.dispensed, reply.quantity, reply.state
            ),
            Err(error) => error.to_string(),
        };
        self.record_call("GET", format!("/dispense/{}", tx_id), &outcome, detail);

        let step = self.tracker.apply_poll(tx_id, &outcome, now);
        self.after_tracker_step(tx_id, step, now)
    }

    fn on_burst_step(
        &mut self,
        index: u32,
        outcome: BurstStepOutcome,
        now: Instant,
    ) -> Vec<Deferred> {
        let step = index + 1;
        let detail = match (outcome.start.result(), outcome.final_reply()) {
            (Ok(_), Some(reply)) => format!(
                "burst[{}] tx={} state={} dispensed={}/{}",
                step, outcome.tx_id, reply.state, reply.dispensed, reply.quantity
            ),
            (Ok(_), None) => format!("burst[{}] tx={}", step, outcome.tx_id),
            (Err(error), _) => format!("burst[{}] {}", step, error),
        };
        self.record_call("POST", "/dispense".to_string(), &outcome.start, detail);

        match self.burst.apply(index, &outcome) {
            BurstProgress::Stale => {
                tracing::debug!(index = index, "Discarding burst step outside the running burst");
                Vec::new()
            }
            BurstProgress::Next { index, quantity } => vec![Deferred::BurstStep { index, quantity }],
            BurstProgress::Finished => vec![self.schedule_health(now)],
        }
    }

    // ------------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------------

    fn schedule_health(&mut self, now: Instant) -> Deferred {
        self.health.mark_attempt(now);
        Deferred::QueryHealth
    }

    fn begin_dispense(&mut self, quantity: u32) -> Option<Deferred> {
        let tx_id = generate_tx_id();
        match self.tracker.begin(tx_id.clone(), quantity) {
            Ok(()) => Some(Deferred::StartDispense { tx_id, quantity }),
            Err(busy) => {
                tracing::debug!(active_tx_id = %busy.tx_id, "Dispense refused, transaction in flight");
                None
            }
        }
    }

    fn start_test_cycle(&mut self, now: Instant) -> Vec<Deferred> {
        if self.burst.is_running() || self.tracker.is_busy() {
            tracing::debug!("Test cycle refused, device busy");
            return Vec::new();
        }
        let Some(quantity) = self.test_cycle.begin(now) else {
            tracing::debug!("Test cycle already running");
            return Vec::new();
        };

        tracing::info!(
            preset = %self.test_cycle.state().preset,
            quantity = quantity,
            "Test cycle started"
        );
        self.begin_dispense(quantity).into_iter().collect()
    }

    fn start_burst(&mut self) -> Vec<Deferred> {
        if self.tracker.is_busy() || self.test_cycle.is_running() {
            tracing::debug!("Burst refused, transaction in flight");
            return Vec::new();
        }
        match self.burst.begin() {
            Some(BurstProgress::Next { index, quantity }) => {
                tracing::info!(
                    total = self.burst.state().total,
                    quantity = quantity,
                    "Burst test started"
                );
                vec![Deferred::BurstStep { index, quantity }]
            }
            _ => Vec::new(),
        }
    }

    fn after_tracker_step(&mut self, tx_id: &str, step: TrackerStep, now: Instant) -> Vec<Deferred> {
        match step {
            TrackerStep::Stale => {
                tracing::debug!(tx_id = tx_id, "Discarding result for untracked transaction");
                Vec::new()
            }
            TrackerStep::Poll { tx_id, delay } => vec![Deferred::PollDispense { tx_id, delay }],
            TrackerStep::Rejected => {
                self.observe_test_cycle(now);
                Vec::new()
            }
            TrackerStep::Finished => {
                self.observe_test_cycle(now);
                vec![self.schedule_health(now)]
            }
        }
    }

    fn observe_test_cycle(&mut self, now: Instant) {
        let Some(record) = self.tracker.record() else {
            return;
        };
        if let Some(result) = self.test_cycle.observe(record, now) {
            tracing::info!(passed = result.passed, "{}", result.message);
        }
    }

    /// Log a device call and sample its latency.
    fn record_call<T>(
        &mut self,
        method: &str,
        path: String,
        outcome: &OperationOutcome<T>,
        detail: String,
    ) {
        self.latency.push(LatencySample::from(outcome.latency));
        self.log.push(LogEntry::new(
            method,
            path,
            outcome.status,
            outcome.latency,
            detail,
            outcome.error.is_some(),
        ));
        self.log_appended += 1;
        self.log_cursor = self.log.len().saturating_sub(1);
    }
}
