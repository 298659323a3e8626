//! Runs deferred device calls and drives the orchestration loop.

use super::{Console, ConsoleSnapshot, Deferred, Event, Input};
use crate::device::DeviceApi;
use crate::dispense::DispenseConfig;
use crate::test_cycle::run_burst_step;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// Spawns one task per deferred operation and reports results as events.
pub struct Executor {
    device: Arc<dyn DeviceApi>,
    events: mpsc::UnboundedSender<Event>,
    dispense: DispenseConfig,
    tasks: TaskTracker,
}

impl Executor {
    pub fn new(
        device: Arc<dyn DeviceApi>,
        events: mpsc::UnboundedSender<Event>,
        dispense: DispenseConfig,
    ) -> Self {
        Self {
            device,
            events,
            dispense,
            tasks: TaskTracker::new(),
        }
    }

    /// Number of device calls still running.
    pub fn in_flight(&self) -> usize {
        self.tasks.len()
    }

    pub fn dispatch(&self, op: Deferred) {
        let device = Arc::clone(&self.device);
        let events = self.events.clone();

        // Send errors mean the loop has exited; the result is no longer wanted.
        match op {
            Deferred::QueryHealth => {
                self.tasks.spawn(async move {
                    let outcome = device.query_health().await;
                    let _ = events.send(Event::HealthCompleted(outcome));
                });
            }
            Deferred::StartDispense { tx_id, quantity } => {
                self.tasks.spawn(async move {
                    let outcome = device.start_dispense(&tx_id, quantity).await;
                    let _ = events.send(Event::DispenseStarted {
                        tx_id,
                        quantity,
                        outcome,
                    });
                });
            }
            Deferred::PollDispense { tx_id, delay } => {
                self.tasks.spawn(async move {
                    tokio::time::sleep(delay).await;
                    let outcome = device.query_dispense_status(&tx_id).await;
                    let _ = events.send(Event::DispensePolled { tx_id, outcome });
                });
            }
            Deferred::BurstStep { index, quantity } => {
                let poll_interval = self.dispense.poll_interval();
                let max_polls = self.dispense.burst_max_polls;
                self.tasks.spawn(async move {
                    let outcome =
                        run_burst_step(device.as_ref(), quantity, poll_interval, max_polls).await;
                    let _ = events.send(Event::BurstStepCompleted { index, outcome });
                });
            }
        }
    }

    /// Stop accepting work. Running calls finish in the background.
    pub fn close(&self) {
        self.tasks.close();
    }
}

/// Drive `console` until the operator quits, `inputs` closes, or `cancel` fires.
///
/// A snapshot is published after every handled event. Time is read from the
/// tokio clock so paused-time tests drive cadence and poll ceilings. Returns
/// the console so callers can inspect the final state.
pub async fn run(
    mut console: Console,
    device: Arc<dyn DeviceApi>,
    mut inputs: mpsc::Receiver<Input>,
    snapshots: watch::Sender<ConsoleSnapshot>,
    cancel: CancellationToken,
) -> Console {
    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let executor = Executor::new(device, events_tx, console.dispense_config().clone());

    let mut ticker = tokio::time::interval(console.tick_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // The first tick completes immediately; startup already queries health.
    ticker.tick().await;

    for op in console.start(Instant::now().into_std()) {
        executor.dispatch(op);
    }
    publish(&console, &executor, &snapshots);

    tracing::debug!("Console loop started");

    loop {
        let event = tokio::select! {
            _ = cancel.cancelled() => {
                tracing::debug!("Console loop cancelled");
                break;
            }
            _ = ticker.tick() => Event::Tick,
            Some(event) = events_rx.recv() => event,
            input = inputs.recv() => match input {
                Some(input) => Event::Input(input),
                None => {
                    tracing::debug!("Input channel closed");
                    break;
                }
            },
        };

        for op in console.handle_at(event, Instant::now().into_std()) {
            executor.dispatch(op);
        }
        publish(&console, &executor, &snapshots);

        if console.is_quitting() {
            break;
        }
    }

    executor.close();
    console
}

fn publish(console: &Console, executor: &Executor, snapshots: &watch::Sender<ConsoleSnapshot>) {
    let mut snapshot = console.snapshot();
    snapshot.in_flight = executor.in_flight();
    snapshots.send_replace(snapshot);
}
