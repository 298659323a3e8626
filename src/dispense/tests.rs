//! Unit tests for the dispense tracker.

use super::*;
use crate::device::DeviceError;

fn tracker() -> DispenseTracker {
    DispenseTracker::new(DispenseConfig::default())
}

fn reply(tx_id: &str, state: &str, quantity: u32, dispensed: u32) -> OperationOutcome<DispenseReply> {
    OperationOutcome::success(
        DispenseReply {
            tx_id: tx_id.to_string(),
            state: state.to_string(),
            quantity,
            dispensed,
            error: None,
        },
        200,
        Duration::from_millis(20),
    )
}

fn failed(error: DeviceError, status: u16) -> OperationOutcome<DispenseReply> {
    OperationOutcome::failure(error, status, Duration::from_millis(20))
}

fn started(tx_id: &str, quantity: u32, now: Instant) -> DispenseTracker {
    let mut tracker = tracker();
    tracker.begin(tx_id.to_string(), quantity).unwrap();
    tracker.apply_start(tx_id, &reply(tx_id, "dispensing", quantity, 0), now);
    tracker
}

// ============================================================================
// Start
// ============================================================================

#[test]
fn test_new_tracker_is_idle() {
    let tracker = tracker();
    assert_eq!(tracker.state(), DispenseState::Idle);
    assert!(tracker.record().is_none());
    assert!(!tracker.is_busy());
}

#[test]
fn test_begin_marks_pending() {
    let mut tracker = tracker();
    tracker.begin("abc123".to_string(), 5).unwrap();

    assert!(tracker.is_busy());
    assert_eq!(tracker.state(), DispenseState::Idle);
    assert_eq!(tracker.pending().unwrap().quantity, 5);
}

#[test]
fn test_begin_refused_while_pending() {
    let mut tracker = tracker();
    tracker.begin("first".to_string(), 1).unwrap();

    let err = tracker.begin("second".to_string(), 1).unwrap_err();
    assert_eq!(err.tx_id, "first");
}

#[test]
fn test_start_dispensing_schedules_poll() {
    let mut tracker = tracker();
    tracker.begin("abc123".to_string(), 5).unwrap();

    let step = tracker.apply_start("abc123", &reply("abc123", "dispensing", 5, 0), Instant::now());

    assert_eq!(
        step,
        TrackerStep::Poll {
            tx_id: "abc123".to_string(),
            delay: Duration::from_millis(250),
        }
    );
    assert_eq!(tracker.state(), DispenseState::Dispensing);
    let record = tracker.record().unwrap();
    assert_eq!(record.quantity, 5);
    assert_eq!(record.dispensed, 0);
    assert!(tracker.pending().is_none());
    assert!(tracker.is_busy());
}

#[test]
fn test_start_conflict_goes_straight_to_error() {
    let mut tracker = tracker();
    tracker.begin("abc123".to_string(), 5).unwrap();

    let conflict = failed(
        DeviceError::Conflict {
            active_tx_id: Some("xyz999".to_string()),
        },
        409,
    );
    let step = tracker.apply_start("abc123", &conflict, Instant::now());

    assert_eq!(step, TrackerStep::Rejected);
    assert_eq!(tracker.state(), DispenseState::Error);
    let record = tracker.record().unwrap();
    assert_eq!(record.dispensed, 0);
    assert!(record.error.as_ref().unwrap().contains("xyz999"));
    assert!(!tracker.is_busy());
}

#[test]
fn test_start_unreachable_goes_to_error() {
    let mut tracker = tracker();
    tracker.begin("abc123".to_string(), 2).unwrap();

    let step = tracker.apply_start(
        "abc123",
        &failed(DeviceError::Unreachable("refused".to_string()), 0),
        Instant::now(),
    );

    assert_eq!(step, TrackerStep::Rejected);
    assert_eq!(tracker.state(), DispenseState::Error);
}

#[test]
fn test_start_reporting_done_finishes_immediately() {
    let mut tracker = tracker();
    tracker.begin("abc123".to_string(), 1).unwrap();

    let step = tracker.apply_start("abc123", &reply("abc123", "done", 1, 1), Instant::now());

    assert_eq!(step, TrackerStep::Finished);
    assert_eq!(tracker.state(), DispenseState::Done);
    assert_eq!(tracker.record().unwrap().dispensed, 1);
}

#[test]
fn test_start_reporting_idle_is_an_error() {
    let mut tracker = tracker();
    tracker.begin("abc123".to_string(), 1).unwrap();

    let step = tracker.apply_start("abc123", &reply("abc123", "idle", 1, 0), Instant::now());

    assert_eq!(step, TrackerStep::Finished);
    assert_eq!(tracker.state(), DispenseState::Error);
    assert!(tracker
        .record()
        .unwrap()
        .error
        .as_ref()
        .unwrap()
        .contains("idle"));
}

#[test]
fn test_start_result_for_other_transaction_is_stale() {
    let mut tracker = tracker();
    tracker.begin("abc123".to_string(), 1).unwrap();

    let step = tracker.apply_start("other", &reply("other", "dispensing", 1, 0), Instant::now());

    assert_eq!(step, TrackerStep::Stale);
    assert_eq!(tracker.pending().unwrap().tx_id, "abc123");
}

// ============================================================================
// Polling
// ============================================================================

#[test]
fn test_poll_done_finishes_with_final_count() {
    let now = Instant::now();
    let mut tracker = started("abc123", 5, now);

    let step = tracker.apply_poll("abc123", &reply("abc123", "done", 5, 5), now);

    assert_eq!(step, TrackerStep::Finished);
    assert_eq!(tracker.state(), DispenseState::Done);
    assert_eq!(tracker.record().unwrap().dispensed, 5);
    assert!(!tracker.is_busy());
}

#[test]
fn test_poll_in_progress_keeps_polling() {
    let now = Instant::now();
    let mut tracker = started("abc123", 5, now);

    let step = tracker.apply_poll("abc123", &reply("abc123", "dispensing", 5, 2), now);

    assert!(matches!(step, TrackerStep::Poll { ref tx_id, .. } if tx_id == "abc123"));
    assert_eq!(tracker.state(), DispenseState::Dispensing);
    assert_eq!(tracker.record().unwrap().dispensed, 2);
}

#[test]
fn test_failed_poll_does_not_transition() {
    let now = Instant::now();
    let mut tracker = started("abc123", 5, now);

    let step = tracker.apply_poll(
        "abc123",
        &failed(DeviceError::Unreachable("timeout".to_string()), 0),
        now + Duration::from_millis(250),
    );

    assert!(matches!(step, TrackerStep::Poll { .. }));
    assert_eq!(tracker.state(), DispenseState::Dispensing);

    // The next successful poll still completes the transaction
    let step = tracker.apply_poll(
        "abc123",
        &reply("abc123", "done", 5, 5),
        now + Duration::from_millis(500),
    );
    assert_eq!(step, TrackerStep::Finished);
    assert_eq!(tracker.state(), DispenseState::Done);
}

#[test]
fn test_poll_device_error_keeps_partial_count() {
    let now = Instant::now();
    let mut tracker = started("abc123", 5, now);
    tracker.apply_poll("abc123", &reply("abc123", "dispensing", 5, 3), now);

    let mut jam = reply("abc123", "error", 5, 3);
    if let Some(r) = jam.payload.as_mut() {
        r.error = Some("jam detected".to_string());
    }
    let step = tracker.apply_poll("abc123", &jam, now);

    assert_eq!(step, TrackerStep::Finished);
    let record = tracker.record().unwrap();
    assert_eq!(record.state, DispenseState::Error);
    assert_eq!(record.dispensed, 3);
    assert_eq!(record.error.as_deref(), Some("jam detected"));
}

#[test]
fn test_dispensed_never_decreases_or_exceeds_quantity() {
    let now = Instant::now();
    let mut tracker = started("abc123", 5, now);

    tracker.apply_poll("abc123", &reply("abc123", "dispensing", 5, 4), now);
    tracker.apply_poll("abc123", &reply("abc123", "dispensing", 5, 2), now);
    assert_eq!(tracker.record().unwrap().dispensed, 4);

    tracker.apply_poll("abc123", &reply("abc123", "dispensing", 5, 9), now);
    assert_eq!(tracker.record().unwrap().dispensed, 5);
}

#[test]
fn test_start_with_mismatched_quantity_fails() {
    let now = Instant::now();
    let mut tracker = tracker();
    tracker.begin("abc123".to_string(), 3).unwrap();

    let step = tracker.apply_start("abc123", &reply("abc123", "dispensing", 8, 0), now);

    assert_eq!(step, TrackerStep::Finished);
    let record = tracker.record().unwrap();
    assert_eq!(record.state, DispenseState::Error);
    assert_eq!(record.quantity, 3);
    assert_eq!(record.dispensed, 0);
    assert_eq!(
        record.error.as_deref(),
        Some("device reported quantity 8, requested 3")
    );

    // Later polls for the same id no longer move the record.
    let step = tracker.apply_poll("abc123", &reply("abc123", "done", 8, 8), now);
    assert_eq!(step, TrackerStep::Stale);
    assert!(tracker.record().unwrap().dispensed <= 3);
}

#[test]
fn test_start_without_quantity_keeps_requested() {
    let now = Instant::now();
    let mut tracker = tracker();
    tracker.begin("abc123".to_string(), 4).unwrap();

    tracker.apply_start("abc123", &reply("abc123", "dispensing", 0, 0), now);
    tracker.apply_poll("abc123", &reply("abc123", "done", 0, 4), now);

    let record = tracker.record().unwrap();
    assert_eq!(record.state, DispenseState::Done);
    assert_eq!((record.dispensed, record.quantity), (4, 4));
}

#[test]
fn test_poll_for_other_transaction_is_stale() {
    let now = Instant::now();
    let mut tracker = started("abc123", 5, now);

    let step = tracker.apply_poll("old999", &reply("old999", "done", 1, 1), now);

    assert_eq!(step, TrackerStep::Stale);
    assert_eq!(tracker.state(), DispenseState::Dispensing);
}

#[test]
fn test_terminal_record_ignores_further_polls() {
    let now = Instant::now();
    let mut tracker = started("abc123", 5, now);
    tracker.apply_poll("abc123", &reply("abc123", "done", 5, 5), now);

    let step = tracker.apply_poll("abc123", &reply("abc123", "dispensing", 5, 1), now);

    assert_eq!(step, TrackerStep::Stale);
    assert_eq!(tracker.state(), DispenseState::Done);
    assert_eq!(tracker.record().unwrap().dispensed, 5);
}

#[test]
fn test_poll_ceiling_turns_into_error() {
    let now = Instant::now();
    let mut tracker = started("abc123", 5, now);

    let step = tracker.apply_poll(
        "abc123",
        &failed(DeviceError::Unreachable("timeout".to_string()), 0),
        now + Duration::from_secs(31),
    );

    assert_eq!(step, TrackerStep::Finished);
    let record = tracker.record().unwrap();
    assert_eq!(record.state, DispenseState::Error);
    assert_eq!(record.error.as_deref(), Some(POLL_TIMEOUT_MESSAGE));
}

#[test]
fn test_new_start_after_terminal_gets_fresh_record() {
    let now = Instant::now();
    let mut tracker = started("abc123", 5, now);
    tracker.apply_poll("abc123", &reply("abc123", "done", 5, 5), now);

    tracker.begin("def456".to_string(), 2).unwrap();
    assert!(tracker.record().is_none());

    tracker.apply_start("def456", &reply("def456", "dispensing", 2, 0), now);
    let record = tracker.record().unwrap();
    assert_eq!(record.tx_id, "def456");
    assert_eq!(record.dispensed, 0);
}

#[test]
fn test_begin_refused_while_dispensing() {
    let mut tracker = started("abc123", 5, Instant::now());
    let err = tracker.begin("def456".to_string(), 1).unwrap_err();
    assert_eq!(err.tx_id, "abc123");
}

mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn prop_dispensed_monotonic_and_bounded(
            quantity in 1u32..=20,
            reports in proptest::collection::vec((0u32..30, 0u8..4), 1..40),
        ) {
            let now = Instant::now();
            let mut tracker = started("abc123", quantity, now);
            let mut last = 0;

            for (dispensed, kind) in reports {
                let outcome = match kind {
                    0 => failed(DeviceError::Unreachable("flaky".to_string()), 0),
                    1 => reply("abc123", "done", quantity, dispensed),
                    2 => reply("abc123", "error", quantity, dispensed),
                    _ => reply("abc123", "dispensing", quantity, dispensed),
                };
                let was_terminal = tracker.state().is_terminal();
                tracker.apply_poll("abc123", &outcome, now);

                let record = tracker.record().unwrap();
                prop_assert!(record.dispensed >= last);
                prop_assert!(record.dispensed <= record.quantity);
                if was_terminal {
                    // Terminal states are never left through polling
                    prop_assert!(record.is_terminal());
                }
                last = record.dispensed;
            }
        }
    }
}
