//! Read-only view of console state for the presentation layer.

use crate::device::HealthSnapshot;
use crate::dispense::{DispenseRecord, PendingStart};
use crate::history::{LatencySample, LatencyStats, LogEntry};
use crate::test_cycle::{BurstState, TestCycleState};

/// Everything a renderer needs, cloned out of the loop after each event.
#[derive(Debug, Clone, Default)]
pub struct ConsoleSnapshot {
    /// Last successful health snapshot (possibly stale)
    pub health: Option<HealthSnapshot>,
    /// Error of the most recent health query
    pub health_error: Option<String>,
    pub connected: bool,
    /// Tracked dispense record, if any
    pub dispense: Option<DispenseRecord>,
    /// Start issued but not answered yet
    pub pending: Option<PendingStart>,
    /// Quantity used by a manual dispense
    pub manual_quantity: u32,
    pub test_cycle: TestCycleState,
    pub burst: BurstState,
    /// Request log, oldest first
    pub log: Vec<LogEntry>,
    /// Total entries ever appended (including evicted and cleared ones)
    pub log_appended: u64,
    pub log_cursor: usize,
    /// Latency samples, oldest first
    pub latency: Vec<LatencySample>,
    pub latency_stats: Option<LatencyStats>,
    pub ticks: u64,
    /// Device calls still running
    pub in_flight: usize,
}

impl ConsoleSnapshot {
    /// Entries appended after `seen` total appends, oldest first.
    ///
    /// Entries that were evicted or cleared in between are skipped.
    pub fn new_entries_since(&self, seen: u64) -> &[LogEntry] {
        let fresh = self.log_appended.saturating_sub(seen);
        let fresh = usize::try_from(fresh)
            .unwrap_or(usize::MAX)
            .min(self.log.len());
        &self.log[self.log.len() - fresh..]
    }
}
