//! Bounded history buffers
//!
//! The console keeps the last 100 device calls and the last 60 latency
//! samples. Both use the same ring buffer: appending at capacity evicts the
//! oldest element, and entries are never modified after insertion.

mod types;

pub use types::{LatencySample, LatencyStats, LogEntry};

use std::collections::VecDeque;
use std::ops::Range;

/// Default request log capacity
pub const DEFAULT_LOG_CAPACITY: usize = 100;
/// Default latency sample capacity
pub const DEFAULT_LATENCY_CAPACITY: usize = 60;

/// Fixed-capacity FIFO ring buffer
#[derive(Debug, Clone)]
pub struct BoundedHistory<T> {
    entries: VecDeque<T>,
    capacity: usize,
}

impl<T> BoundedHistory<T> {
    /// Creates an empty history holding at most `capacity` entries (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Appends an entry, evicting the oldest if at capacity
    pub fn push(&mut self, entry: T) {
        if self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    /// Returns the entries in `range`, clamped to what is stored
    pub fn window(&self, range: Range<usize>) -> impl Iterator<Item = &T> + '_ {
        let end = range.end.min(self.entries.len());
        let start = range.start.min(end);
        self.entries.range(start..end)
    }

    /// All entries, oldest first
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> + ExactSizeIterator + '_ {
        self.entries.iter()
    }

    pub fn latest(&self) -> Option<&T> {
        self.entries.back()
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.entries.get(index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drops every entry
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl<T: Clone> BoundedHistory<T> {
    /// Returns all entries in chronological order (oldest first)
    pub fn to_vec(&self) -> Vec<T> {
        self.entries.iter().cloned().collect()
    }
}

impl BoundedHistory<LatencySample> {
    pub fn stats(&self) -> Option<LatencyStats> {
        LatencyStats::from_samples(self.entries.iter())
    }
}
