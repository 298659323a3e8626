//! Entries kept in the console history buffers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One device call in the request log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    /// HTTP method of the call ("GET", "POST")
    pub method: String,
    /// Request path (e.g., "/dispense/abc123")
    pub path: String,
    /// HTTP status, `0` when no response was received
    pub status: u16,
    pub latency_ms: u64,
    /// Short human-readable summary
    pub detail: String,
    pub is_error: bool,
}

impl LogEntry {
    pub fn new(
        method: &str,
        path: impl Into<String>,
        status: u16,
        latency: Duration,
        detail: impl Into<String>,
        is_error: bool,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            method: method.to_string(),
            path: path.into(),
            status,
            latency_ms: latency.as_millis() as u64,
            detail: detail.into(),
            is_error,
        }
    }
}

/// Elapsed time of one device call, in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct LatencySample(pub f64);

impl LatencySample {
    pub fn millis(self) -> f64 {
        self.0
    }
}

impl From<Duration> for LatencySample {
    fn from(d: Duration) -> Self {
        LatencySample(d.as_micros() as f64 / 1000.0)
    }
}

/// Summary of the latency buffer
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LatencyStats {
    pub min_ms: f64,
    pub avg_ms: f64,
    pub max_ms: f64,
    pub samples: usize,
}

impl LatencyStats {
    /// Compute stats over samples, `None` when there are none
    pub fn from_samples<'a>(samples: impl IntoIterator<Item = &'a LatencySample>) -> Option<Self> {
        let mut count = 0usize;
        let mut sum = 0.0;
        let mut min = f64::MAX;
        let mut max = f64::MIN;

        for sample in samples {
            let ms = sample.millis();
            count += 1;
            sum += ms;
            min = min.min(ms);
            max = max.max(ms);
        }

        if count == 0 {
            return None;
        }

        Some(Self {
            min_ms: min,
            avg_ms: sum / count as f64,
            max_ms: max,
            samples: count,
        })
    }
}
