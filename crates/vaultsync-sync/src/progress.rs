//! Progress and throughput tracking
//!
//! One update per completed unit. Throughput is an exponentially weighted
//! moving average of the per-unit rate: bytes per second for byte-based
//! commands, files per second otherwise. The rate of a unit is measured
//! over the time since the previous completion, since units overlap.

use std::time::{Duration, Instant};

use serde::Serialize;
use vaultsync_core::domain::VaultPath;

/// Progress callback installed by the caller
pub type ProgressFn = Box<dyn Fn(ProgressUpdate) + Send + Sync>;

/// Shortest interval used as a rate denominator
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Snapshot emitted after a unit completes
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressUpdate {
    pub completed: usize,
    pub total: usize,
    pub bytes_done: u64,
    pub total_bytes: u64,
    /// Bytes per second for byte-based commands, files per second otherwise
    pub throughput_per_sec: f64,
    /// The unit that just completed
    pub path: VaultPath,
}

impl ProgressUpdate {
    /// Completed fraction in `[0, 1]`
    pub fn fraction(&self) -> f64 {
        if self.total_bytes > 0 {
            self.bytes_done as f64 / self.total_bytes as f64
        } else if self.total > 0 {
            self.completed as f64 / self.total as f64
        } else {
            1.0
        }
    }
}

/// Accumulates completions for one command
#[derive(Debug)]
pub struct ProgressTracker {
    total: usize,
    total_bytes: u64,
    byte_based: bool,
    smoothing: f64,
    completed: usize,
    bytes_done: u64,
    throughput: Option<f64>,
    last: Instant,
}

impl ProgressTracker {
    /// Starts tracking at `started`
    ///
    /// `smoothing` is the weight of the newest sample, in `(0, 1]`.
    pub fn new(total: usize, total_bytes: u64, byte_based: bool, smoothing: f64, started: Instant) -> Self {
        Self {
            total,
            total_bytes,
            byte_based,
            smoothing: smoothing.clamp(f64::EPSILON, 1.0),
            completed: 0,
            bytes_done: 0,
            throughput: None,
            last: started,
        }
    }

    /// Records a completed unit
    pub fn record(&mut self, path: VaultPath, bytes: u64, at: Instant) -> ProgressUpdate {
        let interval = at.saturating_duration_since(self.last).max(MIN_INTERVAL);
        self.last = at;
        self.completed += 1;
        self.bytes_done += bytes;

        let units = if self.byte_based { bytes as f64 } else { 1.0 };
        let sample = units / interval.as_secs_f64();
        let smoothed = match self.throughput {
            None => sample,
            Some(prev) => self.smoothing * sample + (1.0 - self.smoothing) * prev,
        };
        self.throughput = Some(smoothed);

        ProgressUpdate {
            completed: self.completed,
            total: self.total,
            bytes_done: self.bytes_done,
            total_bytes: self.total_bytes,
            throughput_per_sec: smoothed,
            path,
        }
    }

    pub fn completed(&self) -> usize {
        self.completed
    }
}
