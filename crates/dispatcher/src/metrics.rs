//! Per-sink frame accounting

use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// What happened to one frame offered to a sink
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Written, carrying its tick id
    Written(u64),
    /// The sink returned an error
    Failed,
    /// Refused because the sink queue was full
    Dropped,
}

/// Counters for one sink, shared between its handle and worker
#[derive(Debug, Default)]
pub struct SinkMetrics {
    depth: AtomicUsize,
    peak_depth: AtomicUsize,
    written: AtomicU64,
    failed: AtomicU64,
    dropped: AtomicU64,
    /// 0 until the first write; tick ids start at 1
    last_written_tick: AtomicU64,
}

impl SinkMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the current queue depth and keep the high-water mark
    pub fn observe_depth(&self, depth: usize) {
        self.depth.store(depth, Ordering::Relaxed);
        self.peak_depth.fetch_max(depth, Ordering::Relaxed);
    }

    pub fn record(&self, outcome: FrameOutcome) {
        match outcome {
            FrameOutcome::Written(tick_id) => {
                self.written.fetch_add(1, Ordering::Relaxed);
                self.last_written_tick.fetch_max(tick_id, Ordering::Relaxed);
            }
            FrameOutcome::Failed => {
                self.failed.fetch_add(1, Ordering::Relaxed);
            }
            FrameOutcome::Dropped => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub fn depth(&self) -> usize {
        self.depth.load(Ordering::Relaxed)
    }

    pub fn written(&self) -> u64 {
        self.written.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let last = self.last_written_tick.load(Ordering::Relaxed);
        MetricsSnapshot {
            depth: self.depth(),
            peak_depth: self.peak_depth.load(Ordering::Relaxed),
            written: self.written(),
            failed: self.failed(),
            dropped: self.dropped(),
            last_written_tick: (last > 0).then_some(last),
        }
    }
}

/// Point-in-time copy of `SinkMetrics`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub depth: usize,
    pub peak_depth: usize,
    pub written: u64,
    pub failed: u64,
    pub dropped: u64,
    pub last_written_tick: Option<u64>,
}

impl MetricsSnapshot {
    /// Frames the dispatcher handed to this sink
    pub fn offered(&self) -> u64 {
        self.written + self.failed + self.dropped
    }
}

impl fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "written={} failed={} dropped={} peak_queue={}",
            self.written, self.failed, self.dropped, self.peak_depth
        )?;
        if let Some(tick) = self.last_written_tick {
            write!(f, " last_tick={tick}")?;
        }
        Ok(())
    }
}
