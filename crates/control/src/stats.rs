//! Control-side counters

use std::sync::atomic::{AtomicU64, Ordering};

/// Control metrics
#[derive(Debug, Default)]
pub struct ControlMetrics {
    /// Raw commands or datagrams received
    pub received: AtomicU64,

    /// Commands decoded into a `ControlCommand`
    pub decoded: AtomicU64,

    /// Commands rejected by the decoder
    pub malformed: AtomicU64,

    /// Commands accepted by the command queue
    pub forwarded: AtomicU64,

    /// Commands dropped because the queue was full or closed
    pub dropped: AtomicU64,
}

impl ControlMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_decoded(&self) {
        self.decoded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_malformed(&self) {
        self.malformed.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("mocap_control_malformed_total").increment(1);
    }

    pub fn record_forwarded(&self) {
        self.forwarded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot
    pub fn snapshot(&self) -> ControlSnapshot {
        ControlSnapshot {
            received: self.received.load(Ordering::Relaxed),
            decoded: self.decoded.load(Ordering::Relaxed),
            malformed: self.malformed.load(Ordering::Relaxed),
            forwarded: self.forwarded.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

/// Metrics snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ControlSnapshot {
    pub received: u64,
    pub decoded: u64,
    pub malformed: u64,
    pub forwarded: u64,
    pub dropped: u64,
}
