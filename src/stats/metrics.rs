//! Relay-wide counters

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::registry::DropReason;

/// Live counters, updated by sinks, the broadcaster and connection teardown
#[derive(Debug)]
pub struct RelayStats {
    started_at: Instant,
    records_written: AtomicU64,
    records_dropped: AtomicU64,
    records_broadcast: AtomicU64,
    deliveries: AtomicU64,
    subscribers_connected: AtomicU64,
    subscribers_overflowed: AtomicU64,
    subscribers_disconnected: AtomicU64,
}

impl RelayStats {
    /// Create zeroed counters
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            records_written: AtomicU64::new(0),
            records_dropped: AtomicU64::new(0),
            records_broadcast: AtomicU64::new(0),
            deliveries: AtomicU64::new(0),
            subscribers_connected: AtomicU64::new(0),
            subscribers_overflowed: AtomicU64::new(0),
            subscribers_disconnected: AtomicU64::new(0),
        }
    }

    pub(crate) fn record_written(&self) {
        self.records_written.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dropped(&self) {
        self.records_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_broadcast(&self, delivered: u64) {
        self.records_broadcast.fetch_add(1, Ordering::Relaxed);
        self.deliveries.fetch_add(delivered, Ordering::Relaxed);
    }

    pub(crate) fn subscriber_connected(&self) {
        self.subscribers_connected.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn subscriber_removed(&self, reason: DropReason) {
        let counter = match reason {
            DropReason::Overflow => &self.subscribers_overflowed,
            _ => &self.subscribers_disconnected,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of the counters
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            uptime: self.started_at.elapsed(),
            records_written: self.records_written.load(Ordering::Relaxed),
            records_dropped: self.records_dropped.load(Ordering::Relaxed),
            records_broadcast: self.records_broadcast.load(Ordering::Relaxed),
            deliveries: self.deliveries.load(Ordering::Relaxed),
            subscribers_connected: self.subscribers_connected.load(Ordering::Relaxed),
            subscribers_overflowed: self.subscribers_overflowed.load(Ordering::Relaxed),
            subscribers_disconnected: self.subscribers_disconnected.load(Ordering::Relaxed),
        }
    }
}

impl Default for RelayStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of [`RelayStats`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Time since the stats were created
    pub uptime: Duration,
    /// Records accepted from sinks
    pub records_written: u64,
    /// Records a writer could not queue without blocking
    pub records_dropped: u64,
    /// Records taken off the broadcast channel and fanned out
    pub records_broadcast: u64,
    /// Individual enqueues onto subscriber queues
    pub deliveries: u64,
    /// Subscribers ever registered
    pub subscribers_connected: u64,
    /// Subscribers dropped because their queue was full
    pub subscribers_overflowed: u64,
    /// Subscribers removed for any other reason
    pub subscribers_disconnected: u64,
}

impl StatsSnapshot {
    /// Average deliveries per broadcast record
    pub fn fan_out_ratio(&self) -> f64 {
        if self.records_broadcast > 0 {
            self.deliveries as f64 / self.records_broadcast as f64
        } else {
            0.0
        }
    }
}
