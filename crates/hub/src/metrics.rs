//! Per-subscriber delivery metrics

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Metrics for a single subscriber
#[derive(Debug, Default)]
pub struct SubscriberMetrics {
    /// Current backlog length
    backlog_len: AtomicUsize,
    /// Events handed to the sink successfully
    delivered: AtomicU64,
    /// Sink write failures (non-fatal)
    failures: AtomicU64,
    /// Backlog entries evicted unsent
    dropped: AtomicU64,
}

impl SubscriberMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn backlog_len(&self) -> usize {
        self.backlog_len.load(Ordering::Relaxed)
    }

    pub fn set_backlog_len(&self, len: usize) {
        self.backlog_len.store(len, Ordering::Relaxed);
    }

    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    pub fn inc_delivered(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    pub fn inc_failures(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn inc_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> SubscriberStats {
        SubscriberStats {
            backlog_len: self.backlog_len(),
            delivered: self.delivered(),
            failures: self.failures(),
            dropped: self.dropped(),
        }
    }
}

/// Snapshot of subscriber metrics (for reporting)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriberStats {
    pub backlog_len: usize,
    pub delivered: u64,
    pub failures: u64,
    pub dropped: u64,
}
