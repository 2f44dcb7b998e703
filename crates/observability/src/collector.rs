//! Metrics Collector
//!
//! Process-wide counters behind `status()`. Every write is an atomic
//! increment; readers only ever see snapshots. Counters are reset at each
//! pipeline `start` and stay readable after `stop`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use contracts::{MetricsReport, SourceHealth, SourceKind, SourceState, StreamCounters};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, warn};

use crate::metrics::{self, RunningStats};

/// Trailing window for throughput, in seconds
pub const THROUGHPUT_WINDOW_SECS: u64 = 10;

/// Processed-records-per-second over a trailing window of 1 s buckets
#[derive(Debug)]
pub struct ThroughputMeter {
    origin: Instant,
    /// Second (since `origin`) the meter was last reset
    epoch: AtomicU64,
    /// Bucket tag: second + 1, 0 = empty
    seconds: [AtomicU64; THROUGHPUT_WINDOW_SECS as usize],
    counts: [AtomicU64; THROUGHPUT_WINDOW_SECS as usize],
}

impl Default for ThroughputMeter {
    fn default() -> Self {
        Self::new()
    }
}

impl ThroughputMeter {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            epoch: AtomicU64::new(0),
            seconds: std::array::from_fn(|_| AtomicU64::new(0)),
            counts: std::array::from_fn(|_| AtomicU64::new(0)),
        }
    }

    fn now_secs(&self) -> u64 {
        self.origin.elapsed().as_secs()
    }

    pub fn record(&self, count: u64) {
        self.record_at(self.now_secs(), count);
    }

    fn record_at(&self, second: u64, count: u64) {
        let idx = (second % THROUGHPUT_WINDOW_SECS) as usize;
        let tag = second + 1;
        let current = self.seconds[idx].load(Ordering::Acquire);
        if current != tag
            && self.seconds[idx]
                .compare_exchange(current, tag, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
        {
            // We rotated the bucket: discard the stale count
            self.counts[idx].store(count, Ordering::Release);
            return;
        }
        self.counts[idx].fetch_add(count, Ordering::AcqRel);
    }

    /// Records per second over the trailing window
    pub fn rate(&self) -> f64 {
        self.rate_at(self.origin.elapsed())
    }

    fn rate_at(&self, elapsed: Duration) -> f64 {
        let now = elapsed.as_secs();
        let oldest = now.saturating_sub(THROUGHPUT_WINDOW_SECS - 1);

        let total: u64 = (0..THROUGHPUT_WINDOW_SECS as usize)
            .filter(|&i| {
                let tag = self.seconds[i].load(Ordering::Acquire);
                tag != 0 && (oldest..=now).contains(&(tag - 1))
            })
            .map(|i| self.counts[i].load(Ordering::Acquire))
            .sum();

        // Shorter denominator right after a reset
        let since_reset =
            elapsed.as_secs_f64() - self.epoch.load(Ordering::Acquire) as f64;
        let span = since_reset.clamp(1.0, THROUGHPUT_WINDOW_SECS as f64);
        total as f64 / span
    }

    pub fn reset(&self) {
        for i in 0..THROUGHPUT_WINDOW_SECS as usize {
            self.seconds[i].store(0, Ordering::Release);
            self.counts[i].store(0, Ordering::Release);
        }
        self.epoch.store(self.now_secs(), Ordering::Release);
    }
}

/// Live health of one registered source
#[derive(Debug)]
pub struct SourceHealthCell {
    name: String,
    kind: SourceKind,
    records: AtomicU64,
    failures: AtomicU64,
    consecutive_failures: AtomicU64,
    degraded: AtomicBool,
    last_error: Mutex<Option<String>>,
}

impl SourceHealthCell {
    fn new(name: String, kind: SourceKind) -> Self {
        Self {
            name,
            kind,
            records: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            consecutive_failures: AtomicU64::new(0),
            degraded: AtomicBool::new(false),
            last_error: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Successful activation yielding `records` records
    ///
    /// Returns `true` if the source just recovered from degraded.
    pub fn record_success(&self, records: u64) -> bool {
        self.records.fetch_add(records, Ordering::Relaxed);
        self.consecutive_failures.store(0, Ordering::Relaxed);
        let recovered = self.degraded.swap(false, Ordering::AcqRel);
        if recovered {
            metrics::record_source_state(&self.name, false);
        }
        recovered
    }

    /// Failed activation
    ///
    /// Returns `true` if this failure crossed `threshold` and the source
    /// just became degraded.
    pub fn record_failure(&self, error: &str, threshold: u64) -> bool {
        self.failures.fetch_add(1, Ordering::Relaxed);
        let consecutive = self.consecutive_failures.fetch_add(1, Ordering::AcqRel) + 1;
        *self.last_error.lock() = Some(error.to_string());
        metrics::record_source_failure(&self.name);

        if consecutive >= threshold && !self.degraded.swap(true, Ordering::AcqRel) {
            metrics::record_source_state(&self.name, true);
            return true;
        }
        false
    }

    pub fn consecutive_failures(&self) -> u64 {
        self.consecutive_failures.load(Ordering::Relaxed)
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::Acquire)
    }

    fn reset(&self) {
        self.records.store(0, Ordering::Relaxed);
        self.failures.store(0, Ordering::Relaxed);
        self.consecutive_failures.store(0, Ordering::Relaxed);
        self.degraded.store(false, Ordering::Release);
        *self.last_error.lock() = None;
    }

    pub fn snapshot(&self) -> SourceHealth {
        SourceHealth {
            name: self.name.clone(),
            kind: self.kind,
            state: if self.is_degraded() {
                SourceState::Degraded
            } else {
                SourceState::Active
            },
            records: self.records.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            consecutive_failures: self.consecutive_failures.load(Ordering::Relaxed),
            last_error: self.last_error.lock().clone(),
        }
    }
}

/// Process-wide Metrics Collector
///
/// Shared as `Arc<MetricsCollector>` by every stage.
#[derive(Debug, Default)]
pub struct MetricsCollector {
    ingested: AtomicU64,
    dropped: AtomicU64,
    processed: AtomicU64,
    errors: AtomicU64,
    filtered: AtomicU64,
    batches: AtomicU64,
    alerts: AtomicU64,
    source_errors: AtomicU64,
    subscriber_drops: AtomicU64,
    throughput: ThroughputMeter,
    latency: Mutex<RunningStats>,
    sources: RwLock<HashMap<String, Arc<SourceHealthCell>>>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_ingested(&self, source: &str, count: u64) {
        self.ingested.fetch_add(count, Ordering::Relaxed);
        metrics::record_records_ingested(source, count);
    }

    pub fn record_dropped(&self, count: u64) {
        if count == 0 {
            return;
        }
        self.dropped.fetch_add(count, Ordering::Relaxed);
        metrics::record_records_dropped(count);
    }

    /// Records dropped by validation
    pub fn record_invalid(&self, count: u64) {
        self.errors.fetch_add(count, Ordering::Relaxed);
        metrics::record_records_invalid("validate", count);
    }

    /// Records dropped by a failing enrich/analytics stage
    pub fn record_failed(&self, stage: &str, count: u64) {
        self.errors.fetch_add(count, Ordering::Relaxed);
        metrics::record_records_invalid(stage, count);
    }

    pub fn record_filtered(&self, count: u64) {
        self.filtered.fetch_add(count, Ordering::Relaxed);
        metrics::record_records_filtered(count);
    }

    /// One emitted batch with `records` surviving records
    pub fn record_batch(&self, records: usize, latency: Duration) {
        let latency_ms = latency.as_secs_f64() * 1000.0;
        self.batches.fetch_add(1, Ordering::Relaxed);
        self.processed.fetch_add(records as u64, Ordering::Relaxed);
        self.throughput.record(records as u64);
        self.latency.lock().push(latency_ms);
        metrics::record_batch_processed(records, latency_ms);
    }

    pub fn record_alert(&self, kind: &str) {
        self.alerts.fetch_add(1, Ordering::Relaxed);
        metrics::record_alert(kind);
    }

    pub fn record_subscriber_drops(&self, count: u64) {
        if count == 0 {
            return;
        }
        self.subscriber_drops.fetch_add(count, Ordering::Relaxed);
        metrics::record_subscriber_drops(count);
    }

    /// Register (or re-register) a source health entry
    pub fn register_source(&self, name: &str, kind: SourceKind) -> Arc<SourceHealthCell> {
        let mut sources = self.sources.write();
        sources
            .entry(name.to_string())
            .or_insert_with(|| {
                debug!(source = %name, kind = %kind, "source health registered");
                Arc::new(SourceHealthCell::new(name.to_string(), kind))
            })
            .clone()
    }

    pub fn unregister_source(&self, name: &str) {
        if self.sources.write().remove(name).is_none() {
            warn!(source = %name, "unregistering unknown source health entry");
        }
    }

    /// Failed activation of `name`; returns `true` if it just became degraded
    pub fn record_source_failure(&self, name: &str, error: &str, threshold: u64) -> bool {
        self.source_errors.fetch_add(1, Ordering::Relaxed);
        match self.sources.read().get(name) {
            Some(cell) => cell.record_failure(error, threshold),
            None => false,
        }
    }

    pub fn source_health(&self, name: &str) -> Option<SourceHealth> {
        self.sources.read().get(name).map(|cell| cell.snapshot())
    }

    /// All sources, sorted by name
    pub fn sources(&self) -> Vec<SourceHealth> {
        let mut out: Vec<_> = self.sources.read().values().map(|c| c.snapshot()).collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        out
    }

    pub fn counters(&self) -> StreamCounters {
        StreamCounters {
            ingested: self.ingested.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            processed: self.processed.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            filtered: self.filtered.load(Ordering::Relaxed),
            batches: self.batches.load(Ordering::Relaxed),
            alerts: self.alerts.load(Ordering::Relaxed),
            source_errors: self.source_errors.load(Ordering::Relaxed),
            subscriber_drops: self.subscriber_drops.load(Ordering::Relaxed),
        }
    }

    pub fn throughput(&self) -> f64 {
        self.throughput.rate()
    }

    /// `metrics_update` payload
    pub fn report(&self, buffer_depth: usize, subscribers: usize) -> MetricsReport {
        let latency = self.latency.lock().clone();
        MetricsReport {
            throughput: self.throughput(),
            latency_mean_ms: latency.mean(),
            latency_max_ms: if latency.count() == 0 { 0.0 } else { latency.max() },
            latency_last_ms: latency.last(),
            batches: self.batches.load(Ordering::Relaxed),
            buffer_depth,
            subscribers,
        }
    }

    /// Back to the fresh baseline: counters, throughput, latency and source health
    pub fn reset(&self) {
        for counter in [
            &self.ingested,
            &self.dropped,
            &self.processed,
            &self.errors,
            &self.filtered,
            &self.batches,
            &self.alerts,
            &self.source_errors,
            &self.subscriber_drops,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
        self.throughput.reset();
        *self.latency.lock() = RunningStats::default();
        for cell in self.sources.read().values() {
            cell.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_and_reset() {
        let collector = MetricsCollector::new();
        collector.record_ingested("a", 5);
        collector.record_dropped(2);
        collector.record_invalid(1);
        collector.record_filtered(1);
        collector.record_batch(3, Duration::from_millis(4));

        let counters = collector.counters();
        assert_eq!(counters.ingested, 5);
        assert_eq!(counters.dropped, 2);
        assert_eq!(counters.errors, 1);
        assert_eq!(counters.processed, 3);
        assert_eq!(counters.batches, 1);

        collector.reset();
        assert_eq!(collector.counters(), StreamCounters::default());
        assert_eq!(collector.report(0, 0).latency_mean_ms, 0.0);
    }

    #[test]
    fn test_source_degrades_at_threshold_and_recovers() {
        let collector = MetricsCollector::new();
        let cell = collector.register_source("feed", SourceKind::Api);

        assert!(!collector.record_source_failure("feed", "timeout", 3));
        assert!(!collector.record_source_failure("feed", "timeout", 3));
        assert!(collector.record_source_failure("feed", "timeout", 3));
        // Already degraded: no second transition
        assert!(!collector.record_source_failure("feed", "timeout", 3));

        let health = collector.source_health("feed").unwrap();
        assert_eq!(health.state, SourceState::Degraded);
        assert_eq!(health.consecutive_failures, 4);
        assert_eq!(health.last_error.as_deref(), Some("timeout"));
        assert_eq!(collector.counters().source_errors, 4);

        assert!(cell.record_success(2));
        let health = collector.source_health("feed").unwrap();
        assert_eq!(health.state, SourceState::Active);
        assert_eq!(health.records, 2);
    }

    #[test]
    fn test_register_is_idempotent() {
        let collector = MetricsCollector::new();
        let a = collector.register_source("x", SourceKind::File);
        let b = collector.register_source("x", SourceKind::File);
        assert!(Arc::ptr_eq(&a, &b));
        collector.unregister_source("x");
        assert!(collector.sources().is_empty());
    }

    #[test]
    fn test_throughput_window() {
        let meter = ThroughputMeter::new();
        meter.record_at(0, 10);
        meter.record_at(1, 10);
        meter.record_at(1, 5);

        // 25 records, 9 s since reset
        let rate = meter.rate_at(Duration::from_secs(9));
        assert!((rate - 25.0 / 9.0).abs() < 1e-9, "rate = {rate}");

        // Second 0 has left the window at t=10.x (window covers 1..=10)
        let rate = meter.rate_at(Duration::from_millis(10_500));
        assert!((rate - 1.5).abs() < 1e-9, "rate = {rate}");

        // Everything old
        assert_eq!(meter.rate_at(Duration::from_secs(60)), 0.0);
    }

    #[test]
    fn test_throughput_bucket_rotation_discards_stale_count() {
        let meter = ThroughputMeter::new();
        meter.record_at(3, 100);
        meter.record_at(13, 1);
        let rate = meter.rate_at(Duration::from_secs(13));
        assert!((rate - 0.1).abs() < 1e-9, "rate = {rate}");
    }
}
