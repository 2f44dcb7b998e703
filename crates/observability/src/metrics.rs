//! 流水线 Prometheus 指标
//!
//! 仅作旁路观测；`status()` 读取的是 `MetricsCollector`。

use metrics::{counter, gauge, histogram};

/// Records accepted into the Ingestion Buffer
pub fn record_records_ingested(source: &str, count: u64) {
    counter!("rtstream_records_ingested_total", "source" => source.to_string()).increment(count);
}

/// Records evicted from the Ingestion Buffer
pub fn record_records_dropped(count: u64) {
    counter!("rtstream_records_dropped_total").increment(count);
}

pub fn record_buffer_depth(depth: usize) {
    gauge!("rtstream_buffer_depth").set(depth as f64);
}

/// One processed batch
pub fn record_batch_processed(records: usize, latency_ms: f64) {
    counter!("rtstream_batches_total").increment(1);
    counter!("rtstream_records_processed_total").increment(records as u64);
    histogram!("rtstream_batch_latency_ms").record(latency_ms);
    histogram!("rtstream_batch_size").record(records as f64);
}

/// Records dropped by validation or a failing stage
pub fn record_records_invalid(stage: &str, count: u64) {
    if count > 0 {
        counter!("rtstream_records_invalid_total", "stage" => stage.to_string()).increment(count);
    }
}

pub fn record_records_filtered(count: u64) {
    if count > 0 {
        counter!("rtstream_records_filtered_total").increment(count);
    }
}

pub fn record_alert(kind: &str) {
    counter!("rtstream_alerts_total", "kind" => kind.to_string()).increment(1);
}

pub fn record_source_failure(source: &str) {
    counter!("rtstream_source_failures_total", "source" => source.to_string()).increment(1);
}

/// 1 = degraded, 0 = active
pub fn record_source_state(source: &str, degraded: bool) {
    gauge!("rtstream_source_degraded", "source" => source.to_string())
        .set(if degraded { 1.0 } else { 0.0 });
}

pub fn record_event_published(event: &'static str, subscribers: usize) {
    counter!("rtstream_events_published_total", "event" => event).increment(1);
    gauge!("rtstream_subscribers").set(subscribers as f64);
}

/// Backlog entries evicted for a slow subscriber
pub fn record_subscriber_drops(count: u64) {
    counter!("rtstream_subscriber_drops_total").increment(count);
}

pub fn record_subscriber_delivery(sink_name: &str, success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!(
        "rtstream_deliveries_total",
        "sink" => sink_name.to_string(),
        "status" => status
    )
    .increment(1);
}

/// Online statistics (Welford's algorithm), unbounded history
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
    last: f64,
}

impl RunningStats {
    pub fn push(&mut self, value: f64) {
        self.count += 1;
        self.last = value;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// Sample variance
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    /// Most recent value pushed
    pub fn last(&self) -> f64 {
        self.last
    }
}
