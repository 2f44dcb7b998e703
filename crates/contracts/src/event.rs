//! StreamEvent - live-update events delivered to subscribers

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{ProcessedBatch, StatusSnapshot};

/// Named event pushed by the Broadcast Hub
///
/// Serializes as `{"event": "<name>", "payload": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "snake_case")]
pub enum StreamEvent {
    /// New processed data available
    DataUpdate(ProcessedBatch),
    /// Periodic health push
    StreamStatus(StatusSnapshot),
    /// A stage reported an error or anomaly
    ErrorAlert(Alert),
    /// Periodic performance push
    MetricsUpdate(MetricsReport),
}

impl StreamEvent {
    /// Wire name of the event
    pub fn name(&self) -> &'static str {
        match self {
            Self::DataUpdate(_) => "data_update",
            Self::StreamStatus(_) => "stream_status",
            Self::ErrorAlert(_) => "error_alert",
            Self::MetricsUpdate(_) => "metrics_update",
        }
    }
}

/// Event plus the per-subscriber sequence number it was delivered under
///
/// The event body is shared across subscribers; only the envelope is
/// per-subscriber.
#[derive(Debug, Clone, Serialize)]
pub struct Envelope {
    /// Per-subscriber cursor, starting at 1; gaps mean dropped backlog
    pub seq: u64,
    #[serde(flatten)]
    pub event: Arc<StreamEvent>,
}

impl Envelope {
    pub fn new(seq: u64, event: Arc<StreamEvent>) -> Self {
        Self { seq, event }
    }

    pub fn name(&self) -> &'static str {
        self.event.name()
    }
}

/// Alert category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    /// Value deviated from the rolling mean by more than k·σ
    Anomaly,
    /// Value left a configured `[min, max]` band
    ThresholdBreach,
    /// Every record of a batch failed validation
    BatchRejected,
    /// A source crossed its failure threshold
    SourceDegraded,
    /// A stage failed on a record
    ProcessingError,
}

impl AlertKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Anomaly => "anomaly",
            Self::ThresholdBreach => "threshold_breach",
            Self::BatchRejected => "batch_rejected",
            Self::SourceDegraded => "source_degraded",
            Self::ProcessingError => "processing_error",
        }
    }
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `error_alert` payload: error kind plus context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub kind: AlertKind,
    /// Source the offending record came from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Metric field involved
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metric: Option<String>,
    /// Observed value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    /// Rolling mean or band limit the value was compared against
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<f64>,
    /// Deviation in standard deviations (anomalies only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deviation: Option<f64>,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_id: Option<u64>,
    pub raised_at: DateTime<Utc>,
}

impl Alert {
    pub fn new(kind: AlertKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            source: None,
            metric: None,
            value: None,
            expected: None,
            deviation: None,
            message: message.into(),
            batch_id: None,
            raised_at: Utc::now(),
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_metric(mut self, metric: impl Into<String>, value: f64) -> Self {
        self.metric = Some(metric.into());
        self.value = Some(value);
        self
    }

    pub fn with_expected(mut self, expected: f64) -> Self {
        self.expected = Some(expected);
        self
    }

    pub fn with_deviation(mut self, deviation: f64) -> Self {
        self.deviation = Some(deviation);
        self
    }

    pub fn with_batch(mut self, batch_id: u64) -> Self {
        self.batch_id = Some(batch_id);
        self
    }
}

/// `metrics_update` payload: throughput and latency numbers
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsReport {
    /// Processed records per second over the trailing window
    pub throughput: f64,
    /// Mean batch processing latency (ms) since start
    pub latency_mean_ms: f64,
    /// Worst batch processing latency (ms) since start
    pub latency_max_ms: f64,
    /// Latency of the most recent batch (ms)
    pub latency_last_ms: f64,
    pub batches: u64,
    pub buffer_depth: usize,
    pub subscribers: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_wire_shape() {
        let event = StreamEvent::ErrorAlert(Alert::new(AlertKind::Anomaly, "spike"));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "error_alert");
        assert_eq!(json["payload"]["kind"], "anomaly");
        assert_eq!(event.name(), "error_alert");
    }

    #[test]
    fn test_envelope_flattens_event() {
        let event = Arc::new(StreamEvent::MetricsUpdate(MetricsReport::default()));
        let envelope = Envelope::new(7, event);
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["seq"], 7);
        assert_eq!(json["event"], "metrics_update");
        assert!(json["payload"].is_object());
    }
}
