//! ProcessedBatch - Stream Processor output

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::SourceId;

/// A record after validate/filter/enrich
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedRecord {
    /// Originating source
    pub source: SourceId,

    /// Message key, if the source supplied one
    pub key: Option<String>,

    /// Per-source sequence number
    pub sequence: u64,

    /// Original ingestion time
    pub ingested_at: DateTime<Utc>,

    /// Payload fields plus derived fields
    pub fields: Map<String, Value>,

    /// Set when any tracked metric of this record was flagged anomalous
    #[serde(default)]
    pub anomalous: bool,
}

impl ProcessedRecord {
    /// Numeric value of a field, if present and finite
    pub fn number(&self, field: &str) -> Option<f64> {
        self.fields
            .get(field)
            .and_then(Value::as_f64)
            .filter(|v| v.is_finite())
    }
}

/// Per-batch statistics for one metric field
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricSummary {
    pub count: u64,
    pub sum: f64,
    pub min: f64,
    pub max: f64,
}

impl MetricSummary {
    pub fn push(&mut self, value: f64) {
        if self.count == 0 {
            self.min = value;
            self.max = value;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
        }
        self.count += 1;
        self.sum += value;
    }

    /// Fold another summary into this one
    pub fn merge(&mut self, other: &MetricSummary) {
        if other.count == 0 {
            return;
        }
        if self.count == 0 {
            *self = other.clone();
            return;
        }
        self.count += other.count;
        self.sum += other.sum;
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }
}

/// Rolling-window view of a tracked metric after this batch
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WindowSnapshot {
    /// Samples currently in the window
    pub samples: usize,
    /// Moving average
    pub mean: f64,
    /// Rolling (population) standard deviation
    pub std_dev: f64,
}

/// Aggregate view of one processed batch
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Records that entered the processor
    pub input_records: usize,
    /// Dropped by validate
    pub invalid: usize,
    /// Dropped by filter
    pub filtered: usize,
    /// Dropped by a failing stage (enrich/analytics)
    pub failed: usize,
    /// Records emitted
    pub output_records: usize,
    /// Emitted records per source
    pub per_source: BTreeMap<String, usize>,
    /// Per-field aggregates over emitted records
    pub metrics: BTreeMap<String, MetricSummary>,
    /// Rolling window state per tracked metric
    pub windows: BTreeMap<String, WindowSnapshot>,
    /// Anomalies raised while processing this batch
    pub anomalies: usize,
}

impl BatchSummary {
    /// Merge a single-source summary into the batch-level one
    pub fn merge(&mut self, other: BatchSummary) {
        self.input_records += other.input_records;
        self.invalid += other.invalid;
        self.filtered += other.filtered;
        self.failed += other.failed;
        self.output_records += other.output_records;
        self.anomalies += other.anomalies;
        for (source, count) in other.per_source {
            *self.per_source.entry(source).or_insert(0) += count;
        }
        for (field, summary) in other.metrics {
            self.metrics.entry(field).or_default().merge(&summary);
        }
        self.windows.extend(other.windows);
    }
}

/// Processed batch, published as a `data_update` event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedBatch {
    /// Id of the input batch
    pub batch_id: u64,

    /// Surviving records
    pub records: Vec<ProcessedRecord>,

    /// Aggregates
    pub summary: BatchSummary,

    /// Set when the whole batch was rejected
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Emission time
    pub emitted_at: DateTime<Utc>,
}

impl ProcessedBatch {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn is_rejected(&self) -> bool {
        self.error.is_some()
    }
}
