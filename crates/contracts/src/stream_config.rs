//! Stream configuration contracts shared across crates.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::{Validate, ValidationError};

use crate::{SourceConfig, SourceKind};

/// Upper bound for every seconds-valued setting (one day)
pub const MAX_SECONDS: f64 = 86_400.0;

/// Seconds to `Duration`, clamped to `[0, MAX_SECONDS]`; NaN maps to zero
pub fn saturating_secs(secs: f64) -> Duration {
    Duration::try_from_secs_f64(secs.clamp(0.0, MAX_SECONDS)).unwrap_or(Duration::ZERO)
}

pub(crate) fn validate_seconds(secs: f64) -> Result<(), ValidationError> {
    if secs.is_finite() && secs <= MAX_SECONDS {
        Ok(())
    } else {
        Err(ValidationError::new("seconds")
            .with_message(format!("must be a finite number of seconds <= {MAX_SECONDS}").into()))
    }
}

fn validate_finite(value: f64) -> Result<(), ValidationError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ValidationError::new("finite").with_message("must be a finite number".into()))
    }
}

/// Top-level pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct StreamConfig {
    /// Ingestion Buffer capacity
    #[serde(default = "default_buffer_size")]
    #[validate(range(min = 1, message = "buffer_size must be >= 1"))]
    pub buffer_size: usize,

    /// Maximum records per batch
    #[serde(default = "default_batch_size")]
    #[validate(range(min = 1, message = "batch_size must be >= 1"))]
    pub batch_size: usize,

    /// Max wait (seconds) before emitting a partial batch
    #[serde(default = "default_processing_interval")]
    #[validate(
        range(min = 0.001, message = "processing_interval must be >= 1ms"),
        custom(function = "validate_seconds")
    )]
    pub processing_interval: f64,

    /// Subscriber cap; further connects are refused
    #[serde(default = "default_max_connections")]
    #[validate(range(min = 1, message = "max_connections must be >= 1"))]
    pub max_connections: usize,

    /// Per-subscriber outbound backlog cap
    #[serde(default = "default_subscriber_backlog")]
    #[validate(range(min = 1, message = "subscriber_backlog must be >= 1"))]
    pub subscriber_backlog: usize,

    /// Period (seconds) of `stream_status` / `metrics_update` pushes
    #[serde(default = "default_status_interval")]
    #[validate(
        range(min = 0.01, message = "status_interval must be >= 10ms"),
        custom(function = "validate_seconds")
    )]
    pub status_interval: f64,

    /// Grace period (seconds) for draining on stop
    #[serde(default = "default_shutdown_grace")]
    #[validate(
        range(min = 0.0, message = "shutdown_grace cannot be negative"),
        custom(function = "validate_seconds")
    )]
    pub shutdown_grace: f64,

    /// Data sources
    #[serde(default)]
    #[validate(nested)]
    pub sources: Vec<SourceConfig>,

    /// Stream Processor settings
    #[serde(default)]
    #[validate(nested)]
    pub processor: ProcessorConfig,

    /// Source failure handling
    #[serde(default)]
    #[validate(nested)]
    pub health: SourceHealthConfig,
}

fn default_buffer_size() -> usize {
    1000
}

fn default_batch_size() -> usize {
    100
}

fn default_processing_interval() -> f64 {
    1.0
}

fn default_max_connections() -> usize {
    100
}

fn default_subscriber_backlog() -> usize {
    256
}

fn default_status_interval() -> f64 {
    5.0
}

fn default_shutdown_grace() -> f64 {
    5.0
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            buffer_size: default_buffer_size(),
            batch_size: default_batch_size(),
            processing_interval: default_processing_interval(),
            max_connections: default_max_connections(),
            subscriber_backlog: default_subscriber_backlog(),
            status_interval: default_status_interval(),
            shutdown_grace: default_shutdown_grace(),
            sources: Vec::new(),
            processor: ProcessorConfig::default(),
            health: SourceHealthConfig::default(),
        }
    }
}

impl StreamConfig {
    pub fn processing_interval(&self) -> Duration {
        saturating_secs(self.processing_interval)
    }

    pub fn status_interval(&self) -> Duration {
        saturating_secs(self.status_interval)
    }

    pub fn shutdown_grace(&self) -> Duration {
        saturating_secs(self.shutdown_grace)
    }
}

/// Stream Processor configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ProcessorConfig {
    /// Payload fields with rolling-window analytics (one window per field)
    #[serde(default = "default_tracked_metrics")]
    pub tracked_metrics: Vec<String>,

    /// Rolling window size (samples)
    #[serde(default = "default_window_size")]
    #[validate(range(min = 1, message = "window_size must be >= 1"))]
    pub window_size: usize,

    /// Samples required before anomaly detection kicks in
    #[serde(default = "default_min_samples")]
    #[validate(range(min = 1, message = "min_samples must be >= 1"))]
    pub min_samples: usize,

    /// Anomaly threshold k: flag when |v - mean| > k * std_dev
    #[serde(default = "default_anomaly_threshold")]
    #[validate(
        range(min = 0.0, message = "anomaly_threshold cannot be negative"),
        custom(function = "validate_finite")
    )]
    pub anomaly_threshold: f64,

    /// Multiplier for the derived `event_score` field
    #[serde(default = "default_score_multiplier")]
    pub score_multiplier: f64,

    /// Fields every record must carry
    #[serde(default)]
    pub required_fields: Vec<String>,

    /// Filter predicate; a record survives iff every rule passes
    #[serde(default)]
    pub filters: Vec<FilterRule>,

    /// Threshold-breach alert rules
    #[serde(default)]
    pub thresholds: Vec<ThresholdRule>,
}

fn default_tracked_metrics() -> Vec<String> {
    vec!["value".to_string()]
}

fn default_window_size() -> usize {
    20
}

fn default_min_samples() -> usize {
    5
}

fn default_anomaly_threshold() -> f64 {
    3.0
}

fn default_score_multiplier() -> f64 {
    1.5
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            tracked_metrics: default_tracked_metrics(),
            window_size: default_window_size(),
            min_samples: default_min_samples(),
            anomaly_threshold: default_anomaly_threshold(),
            score_multiplier: default_score_multiplier(),
            required_fields: Vec::new(),
            filters: Vec::new(),
            thresholds: Vec::new(),
        }
    }
}

/// Comparison operator of a filter rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    Exists,
    Contains,
}

/// One clause of the filter predicate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterRule {
    pub field: String,
    pub op: FilterOp,
    /// Operand (ignored by `exists`)
    #[serde(default)]
    pub value: Value,
}

impl FilterRule {
    pub fn new(field: impl Into<String>, op: FilterOp, value: Value) -> Self {
        Self {
            field: field.into(),
            op,
            value,
        }
    }
}

/// Alert when a numeric field leaves `[min, max]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdRule {
    pub field: String,
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
}

/// Source failure handling
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SourceHealthConfig {
    /// Consecutive failures before a source is marked degraded
    #[serde(default = "default_failure_threshold")]
    #[validate(range(min = 1, message = "failure_threshold must be >= 1"))]
    pub failure_threshold: u64,

    /// Backoff ceiling in seconds
    #[serde(default = "default_max_backoff")]
    #[validate(
        range(min = 0.001, message = "max_backoff must be >= 1ms"),
        custom(function = "validate_seconds")
    )]
    pub max_backoff: f64,
}

fn default_failure_threshold() -> u64 {
    3
}

fn default_max_backoff() -> f64 {
    60.0
}

impl Default for SourceHealthConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            max_backoff: default_max_backoff(),
        }
    }
}

impl SourceHealthConfig {
    pub fn max_backoff(&self) -> Duration {
        saturating_secs(self.max_backoff)
    }
}

/// Control-plane start request (`POST /api/stream/start`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartRequest {
    /// Source name; doubles as the generator profile
    pub source: String,
    /// Polling interval in seconds
    #[serde(default = "default_request_interval")]
    pub interval: f64,
}

fn default_request_interval() -> f64 {
    1.0
}

impl StartRequest {
    /// The single default source this request stands for
    pub fn to_source_config(&self) -> SourceConfig {
        SourceConfig::new(self.source.clone(), SourceKind::Synthetic, self.source.clone())
            .with_interval(self.interval)
    }
}
