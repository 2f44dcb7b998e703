//! Stream Processor: runs each batch through the fixed stage order.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use contracts::{
    Alert, AlertKind, Batch, BatchSummary, ProcessedBatch, ProcessedRecord, ProcessorConfig,
};
use observability::MetricsCollector;
use tracing::{debug, instrument, warn};

use crate::analytics::Analytics;
use crate::error::ProcessorError;
use crate::stages;
use crate::window::WindowState;

/// Result of processing one batch
#[derive(Debug)]
pub struct ProcessorOutput {
    /// Goes out as `data_update`
    pub batch: ProcessedBatch,
    /// Each goes out as `error_alert`
    pub alerts: Vec<Alert>,
}

/// Single owner of the rolling analytics state
#[derive(Debug)]
pub struct StreamProcessor {
    config: ProcessorConfig,
    analytics: Analytics,
    collector: Arc<MetricsCollector>,
}

/// Outcome of the per-source stages for one group
struct StageOutput {
    records: Vec<ProcessedRecord>,
    summary: BatchSummary,
    first_failure: Option<ProcessorError>,
}

impl StreamProcessor {
    pub fn new(config: ProcessorConfig, collector: Arc<MetricsCollector>) -> Self {
        Self {
            analytics: Analytics::new(&config),
            config,
            collector,
        }
    }

    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    /// Process one batch
    ///
    /// Record-level failures drop only that record. A batch where no record
    /// survives validate or enrich yields an empty, error-marked batch and
    /// one alert: `batch_rejected` if validation dropped them all,
    /// `processing_error` otherwise.
    #[instrument(
        name = "processor_batch",
        skip(self, batch),
        fields(batch_id = batch.id, records = batch.len())
    )]
    pub fn process(&mut self, batch: Batch) -> ProcessorOutput {
        let started = Instant::now();
        let batch_id = batch.id;

        let mut summary = BatchSummary::default();
        let mut records = Vec::with_capacity(batch.len());
        let mut first_failure = None;

        for group in batch.split_by_source() {
            let out = self.run_stages(group);
            records.extend(out.records);
            summary.merge(out.summary);
            first_failure = first_failure.or(out.first_failure);
        }

        self.collector.record_invalid(summary.invalid as u64);
        self.collector.record_filtered(summary.filtered as u64);
        if summary.failed > 0 {
            self.collector.record_failed("enrich", summary.failed as u64);
        }

        let mut alerts = Vec::new();
        let rejected = summary.input_records > 0
            && summary.invalid + summary.failed == summary.input_records;

        let error = if rejected {
            let (kind, message) = match &first_failure {
                None => (
                    AlertKind::BatchRejected,
                    format!(
                        "all {} records of batch {batch_id} failed validation",
                        summary.input_records
                    ),
                ),
                Some(err) => (
                    AlertKind::ProcessingError,
                    format!(
                        "all {} records of batch {batch_id} failed ({} invalid, {} in enrich): {err}",
                        summary.input_records, summary.invalid, summary.failed
                    ),
                ),
            };
            warn!(batch_id, "{message}");
            alerts.push(Alert::new(kind, message.clone()).with_batch(batch_id));
            Some(message)
        } else {
            if let Some(err) = first_failure {
                alerts.push(
                    Alert::new(
                        AlertKind::ProcessingError,
                        format!("{} record(s) dropped: {err}", summary.failed),
                    )
                    .with_batch(batch_id),
                );
            }

            let analytics_alerts = self.analytics.observe(&mut records, batch_id);
            summary.anomalies = analytics_alerts
                .iter()
                .filter(|a| a.kind == AlertKind::Anomaly)
                .count();
            alerts.extend(analytics_alerts);
            None
        };

        for (metric, snapshot) in self.analytics.snapshots() {
            summary.windows.insert(metric.to_string(), snapshot);
        }
        for alert in &alerts {
            self.collector.record_alert(alert.kind.as_str());
        }
        self.collector.record_batch(records.len(), started.elapsed());

        debug!(
            output = records.len(),
            invalid = summary.invalid,
            filtered = summary.filtered,
            failed = summary.failed,
            alerts = alerts.len(),
            "batch processed"
        );

        ProcessorOutput {
            batch: ProcessedBatch {
                batch_id,
                records,
                summary,
                error,
                emitted_at: Utc::now(),
            },
            alerts,
        }
    }

    /// validate → filter → enrich → aggregate over a single-source batch
    fn run_stages(&self, group: Batch) -> StageOutput {
        let now = Utc::now();
        let mut summary = BatchSummary {
            input_records: group.len(),
            ..Default::default()
        };
        let mut records = Vec::with_capacity(group.len());
        let mut first_failure = None;

        for record in group.records {
            if let Err(err) = stages::validate(&record, &self.config, now) {
                debug!(error = %err, "record dropped by validation");
                summary.invalid += 1;
                continue;
            }
            if !stages::filter(record.payload(), &self.config.filters) {
                summary.filtered += 1;
                continue;
            }
            match stages::enrich(record, &self.config, now) {
                Ok(processed) => records.push(processed),
                Err(err) => {
                    debug!(error = %err, "record dropped by enrich");
                    summary.failed += 1;
                    first_failure.get_or_insert(err);
                }
            }
        }

        stages::aggregate(&records, &self.config.tracked_metrics, &mut summary);

        StageOutput {
            records,
            summary,
            first_failure,
        }
    }

    /// Rolling window of a tracked metric
    pub fn window(&self, metric: &str) -> Option<&WindowState> {
        self.analytics.window(metric)
    }

    /// Fresh WindowState for a new run
    pub fn reset(&mut self) {
        self.analytics.reset();
    }
}
