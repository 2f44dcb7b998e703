//! Rolling-window analytics: moving average, anomaly and threshold alerts.

use std::collections::HashMap;

use contracts::{Alert, AlertKind, ProcessedRecord, ProcessorConfig, ThresholdRule, WindowSnapshot};
use tracing::{debug, warn};

use crate::window::WindowState;

/// Owner of every `WindowState`; one window per tracked metric name
#[derive(Debug)]
pub struct Analytics {
    windows: HashMap<String, WindowState>,
    metrics: Vec<String>,
    window_size: usize,
    min_samples: usize,
    k: f64,
    thresholds: Vec<ThresholdRule>,
}

impl Analytics {
    pub fn new(config: &ProcessorConfig) -> Self {
        let windows = config
            .tracked_metrics
            .iter()
            .map(|m| (m.clone(), WindowState::new(config.window_size)))
            .collect();
        Self {
            windows,
            metrics: config.tracked_metrics.clone(),
            window_size: config.window_size,
            min_samples: config.min_samples,
            k: config.anomaly_threshold,
            thresholds: config.thresholds.clone(),
        }
    }

    /// Feed records in order; flags anomalous records and returns alerts
    pub fn observe(&mut self, records: &mut [ProcessedRecord], batch_id: u64) -> Vec<Alert> {
        let mut alerts = Vec::new();

        for record in records.iter_mut() {
            for metric in &self.metrics {
                let Some(value) = record.number(metric) else {
                    continue;
                };
                let window = self
                    .windows
                    .entry(metric.clone())
                    .or_insert_with(|| WindowState::new(self.window_size));

                if let Some(dev) = window.assess(value, self.k, self.min_samples) {
                    record.anomalous = true;
                    warn!(
                        source = %record.source,
                        metric = %metric,
                        value,
                        mean = dev.mean,
                        std_dev = dev.std_dev,
                        "anomaly detected"
                    );
                    let mut alert = Alert::new(
                        AlertKind::Anomaly,
                        format!(
                            "{metric}={value} deviates from rolling mean {:.3} (std {:.3})",
                            dev.mean, dev.std_dev
                        ),
                    )
                    .with_source(record.source.as_str())
                    .with_metric(metric.as_str(), value)
                    .with_expected(dev.mean)
                    .with_batch(batch_id);
                    if dev.sigmas.is_finite() {
                        alert = alert.with_deviation(dev.sigmas);
                    }
                    alerts.push(alert);
                }
                window.push(value);
            }

            for rule in &self.thresholds {
                if let Some(alert) = check_threshold(rule, record, batch_id) {
                    debug!(source = %record.source, field = %rule.field, "threshold breached");
                    alerts.push(alert);
                }
            }
        }

        alerts
    }

    /// Window state of every tracked metric, keyed by metric name
    pub fn snapshots(&self) -> impl Iterator<Item = (&str, WindowSnapshot)> {
        self.windows.iter().map(|(k, w)| (k.as_str(), w.snapshot()))
    }

    pub fn window(&self, metric: &str) -> Option<&WindowState> {
        self.windows.get(metric)
    }

    pub fn reset(&mut self) {
        self.windows.values_mut().for_each(WindowState::clear);
    }
}

fn check_threshold(rule: &ThresholdRule, record: &ProcessedRecord, batch_id: u64) -> Option<Alert> {
    let value = record.number(&rule.field)?;
    let (limit, side) = match (rule.min, rule.max) {
        (Some(min), _) if value < min => (min, "below minimum"),
        (_, Some(max)) if value > max => (max, "above maximum"),
        _ => return None,
    };
    Some(
        Alert::new(
            AlertKind::ThresholdBreach,
            format!("{}={value} {side} {limit}", rule.field),
        )
        .with_source(record.source.as_str())
        .with_metric(rule.field.as_str(), value)
        .with_expected(limit)
        .with_batch(batch_id),
    )
}
