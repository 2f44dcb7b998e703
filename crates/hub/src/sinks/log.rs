//! LogSink - logs event summaries via tracing

use contracts::{ContractError, DataSink, Envelope, StreamEvent};
use tracing::{info, instrument};

/// Sink that logs a one-line summary per event
pub struct LogSink {
    name: String,
}

impl LogSink {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    fn log_summary(&self, envelope: &Envelope) {
        match envelope.event.as_ref() {
            StreamEvent::DataUpdate(batch) => info!(
                sink = %self.name,
                seq = envelope.seq,
                batch_id = batch.batch_id,
                records = batch.len(),
                anomalies = batch.summary.anomalies,
                rejected = batch.is_rejected(),
                "data_update"
            ),
            StreamEvent::StreamStatus(status) => info!(
                sink = %self.name,
                seq = envelope.seq,
                state = %status.state,
                processed = status.counters.processed,
                throughput = status.throughput,
                "stream_status"
            ),
            StreamEvent::ErrorAlert(alert) => info!(
                sink = %self.name,
                seq = envelope.seq,
                kind = %alert.kind,
                message = %alert.message,
                "error_alert"
            ),
            StreamEvent::MetricsUpdate(report) => info!(
                sink = %self.name,
                seq = envelope.seq,
                throughput = report.throughput,
                latency_mean_ms = report.latency_mean_ms,
                "metrics_update"
            ),
        }
    }
}

impl DataSink for LogSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "log_sink_write",
        skip(self, envelope),
        fields(sink = %self.name, seq = envelope.seq)
    )]
    async fn write(&mut self, envelope: &Envelope) -> Result<(), ContractError> {
        self.log_summary(envelope);
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        Ok(())
    }

    #[instrument(name = "log_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        info!(sink = %self.name, "LogSink closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{Alert, AlertKind};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_log_sink_write() {
        let mut sink = LogSink::new("test_log");
        let alert = Alert::new(AlertKind::Anomaly, "value spiked");
        let envelope = Envelope::new(1, Arc::new(StreamEvent::ErrorAlert(alert)));
        assert!(sink.write(&envelope).await.is_ok());
    }

    #[tokio::test]
    async fn test_log_sink_name() {
        let sink = LogSink::new("my_logger");
        assert_eq!(sink.name(), "my_logger");
    }
}
