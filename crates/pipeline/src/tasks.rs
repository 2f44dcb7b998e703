//! Long-running tasks owned by a running pipeline

use std::sync::Arc;
use std::time::Duration;

use contracts::{Alert, StreamEvent};
use hub::BroadcastHub;
use ingestion::IngestionBuffer;
use processor::StreamProcessor;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use crate::controller::Shared;

/// Consumer side of the Ingestion Buffer
///
/// Ends once the buffer is closed and drained; hands the processor back
/// so its window state can be reused by the next run.
#[instrument(name = "processor_loop", skip_all, fields(batch_size = batch_size))]
pub(crate) async fn processor_loop(
    mut processor: StreamProcessor,
    buffer: Arc<IngestionBuffer>,
    hub: Arc<BroadcastHub>,
    mut source_alerts: mpsc::Receiver<Alert>,
    batch_size: usize,
    interval: Duration,
) -> StreamProcessor {
    debug!("processor loop started");
    let mut batches: u64 = 0;

    // Kept across iterations so alerts never restart the batch deadline
    let next = buffer.next_batch(batch_size, interval);
    tokio::pin!(next);

    loop {
        tokio::select! {
            biased;
            Some(alert) = source_alerts.recv() => {
                hub.publish(StreamEvent::ErrorAlert(alert));
            }
            batch = &mut next => {
                let Some(batch) = batch else { break };
                let output = processor.process(batch);
                hub.publish(StreamEvent::DataUpdate(output.batch));
                for alert in output.alerts {
                    hub.publish(StreamEvent::ErrorAlert(alert));
                }
                batches += 1;
                next.set(buffer.next_batch(batch_size, interval));
            }
        }
    }

    while let Ok(alert) = source_alerts.try_recv() {
        hub.publish(StreamEvent::ErrorAlert(alert));
    }

    info!(batches, "processor loop drained");
    processor
}

/// Periodic `stream_status` + `metrics_update` push
#[instrument(name = "heartbeat_loop", skip_all)]
pub(crate) async fn heartbeat_loop(shared: Arc<Shared>, period: Duration, token: CancellationToken) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // First tick completes immediately
    ticker.tick().await;

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let status = shared.status();
        observability::metrics::record_buffer_depth(status.buffer_depth);
        let report = shared
            .collector
            .report(status.buffer_depth, status.subscribers);
        shared.hub.publish(StreamEvent::StreamStatus(status));
        shared.hub.publish(StreamEvent::MetricsUpdate(report));
    }

    debug!("heartbeat stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{AlertKind, Record, SourceKind};
    use hub::HubConfig;
    use observability::MetricsCollector;
    use serde_json::json;
    use tokio::time::{sleep, timeout};

    #[tokio::test]
    async fn test_alert_burst_does_not_delay_partial_batch() {
        let collector = Arc::new(MetricsCollector::new());
        let buffer = Arc::new(IngestionBuffer::new(16, Arc::clone(&collector)));
        let hub = Arc::new(BroadcastHub::new(HubConfig::default(), Arc::clone(&collector)));
        let mut sub = hub.subscribe().unwrap();
        let (tx, rx) = mpsc::channel(64);

        let task = tokio::spawn(processor_loop(
            StreamProcessor::new(Default::default(), Arc::clone(&collector)),
            Arc::clone(&buffer),
            Arc::clone(&hub),
            rx,
            10,
            Duration::from_millis(200),
        ));
        buffer
            .push(Record::new("s", SourceKind::Synthetic, json!({ "value": 1 })))
            .unwrap();

        let alerts = tokio::spawn(async move {
            while tx.send(Alert::new(AlertKind::SourceDegraded, "flapping")).await.is_ok() {
                sleep(Duration::from_millis(20)).await;
            }
        });

        let got_data = timeout(Duration::from_secs(1), async {
            while let Some(env) = sub.recv().await {
                if env.name() == "data_update" {
                    return true;
                }
            }
            false
        })
        .await;
        assert!(matches!(got_data, Ok(true)));

        alerts.abort();
        buffer.close();
        timeout(Duration::from_secs(1), task).await.unwrap().unwrap();
    }
}
