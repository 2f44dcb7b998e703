//! Per-source runner
//!
//! One task per registered source: activates the connector on its interval
//! (or continuously for push sources), stamps per-source sequence numbers,
//! and enqueues into the Ingestion Buffer. Failures are retried with
//! bounded exponential backoff; crossing the failure threshold marks the
//! source degraded without affecting any other source.

use std::sync::Arc;
use std::time::Duration;

use contracts::{Alert, AlertKind, SourceConfig, SourceHealthConfig};
use observability::MetricsCollector;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::buffer::IngestionBuffer;
use crate::connectors::SourceConnector;
use crate::error::IngestionError;

/// Shared handles every runner needs
#[derive(Clone)]
pub struct SourceContext {
    pub buffer: Arc<IngestionBuffer>,
    pub collector: Arc<MetricsCollector>,
    pub health: SourceHealthConfig,
    /// Degraded-source alerts; full channel drops the alert
    pub alerts: mpsc::Sender<Alert>,
}

/// `interval × 2^failures`, capped at `max`
pub fn backoff_delay(interval: Duration, consecutive_failures: u64, max: Duration) -> Duration {
    let exp = consecutive_failures.min(31) as u32;
    interval
        .checked_mul(1u32 << exp)
        .map_or(max, |d| d.min(max))
}

/// Handle to a running source task
#[derive(Debug)]
pub struct SourceTask {
    name: String,
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl SourceTask {
    /// Spawn the runner for `config`
    pub fn spawn(config: SourceConfig, ctx: SourceContext) -> Self {
        let token = CancellationToken::new();
        let name = config.name.clone();
        let handle = tokio::spawn(run_source(config, ctx, token.clone()));
        Self {
            name,
            token,
            handle,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Ask the runner to stop after its current activation
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Cancel and wait up to `grace`, aborting the task if it overruns
    pub async fn shutdown(self, grace: Duration) {
        self.token.cancel();
        let abort = self.handle.abort_handle();
        match tokio::time::timeout(grace, self.handle).await {
            Ok(Ok(())) => debug!(source = %self.name, "source task finished"),
            Ok(Err(e)) if e.is_cancelled() => {}
            Ok(Err(e)) => error!(source = %self.name, error = %e, "source task panicked"),
            Err(_) => {
                warn!(source = %self.name, "source task overran shutdown grace, aborting");
                abort.abort();
            }
        }
    }
}

#[instrument(
    name = "source_runner",
    skip(config, ctx, token),
    fields(source = %config.name, kind = %config.kind)
)]
async fn run_source(config: SourceConfig, ctx: SourceContext, token: CancellationToken) {
    let cell = ctx.collector.register_source(&config.name, config.kind);
    let interval = config.interval();
    let threshold = ctx.health.failure_threshold;
    let max_backoff = ctx.health.max_backoff();
    let mut connector: Option<SourceConnector> = None;
    let mut sequence: u64 = 0;

    info!(interval_ms = interval.as_millis() as u64, "source started");

    loop {
        if token.is_cancelled() {
            break;
        }

        let activation = match connector.as_mut() {
            None => match SourceConnector::connect(&config).await {
                Ok(c) => {
                    debug!("connector ready");
                    connector = Some(c);
                    continue;
                }
                Err(e) => Err(e),
            },
            // Push sources may wait indefinitely; cancellation interrupts them
            Some(c) if c.is_push() => tokio::select! {
                biased;
                _ = token.cancelled() => break,
                result = c.fetch() => result,
            },
            // Polling activations run to completion
            Some(c) => c.fetch().await,
        };

        let delay = match activation {
            Ok(records) => {
                let count = records.len() as u64;
                if cell.record_success(count) {
                    info!("source recovered");
                }
                let stamped: Vec<_> = records
                    .into_iter()
                    .map(|r| {
                        sequence += 1;
                        r.with_sequence(sequence)
                    })
                    .collect();
                match ctx.buffer.push_all(stamped) {
                    Ok(_) => {}
                    Err(IngestionError::BufferClosed) => {
                        debug!("buffer closed, source stopping");
                        break;
                    }
                    Err(e) => warn!(error = %e, "enqueue failed"),
                }
                match connector.as_ref() {
                    Some(c) if c.is_push() => Duration::ZERO,
                    _ => interval,
                }
            }
            Err(e) => {
                let message = e.to_string();
                warn!(error = %message, "source activation failed");
                if ctx
                    .collector
                    .record_source_failure(&config.name, &message, threshold)
                {
                    error!(
                        failures = cell.consecutive_failures(),
                        "source degraded after repeated failures"
                    );
                    let alert = Alert::new(
                        AlertKind::SourceDegraded,
                        format!(
                            "source '{}' degraded after {} consecutive failures: {message}",
                            config.name,
                            cell.consecutive_failures()
                        ),
                    )
                    .with_source(config.name.clone());
                    ctx.collector.record_alert(AlertKind::SourceDegraded.as_str());
                    if ctx.alerts.try_send(alert).is_err() {
                        warn!("alert channel full, degraded alert dropped");
                    }
                }
                if e.needs_reconnect() {
                    connector = None;
                }
                backoff_delay(interval, cell.consecutive_failures(), max_backoff)
            }
        };

        if delay.is_zero() {
            continue;
        }
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = tokio::time::sleep(delay) => {}
        }
    }

    info!(produced = sequence, "source stopped");
}
