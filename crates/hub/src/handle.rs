//! SubscriberHandle - one subscriber's bounded backlog plus its delivery task

use std::sync::Arc;
use std::time::Duration;

use contracts::{DataSink, DropOldestRing, Envelope, StreamEvent};
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::metrics::SubscriberMetrics;

/// Hub-assigned subscriber id
pub type SubscriberId = u64;

struct BacklogState {
    ring: DropOldestRing<Envelope>,
    /// Sequence number of the next enqueued envelope
    next_seq: u64,
}

/// Bounded outbound backlog shared by the hub (writer) and the delivery task (reader)
struct Backlog {
    state: Mutex<BacklogState>,
    ready: Notify,
}

impl Backlog {
    fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(BacklogState {
                ring: DropOldestRing::new(capacity),
                next_seq: 1,
            }),
            ready: Notify::new(),
        }
    }
}

/// Handle to a running subscriber
pub struct SubscriberHandle {
    id: SubscriberId,
    name: String,
    backlog: Arc<Backlog>,
    metrics: Arc<SubscriberMetrics>,
    token: CancellationToken,
    worker_handle: JoinHandle<()>,
}

impl SubscriberHandle {
    /// Create the backlog and spawn the delivery task
    pub fn spawn<S: DataSink + 'static>(id: SubscriberId, sink: S, backlog_capacity: usize) -> Self {
        let name = sink.name().to_string();
        let backlog = Arc::new(Backlog::new(backlog_capacity));
        let metrics = Arc::new(SubscriberMetrics::new());
        let token = CancellationToken::new();

        let worker_handle = tokio::spawn(delivery_loop(
            sink,
            Arc::clone(&backlog),
            Arc::clone(&metrics),
            token.clone(),
            id,
            name.clone(),
        ));

        Self {
            id,
            name,
            backlog,
            metrics,
            token,
            worker_handle,
        }
    }

    pub fn id(&self) -> SubscriberId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn metrics(&self) -> &Arc<SubscriberMetrics> {
        &self.metrics
    }

    /// Append an event to the backlog without waiting
    ///
    /// Returns true if the oldest unsent entry was evicted to make room.
    pub fn enqueue(&self, event: &Arc<StreamEvent>) -> bool {
        let evicted = {
            let mut state = self.backlog.state.lock();
            let seq = state.next_seq;
            state.next_seq += 1;
            let evicted = state.ring.push(Envelope::new(seq, Arc::clone(event)));
            self.metrics.set_backlog_len(state.ring.len());
            evicted
        };
        self.backlog.ready.notify_one();

        match evicted {
            Some(old) => {
                self.metrics.inc_dropped();
                debug!(subscriber = self.id, seq = old.seq, "backlog full, oldest entry dropped");
                true
            }
            None => false,
        }
    }

    /// Delivery task has ended or was told to stop
    pub fn is_closed(&self) -> bool {
        self.token.is_cancelled() || self.worker_handle.is_finished()
    }

    /// Stop delivery, abort the task if it does not finish within `grace`
    #[instrument(name = "subscriber_shutdown", skip(self), fields(subscriber = self.id))]
    pub async fn shutdown(mut self, grace: Duration) {
        self.token.cancel();
        self.backlog.ready.notify_one();
        match tokio::time::timeout(grace, &mut self.worker_handle).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!(subscriber = self.id, error = ?e, "delivery task panicked"),
            Err(_) => {
                warn!(subscriber = self.id, "delivery task did not stop in time, aborting");
                self.worker_handle.abort();
            }
        }
        debug!(subscriber = self.id, "subscriber shutdown complete");
    }
}

/// Drains the backlog into the sink in sequence order
#[instrument(
    name = "subscriber_delivery_loop",
    skip_all,
    fields(subscriber = id, sink = %name)
)]
async fn delivery_loop<S: DataSink>(
    mut sink: S,
    backlog: Arc<Backlog>,
    metrics: Arc<SubscriberMetrics>,
    token: CancellationToken,
    id: SubscriberId,
    name: String,
) {
    debug!("delivery task started");

    loop {
        let next = {
            let mut state = backlog.state.lock();
            let next = state.ring.pop();
            metrics.set_backlog_len(state.ring.len());
            next
        };

        let envelope = match next {
            Some(envelope) => envelope,
            None => {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = backlog.ready.notified() => {}
                }
                continue;
            }
        };

        let result = tokio::select! {
            biased;
            _ = token.cancelled() => break,
            result = sink.write(&envelope) => result,
        };

        match result {
            Ok(()) => {
                metrics.inc_delivered();
                observability::metrics::record_subscriber_delivery(&name, true);
            }
            Err(e) if e.is_disconnect() => {
                info!(seq = envelope.seq, "subscriber disconnected");
                token.cancel();
                break;
            }
            Err(e) => {
                metrics.inc_failures();
                observability::metrics::record_subscriber_delivery(&name, false);
                warn!(seq = envelope.seq, event = envelope.name(), error = %e, "delivery failed");
            }
        }
    }

    if let Err(e) = sink.flush().await {
        debug!(error = %e, "flush failed on shutdown");
    }
    if let Err(e) = sink.close().await {
        debug!(error = %e, "close failed on shutdown");
    }

    debug!("delivery task stopped");
}
