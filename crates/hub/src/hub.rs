//! BroadcastHub - fan-out of stream events to every subscriber

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use contracts::{DataSink, StreamConfig, StreamEvent};
use observability::MetricsCollector;
use parking_lot::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::error::HubError;
use crate::handle::{SubscriberHandle, SubscriberId};
use crate::metrics::SubscriberStats;
use crate::sinks::{ChannelSink, Subscription};

/// Hub configuration
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Subscriber cap; further connects are refused
    pub max_connections: usize,
    /// Per-subscriber backlog cap
    pub backlog: usize,
    /// How long a delivery task may take to stop before it is aborted
    pub shutdown_grace: Duration,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self::from_stream(&StreamConfig::default())
    }
}

impl HubConfig {
    pub fn from_stream(config: &StreamConfig) -> Self {
        Self {
            max_connections: config.max_connections,
            backlog: config.subscriber_backlog,
            shutdown_grace: config.shutdown_grace(),
        }
    }
}

/// Per-subscriber view for status reporting
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriberInfo {
    pub id: SubscriberId,
    pub name: String,
    pub stats: SubscriberStats,
}

/// Subscriber registry plus non-blocking fan-out
///
/// `publish` only appends to per-subscriber backlogs; each subscriber's
/// delivery task drains its own backlog, so a stalled subscriber cannot
/// delay the publisher or any other subscriber.
pub struct BroadcastHub {
    config: HubConfig,
    collector: Arc<MetricsCollector>,
    subscribers: Mutex<Vec<SubscriberHandle>>,
    next_id: AtomicU64,
    closed: AtomicBool,
}

impl BroadcastHub {
    pub fn new(config: HubConfig, collector: Arc<MetricsCollector>) -> Self {
        Self {
            config,
            collector,
            subscribers: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            closed: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    /// Connect an in-process subscriber
    pub fn subscribe(&self) -> Result<Subscription, HubError> {
        let mut subscription = None;
        self.register(|id| {
            let (sink, sub) = ChannelSink::pair(id);
            subscription = Some(sub);
            sink
        })?;
        subscription.ok_or(HubError::Closed)
    }

    /// Connect a subscriber backed by an arbitrary sink
    pub fn attach<S: DataSink + 'static>(&self, sink: S) -> Result<SubscriberId, HubError> {
        self.register(|_| sink)
    }

    fn register<S, F>(&self, make_sink: F) -> Result<SubscriberId, HubError>
    where
        S: DataSink + 'static,
        F: FnOnce(SubscriberId) -> S,
    {
        if self.closed.load(Ordering::Acquire) {
            return Err(HubError::Closed);
        }

        let mut subscribers = self.subscribers.lock();
        prune(&mut subscribers);
        if subscribers.len() >= self.config.max_connections {
            warn!(max = self.config.max_connections, "subscriber refused, hub at capacity");
            return Err(HubError::TooManySubscribers {
                max: self.config.max_connections,
            });
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let handle = SubscriberHandle::spawn(id, make_sink(id), self.config.backlog);
        info!(subscriber = id, sink = handle.name(), total = subscribers.len() + 1, "subscriber connected");
        subscribers.push(handle);
        Ok(id)
    }

    /// Push an event to every live subscriber without waiting
    ///
    /// Returns the number of subscribers the event was queued for.
    pub fn publish(&self, event: StreamEvent) -> usize {
        let name = event.name();
        let event = Arc::new(event);

        let (queued, evicted) = {
            let mut subscribers = self.subscribers.lock();
            prune(&mut subscribers);
            let evicted = subscribers.iter().filter(|s| s.enqueue(&event)).count();
            (subscribers.len(), evicted)
        };

        self.collector.record_subscriber_drops(evicted as u64);
        observability::metrics::record_event_published(name, queued);
        if evicted > 0 {
            debug!(event = name, evicted, "subscriber backlog overflow");
        }
        queued
    }

    /// Live subscribers
    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .iter()
            .filter(|s| !s.is_closed())
            .count()
    }

    pub fn subscribers(&self) -> Vec<SubscriberInfo> {
        self.subscribers
            .lock()
            .iter()
            .filter(|s| !s.is_closed())
            .map(|s| SubscriberInfo {
                id: s.id(),
                name: s.name().to_string(),
                stats: s.metrics().snapshot(),
            })
            .collect()
    }

    /// Disconnect one subscriber; false if unknown
    pub async fn disconnect(&self, id: SubscriberId) -> bool {
        let handle = {
            let mut subscribers = self.subscribers.lock();
            let pos = subscribers.iter().position(|s| s.id() == id);
            pos.map(|pos| subscribers.swap_remove(pos))
        };
        match handle {
            Some(handle) => {
                handle.shutdown(self.config.shutdown_grace).await;
                true
            }
            None => false,
        }
    }

    /// Force-disconnect every subscriber
    #[instrument(name = "hub_disconnect_all", skip(self))]
    pub async fn disconnect_all(&self) -> usize {
        let handles: Vec<_> = self.subscribers.lock().drain(..).collect();
        let count = handles.len();
        for handle in handles {
            handle.shutdown(self.config.shutdown_grace).await;
        }
        if count > 0 {
            info!(subscribers = count, "all subscribers disconnected");
        }
        count
    }

    /// Disconnect everyone and refuse new subscribers
    pub async fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.disconnect_all().await;
    }

    /// Accept subscribers again after `close`
    pub fn reopen(&self) {
        self.closed.store(false, Ordering::Release);
    }
}

/// Drop handles whose delivery task has ended
fn prune(subscribers: &mut Vec<SubscriberHandle>) {
    subscribers.retain(|s| {
        let closed = s.is_closed();
        if closed {
            debug!(subscriber = s.id(), "removing disconnected subscriber");
        }
        !closed
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{Alert, AlertKind, MetricsReport};
    use tokio::time::{sleep, timeout};

    fn hub(max_connections: usize, backlog: usize) -> (BroadcastHub, Arc<MetricsCollector>) {
        let collector = Arc::new(MetricsCollector::new());
        let config = HubConfig {
            max_connections,
            backlog,
            shutdown_grace: Duration::from_millis(200),
        };
        (BroadcastHub::new(config, Arc::clone(&collector)), collector)
    }

    fn alert(n: u32) -> StreamEvent {
        StreamEvent::ErrorAlert(Alert::new(AlertKind::Anomaly, format!("alert {n}")))
    }

    #[tokio::test]
    async fn test_fanout_preserves_order() {
        let (hub, _) = hub(4, 16);
        let mut a = hub.subscribe().unwrap();
        let mut b = hub.subscribe().unwrap();

        for n in 0..5 {
            assert_eq!(hub.publish(alert(n)), 2);
        }

        for sub in [&mut a, &mut b] {
            for expected in 1..=5 {
                let env = timeout(Duration::from_secs(1), sub.recv()).await.unwrap().unwrap();
                assert_eq!(env.seq, expected);
                assert_eq!(env.name(), "error_alert");
            }
        }
    }

    #[tokio::test]
    async fn test_max_connections() {
        let (hub, _) = hub(2, 4);
        let _a = hub.subscribe().unwrap();
        let _b = hub.subscribe().unwrap();
        assert!(matches!(
            hub.subscribe(),
            Err(HubError::TooManySubscribers { max: 2 })
        ));
    }

    #[tokio::test]
    async fn test_stalled_subscriber_capped_others_unaffected() {
        let (hub, collector) = hub(4, 3);
        let _stalled = hub.subscribe().unwrap();
        let mut live = hub.subscribe().unwrap();

        for n in 0..20 {
            hub.publish(alert(n));
            let env = timeout(Duration::from_secs(1), live.recv()).await.unwrap().unwrap();
            assert_eq!(env.seq, u64::from(n) + 1);
        }
        sleep(Duration::from_millis(20)).await;

        let stats = hub.subscribers();
        let stalled = stats.iter().find(|s| s.id == 1).unwrap();
        assert!(stalled.stats.backlog_len <= 3);
        assert!(stalled.stats.dropped > 0);
        assert_eq!(collector.counters().subscriber_drops, stalled.stats.dropped);
    }

    #[tokio::test]
    async fn test_dropped_subscription_is_pruned() {
        let (hub, _) = hub(1, 4);
        let sub = hub.subscribe().unwrap();
        drop(sub);

        hub.publish(StreamEvent::MetricsUpdate(MetricsReport::default()));
        sleep(Duration::from_millis(50)).await;
        hub.publish(StreamEvent::MetricsUpdate(MetricsReport::default()));

        assert_eq!(hub.subscriber_count(), 0);
        // Slot freed for a new subscriber
        assert!(hub.subscribe().is_ok());
    }

    #[tokio::test]
    async fn test_disconnect_one_others_keep_receiving() {
        let (hub, _) = hub(4, 8);
        let mut gone = hub.subscribe().unwrap();
        let mut kept = hub.subscribe().unwrap();

        assert!(hub.disconnect(gone.id()).await);
        assert!(!hub.disconnect(gone.id()).await);
        assert_eq!(hub.subscriber_count(), 1);

        assert_eq!(hub.publish(alert(0)), 1);
        let env = timeout(Duration::from_secs(1), kept.recv()).await.unwrap().unwrap();
        assert_eq!(env.seq, 1);
        assert!(timeout(Duration::from_secs(1), gone.recv()).await.unwrap().is_none());
        assert!(gone.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_disconnect_all_closes_streams() {
        let (hub, _) = hub(4, 4);
        let mut sub = hub.subscribe().unwrap();
        assert_eq!(hub.disconnect_all().await, 1);
        assert!(timeout(Duration::from_secs(1), sub.recv()).await.unwrap().is_none());
        assert_eq!(hub.publish(alert(0)), 0);
    }

    #[tokio::test]
    async fn test_closed_hub_refuses_subscribers() {
        let (hub, _) = hub(4, 4);
        hub.close().await;
        assert!(matches!(hub.subscribe(), Err(HubError::Closed)));
        hub.reopen();
        assert!(hub.subscribe().is_ok());
    }
}
