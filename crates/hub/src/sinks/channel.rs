//! ChannelSink - in-process subscriber fed through an mpsc channel

use contracts::{ContractError, DataSink, Envelope};
use tokio::sync::mpsc;

use crate::handle::SubscriberId;

/// Sending half, owned by the subscriber's delivery task
pub struct ChannelSink {
    name: String,
    id: SubscriberId,
    tx: Option<mpsc::Sender<Envelope>>,
}

impl ChannelSink {
    /// Channel pair for subscriber `id`
    ///
    /// The channel holds a single envelope; buffering happens in the hub
    /// backlog so that its drop-oldest policy applies.
    pub fn pair(id: SubscriberId) -> (Self, Subscription) {
        let (tx, rx) = mpsc::channel(1);
        let sink = Self {
            name: format!("subscriber-{id}"),
            id,
            tx: Some(tx),
        };
        (sink, Subscription { id, rx })
    }
}

impl DataSink for ChannelSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn write(&mut self, envelope: &Envelope) -> Result<(), ContractError> {
        let disconnected = ContractError::SubscriberDisconnected {
            subscriber_id: self.id,
        };
        let tx = self.tx.as_ref().ok_or(disconnected)?;
        tx.send(envelope.clone())
            .await
            .map_err(|_| ContractError::SubscriberDisconnected {
                subscriber_id: self.id,
            })
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        Ok(())
    }

    async fn close(&mut self) -> Result<(), ContractError> {
        // Dropping the sender ends the receiver's stream
        self.tx = None;
        Ok(())
    }
}

/// Receiving half handed to the client
///
/// Dropping it disconnects the subscriber; the hub notices on the next
/// failed send.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriberId,
    rx: mpsc::Receiver<Envelope>,
}

impl Subscription {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Next envelope; `None` once the hub has disconnected this subscriber
    pub async fn recv(&mut self) -> Option<Envelope> {
        self.rx.recv().await
    }

    /// Next envelope if one is already queued
    pub fn try_recv(&mut self) -> Option<Envelope> {
        self.rx.try_recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{MetricsReport, StreamEvent};
    use std::sync::Arc;

    fn envelope(seq: u64) -> Envelope {
        Envelope::new(seq, Arc::new(StreamEvent::MetricsUpdate(MetricsReport::default())))
    }

    #[tokio::test]
    async fn test_channel_roundtrip() {
        let (mut sink, mut sub) = ChannelSink::pair(4);
        sink.write(&envelope(1)).await.unwrap();
        let got = sub.recv().await.unwrap();
        assert_eq!(got.seq, 1);
        assert_eq!(sub.id(), 4);

        assert!(sub.try_recv().is_none());
        sink.write(&envelope(2)).await.unwrap();
        assert_eq!(sub.try_recv().map(|e| e.seq), Some(2));
    }

    #[tokio::test]
    async fn test_dropped_receiver_is_disconnect() {
        let (mut sink, sub) = ChannelSink::pair(2);
        drop(sub);
        let err = sink.write(&envelope(1)).await.unwrap_err();
        assert!(matches!(err, ContractError::SubscriberDisconnected { subscriber_id: 2 }));
    }

    #[tokio::test]
    async fn test_close_ends_stream() {
        let (mut sink, mut sub) = ChannelSink::pair(1);
        sink.close().await.unwrap();
        assert!(sub.recv().await.is_none());
    }
}
