//! DataSink trait - subscriber delivery interface
//!
//! Each subscriber owns exactly one sink; the hub's delivery task is the
//! only writer.

use crate::{ContractError, Envelope};

/// Outbound delivery trait
///
/// All subscriber sinks must implement this trait.
#[trait_variant::make(DataSink: Send)]
pub trait LocalDataSink {
    /// Sink name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Deliver one event
    ///
    /// # Errors
    /// `SubscriberDisconnected` when the peer has gone away; the hub
    /// then removes the subscriber. Other errors are counted and skipped.
    async fn write(&mut self, envelope: &Envelope) -> Result<(), ContractError>;

    /// Flush buffer (if any)
    async fn flush(&mut self) -> Result<(), ContractError>;

    /// Close sink
    async fn close(&mut self) -> Result<(), ContractError>;
}
