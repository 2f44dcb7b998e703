//! # Ingestion
//!
//! Source Connectors and the Ingestion Buffer.
//!
//! Responsibilities:
//! - Connect to `api` / `db` / `file` / `iot` / `synthetic` sources
//! - Run one task per source with backoff and degraded marking
//! - Absorb bursts in a bounded drop-oldest buffer
//! - Hand size/time-bounded batches to the Stream Processor
//!
//! ## Usage Example
//!
//! ```ignore
//! use ingestion::{IngestionBuffer, SourceContext, SourceTask};
//!
//! let buffer = Arc::new(IngestionBuffer::new(1000, collector.clone()));
//! let task = SourceTask::spawn(source_config, SourceContext {
//!     buffer: buffer.clone(),
//!     collector,
//!     health: Default::default(),
//!     alerts: alert_tx,
//! });
//!
//! while let Some(batch) = buffer.next_batch(100, Duration::from_secs(1)).await {
//!     // process batch
//! }
//! ```

mod buffer;
pub mod connectors;
mod error;
mod runner;

pub use buffer::IngestionBuffer;
pub use connectors::SourceConnector;
pub use error::{IngestionError, Result};
pub use runner::{backoff_delay, SourceContext, SourceTask};
