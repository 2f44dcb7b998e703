//! # Contracts
//!
//! Frozen interface contracts shared by every pipeline crate.
//! Business crates only talk to each other through these types.
//!
//! ## Data flow
//! `Record` (ingestion) → `Batch` (buffer) → `ProcessedBatch` + `Alert` (processor)
//! → `StreamEvent` wrapped in an `Envelope` (hub) → subscriber sinks.

mod error;
mod event;
mod processed;
mod record;
mod ring;
mod sink;
mod source;
mod source_id;
mod status;
mod stream_config;

pub use error::*;
pub use event::*;
pub use processed::*;
pub use record::*;
pub use ring::DropOldestRing;
pub use sink::*;
pub use source::*;
pub use source_id::SourceId;
pub use status::*;
pub use stream_config::*;
