//! # Pipeline
//!
//! The controller that wires everything together:
//! Source Connectors → Ingestion Buffer → Stream Processor → Broadcast Hub.
//!
//! ```ignore
//! let pipeline = StreamPipeline::new(config);
//! let mut updates = pipeline.subscribe()?;
//! pipeline.start().await?;
//! while let Some(envelope) = updates.recv().await {
//!     println!("{} #{}", envelope.name(), envelope.seq);
//! }
//! ```

mod controller;
mod error;
mod tasks;

pub use controller::StreamPipeline;
pub use error::{PipelineError, Result};
pub use hub::{Envelope, StreamEvent, Subscription};
