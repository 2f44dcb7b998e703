//! # Processor
//!
//! The Stream Processor. Each batch goes through a fixed stage order:
//! validate → filter → enrich → aggregate → analytics.
//!
//! ```ignore
//! let mut processor = StreamProcessor::new(config.processor.clone(), collector);
//! while let Some(batch) = buffer.next_batch(config.batch_size, interval).await {
//!     let output = processor.process(batch);
//!     hub.publish(StreamEvent::DataUpdate(output.batch));
//! }
//! ```

mod analytics;
mod engine;
mod error;
pub mod stages;
mod window;

pub use analytics::Analytics;
pub use engine::{ProcessorOutput, StreamProcessor};
pub use error::ProcessorError;
pub use window::{Deviation, WindowState};
