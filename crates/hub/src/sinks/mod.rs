//! Subscriber sink implementations
//!
//! Contains ChannelSink, LogSink, and JsonLinesSink.

mod channel;
mod json_lines;
mod log;

pub use self::channel::{ChannelSink, Subscription};
pub use self::json_lines::JsonLinesSink;
pub use self::log::LogSink;
