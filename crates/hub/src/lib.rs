//! # Hub
//!
//! 广播中心 (Broadcast Hub)。
//!
//! 负责：
//! - 维护订阅者注册表（上限 `max_connections`）
//! - 将每个事件追加到各订阅者的有界 drop-oldest 积压队列
//! - 每个订阅者一个投递任务，慢订阅者不会阻塞其他订阅者

pub mod error;
pub mod handle;
mod hub;
pub mod metrics;
pub mod sinks;

pub use contracts::{DataSink, Envelope, StreamEvent};
pub use error::HubError;
pub use handle::{SubscriberHandle, SubscriberId};
pub use hub::{BroadcastHub, HubConfig, SubscriberInfo};
pub use metrics::{SubscriberMetrics, SubscriberStats};
pub use sinks::{ChannelSink, JsonLinesSink, LogSink, Subscription};
