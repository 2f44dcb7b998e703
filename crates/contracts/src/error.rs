//! Layered error definitions
//!
//! Categorized by pipeline stage: config / control / source / record / delivery

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Control Errors =====
    /// `start` called while the pipeline is not stopped
    #[error("pipeline is already running (state: {state})")]
    AlreadyRunning { state: String },

    /// `stop` called while the pipeline is not running
    #[error("pipeline is not running (state: {state})")]
    NotRunning { state: String },

    /// A source with the same name is already registered
    #[error("source '{name}' is already registered")]
    DuplicateSource { name: String },

    /// No source registered under that name
    #[error("unknown source '{name}'")]
    UnknownSource { name: String },

    // ===== Source Errors =====
    /// Fetch/connect failure for a single activation
    #[error("source '{source_name}' fetch failed: {message}")]
    Source {
        source_name: String,
        message: String,
    },

    // ===== Record Errors =====
    /// Malformed record
    #[error("invalid record from '{source_name}': {message}")]
    Validation {
        source_name: String,
        message: String,
    },

    /// Stage computation failure on a record
    #[error("processing error in stage '{stage}': {message}")]
    Processing { stage: String, message: String },

    // ===== Delivery Errors =====
    /// Buffer or backlog full, oldest entry evicted
    #[error("{queue} overflow: capacity={capacity}")]
    Overflow { queue: String, capacity: usize },

    /// Subscriber went away
    #[error("subscriber {subscriber_id} disconnected")]
    SubscriberDisconnected { subscriber_id: u64 },

    /// Subscriber cap reached
    #[error("too many subscribers: max_connections={max}")]
    TooManySubscribers { max: usize },

    /// Sink write error
    #[error("sink '{sink_name}' write error: {message}")]
    SinkWrite { sink_name: String, message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create source fetch error
    pub fn source(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Source {
            source_name: source_name.into(),
            message: message.into(),
        }
    }

    /// Create record validation error
    pub fn validation(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            source_name: source_name.into(),
            message: message.into(),
        }
    }

    /// Create stage processing error
    pub fn processing(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Processing {
            stage: stage.into(),
            message: message.into(),
        }
    }

    /// Create sink write error
    pub fn sink_write(sink_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkWrite {
            sink_name: sink_name.into(),
            message: message.into(),
        }
    }

    /// Whether the error means the receiving side is gone for good
    pub fn is_disconnect(&self) -> bool {
        match self {
            Self::SubscriberDisconnected { .. } => true,
            Self::Io(err) => err.kind() == std::io::ErrorKind::BrokenPipe,
            _ => false,
        }
    }
}
