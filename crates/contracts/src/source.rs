//! SourceConfig - source descriptors and health

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Connector type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// HTTP polling API
    Api,
    /// Database change feed
    Db,
    /// File/log tail
    File,
    /// IoT telemetry (push)
    Iot,
    /// Built-in generator
    Synthetic,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Api => "api",
            Self::Db => "db",
            Self::File => "file",
            Self::Iot => "iot",
            Self::Synthetic => "synthetic",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Named data-source descriptor
///
/// Immutable after registration; to change a source, remove and re-add it.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SourceConfig {
    /// Unique source name, used to tag records
    #[validate(length(min = 1, message = "source name cannot be empty"))]
    pub name: String,

    /// Connector type
    pub kind: SourceKind,

    /// Connection target: URL, database path, file path, bind address or generator profile
    #[validate(length(min = 1, message = "source target cannot be empty"))]
    pub target: String,

    /// Polling interval in seconds
    #[serde(default = "default_interval")]
    #[validate(
        range(min = 0.001, message = "interval must be >= 1ms"),
        custom(function = "crate::stream_config::validate_seconds")
    )]
    pub interval: f64,

    /// Kind-specific parameters
    #[serde(default)]
    pub params: HashMap<String, String>,
}

fn default_interval() -> f64 {
    1.0
}

impl SourceConfig {
    pub fn new(name: impl Into<String>, kind: SourceKind, target: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            target: target.into(),
            interval: default_interval(),
            params: HashMap::new(),
        }
    }

    pub fn with_interval(mut self, seconds: f64) -> Self {
        self.interval = seconds;
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Polling interval as a `Duration`
    pub fn interval(&self) -> Duration {
        crate::saturating_secs(self.interval).max(Duration::from_millis(1))
    }

    /// Parse a numeric parameter, falling back to `default`
    pub fn param_or<T: std::str::FromStr>(&self, key: &str, default: T) -> T {
        self.params
            .get(key)
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }
}

/// `[A-Za-z_][A-Za-z0-9_]*`, safe to splice into SQL as a table name
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Health of a registered source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceState {
    #[default]
    Active,
    Degraded,
}

/// Per-source health report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceHealth {
    pub name: String,
    pub kind: SourceKind,
    pub state: SourceState,
    /// Records produced by this source
    pub records: u64,
    /// Total failed activations
    pub failures: u64,
    /// Failures since the last success
    pub consecutive_failures: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}
