//! Pipeline state and status snapshot

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::SourceHealth;

/// Pipeline lifecycle state
///
/// `Stopped → Starting → Running → Stopping → Stopped`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    #[default]
    Stopped,
    Starting,
    Running,
    Stopping,
}

impl PipelineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stopped => "stopped",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Process-wide counters, reset at each `start`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamCounters {
    /// Records accepted into the Ingestion Buffer
    pub ingested: u64,
    /// Records evicted from the Ingestion Buffer
    pub dropped: u64,
    /// Records emitted by the Stream Processor
    pub processed: u64,
    /// Records dropped by validation or a failing stage
    pub errors: u64,
    /// Records dropped by the filter predicate
    pub filtered: u64,
    /// Batches emitted
    pub batches: u64,
    /// Alerts raised
    pub alerts: u64,
    /// Failed source activations
    pub source_errors: u64,
    /// Backlog entries evicted across all subscribers
    pub subscriber_drops: u64,
}

/// Read-only status snapshot (`stream_status` payload)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub state: PipelineState,
    pub counters: StreamCounters,
    /// Processed records per second over the trailing window
    pub throughput: f64,
    pub sources: Vec<SourceHealth>,
    /// Connected subscribers
    pub subscribers: usize,
    /// Records currently waiting in the Ingestion Buffer
    pub buffer_depth: usize,
    pub started_at: Option<DateTime<Utc>>,
    pub taken_at: DateTime<Utc>,
}

impl StatusSnapshot {
    /// Snapshot of a freshly constructed, never-started pipeline
    pub fn stopped() -> Self {
        Self {
            state: PipelineState::Stopped,
            counters: StreamCounters::default(),
            throughput: 0.0,
            sources: Vec::new(),
            subscribers: 0,
            buffer_depth: 0,
            started_at: None,
            taken_at: Utc::now(),
        }
    }

    pub fn degraded_sources(&self) -> impl Iterator<Item = &SourceHealth> {
        self.sources
            .iter()
            .filter(|s| s.state == crate::SourceState::Degraded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_display() {
        assert_eq!(PipelineState::Running.to_string(), "running");
        assert_eq!(PipelineState::default(), PipelineState::Stopped);
    }

    #[test]
    fn test_state_serde() {
        let json = serde_json::to_string(&PipelineState::Stopping).unwrap();
        assert_eq!(json, "\"stopping\"");
    }
}
