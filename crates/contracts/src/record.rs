//! Record / Batch - Ingestion output
//!
//! A `Record` is immutable once built; stages downstream produce new
//! values instead of editing it in place.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{SourceId, SourceKind};

/// One raw unit from a source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    source: SourceId,
    kind: SourceKind,
    key: Option<String>,
    sequence: u64,
    ingested_at: DateTime<Utc>,
    payload: Value,
}

impl Record {
    /// Create a record stamped with the current time
    pub fn new(source: impl Into<SourceId>, kind: SourceKind, payload: Value) -> Self {
        Self {
            source: source.into(),
            kind,
            key: None,
            sequence: 0,
            ingested_at: Utc::now(),
            payload,
        }
    }

    /// Attach a partition/message key
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Attach the per-source sequence number
    pub fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = sequence;
        self
    }

    /// Override the ingestion timestamp
    pub fn with_ingested_at(mut self, ingested_at: DateTime<Utc>) -> Self {
        self.ingested_at = ingested_at;
        self
    }

    pub fn source(&self) -> &SourceId {
        &self.source
    }

    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn ingested_at(&self) -> DateTime<Utc> {
        self.ingested_at
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }

    /// Consume the record, yielding its payload
    pub fn into_payload(self) -> Value {
        self.payload
    }
}

/// Ordered group of records handed from one stage to the next
///
/// Ownership moves with the batch; no stage keeps a reference to a batch
/// it has handed off.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Batch {
    /// Monotonically increasing batch id (per run)
    pub id: u64,

    /// Records in enqueue order
    pub records: Vec<Record>,

    /// When the batch was cut from the buffer
    pub created_at: DateTime<Utc>,
}

impl Batch {
    pub fn new(id: u64, records: Vec<Record>) -> Self {
        Self {
            id,
            records,
            created_at: Utc::now(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Split into single-source batches
    ///
    /// Groups appear in order of each source's first record; order inside a
    /// group is the original order.
    pub fn split_by_source(self) -> Vec<Batch> {
        let Batch {
            id,
            records,
            created_at,
        } = self;

        let mut groups: Vec<Batch> = Vec::new();
        for record in records {
            match groups
                .iter_mut()
                .find(|group| group.records[0].source() == record.source())
            {
                Some(group) => group.records.push(record),
                None => groups.push(Batch {
                    id,
                    records: vec![record],
                    created_at,
                }),
            }
        }
        groups
    }

    /// Source of the first record (single-source batches only)
    pub fn source(&self) -> Option<&SourceId> {
        self.records.first().map(Record::source)
    }
}
