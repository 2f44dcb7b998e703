//! Source Connectors
//!
//! A closed set of connector variants behind one capability: `fetch()`
//! yields zero or more `Record`s per activation, tagged with the source
//! name. Dispatch is by `SourceKind`, never by probing the connector.

mod api;
mod db;
mod file;
mod iot;
mod synthetic;

pub use api::ApiConnector;
pub use db::DbConnector;
pub use file::FileConnector;
pub use iot::IotConnector;
pub use synthetic::{Profile, SyntheticConnector};

use contracts::{Record, SourceConfig, SourceId, SourceKind};
use serde_json::Value;

use crate::error::Result;

/// One live connector
#[derive(Debug)]
pub enum SourceConnector {
    Api(ApiConnector),
    Db(DbConnector),
    File(FileConnector),
    Iot(IotConnector),
    Synthetic(SyntheticConnector),
}

impl SourceConnector {
    /// Build the connector for `config`
    ///
    /// Network listeners are bound here; polling connectors defer all I/O
    /// to `fetch`.
    pub async fn connect(config: &SourceConfig) -> Result<Self> {
        Ok(match config.kind {
            SourceKind::Api => Self::Api(ApiConnector::new(config)?),
            SourceKind::Db => Self::Db(DbConnector::new(config).await?),
            SourceKind::File => Self::File(FileConnector::new(config).await?),
            SourceKind::Iot => Self::Iot(IotConnector::bind(config).await?),
            SourceKind::Synthetic => Self::Synthetic(SyntheticConnector::new(config)),
        })
    }

    pub fn kind(&self) -> SourceKind {
        match self {
            Self::Api(_) => SourceKind::Api,
            Self::Db(_) => SourceKind::Db,
            Self::File(_) => SourceKind::File,
            Self::Iot(_) => SourceKind::Iot,
            Self::Synthetic(_) => SourceKind::Synthetic,
        }
    }

    /// Push-style connectors deliver as data arrives instead of on a timer
    pub fn is_push(&self) -> bool {
        matches!(self, Self::Iot(_))
    }

    /// One activation
    pub async fn fetch(&mut self) -> Result<Vec<Record>> {
        match self {
            Self::Api(c) => c.fetch().await,
            Self::Db(c) => c.fetch().await,
            Self::File(c) => c.fetch().await,
            Self::Iot(c) => c.fetch().await,
            Self::Synthetic(c) => Ok(c.fetch()),
        }
    }
}

/// Shared record shaping: source tag plus optional key field
#[derive(Debug, Clone)]
pub(crate) struct RecordShape {
    source: SourceId,
    kind: SourceKind,
    key_field: Option<String>,
}

impl RecordShape {
    pub(crate) fn new(config: &SourceConfig) -> Self {
        Self {
            source: SourceId::from(config.name.as_str()),
            kind: config.kind,
            key_field: config.params.get("key_field").cloned(),
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.source
    }

    pub(crate) fn record(&self, payload: Value) -> Record {
        let key = self.key_field.as_deref().and_then(|field| match payload.get(field) {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        });
        let record = Record::new(self.source.clone(), self.kind, payload);
        match key {
            Some(key) => record.with_key(key),
            None => record,
        }
    }

    /// A JSON array becomes one record per element
    pub(crate) fn records(&self, payload: Value) -> Vec<Record> {
        match payload {
            Value::Array(items) => items.into_iter().map(|v| self.record(v)).collect(),
            other => vec![self.record(other)],
        }
    }

    /// Newline-delimited text: JSON lines become structured records,
    /// anything else is kept verbatim for validation to reject
    pub(crate) fn lines(&self, text: &str) -> Vec<Record> {
        text.lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(|line| match serde_json::from_str::<Value>(line) {
                Ok(value) => self.record(value),
                Err(_) => self.record(Value::String(line.to_string())),
            })
            .collect()
    }
}
