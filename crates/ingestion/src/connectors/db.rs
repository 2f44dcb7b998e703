//! SQLite change-feed connector
//!
//! Polls a change table (param `table`, default `changes`) for rows with a
//! `rowid` above the last one seen. Each row becomes one record whose
//! payload maps column names to values. Params: `start` (`beginning` or
//! `latest`, default `beginning`), `batch_limit` (default 500), `key_field`.

use std::path::PathBuf;

use contracts::{is_identifier, Record, SourceConfig};
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags};
use serde_json::{Map, Number, Value};
use tracing::{debug, trace};

use super::RecordShape;
use crate::error::{IngestionError, Result};

#[derive(Debug)]
pub struct DbConnector {
    shape: RecordShape,
    path: PathBuf,
    table: String,
    limit: usize,
    /// Highest rowid delivered
    cursor: i64,
}

impl DbConnector {
    pub async fn new(config: &SourceConfig) -> Result<Self> {
        let table = config
            .params
            .get("table")
            .cloned()
            .unwrap_or_else(|| "changes".to_string());
        if !is_identifier(&table) {
            return Err(IngestionError::connect(
                &config.name,
                format!("'{table}' is not a valid table name"),
            ));
        }

        let mut connector = Self {
            shape: RecordShape::new(config),
            path: PathBuf::from(&config.target),
            table,
            limit: config.param_or("batch_limit", 500usize).max(1),
            cursor: 0,
        };

        if config.params.get("start").map(String::as_str) == Some("latest") {
            let path = connector.path.clone();
            let sql = format!("SELECT COALESCE(MAX(rowid), 0) FROM {}", connector.table);
            let name = config.name.clone();
            connector.cursor = tokio::task::spawn_blocking(move || -> Result<i64> {
                let conn = open(&path).map_err(|e| IngestionError::connect(&name, e))?;
                conn.query_row(&sql, [], |row| row.get(0))
                    .map_err(|e| IngestionError::connect(&name, e))
            })
            .await
            .map_err(|e| IngestionError::connect(&config.name, e))??;
            debug!(source = %config.name, cursor = connector.cursor, "db feed starting at latest row");
        }

        Ok(connector)
    }

    pub async fn fetch(&mut self) -> Result<Vec<Record>> {
        let name = self.shape.name().to_string();
        let path = self.path.clone();
        let sql = format!(
            "SELECT rowid AS _rowid, * FROM {} WHERE rowid > ?1 ORDER BY rowid LIMIT ?2",
            self.table
        );
        let cursor = self.cursor;
        let limit = self.limit as i64;

        let task_name = name.clone();
        let rows = tokio::task::spawn_blocking(move || query_rows(&path, &sql, cursor, limit))
            .await
            .map_err(|e| IngestionError::fetch(&name, e))?
            .map_err(|e| IngestionError::fetch(&task_name, e))?;

        let mut records = Vec::with_capacity(rows.len());
        for (rowid, payload) in rows {
            self.cursor = self.cursor.max(rowid);
            let record = self.shape.record(Value::Object(payload));
            records.push(match record.key() {
                Some(_) => record,
                None => record.with_key(rowid.to_string()),
            });
        }
        trace!(source = %name, cursor = self.cursor, count = records.len(), "db poll");
        Ok(records)
    }
}

fn open(path: &PathBuf) -> rusqlite::Result<Connection> {
    Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
}

fn query_rows(
    path: &PathBuf,
    sql: &str,
    cursor: i64,
    limit: i64,
) -> rusqlite::Result<Vec<(i64, Map<String, Value>)>> {
    let conn = open(path)?;
    let mut stmt = conn.prepare(sql)?;
    let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

    let rows = stmt.query_map([cursor, limit], |row| {
        let rowid: i64 = row.get(0)?;
        let mut payload = Map::new();
        for (idx, column) in columns.iter().enumerate().skip(1) {
            payload.insert(column.clone(), to_json(row.get_ref(idx)?));
        }
        Ok((rowid, payload))
    })?;

    rows.collect()
}

fn to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => Number::from_f64(f).map_or(Value::Null, Value::Number),
        ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::String(String::from_utf8_lossy(b).into_owned()),
    }
}
