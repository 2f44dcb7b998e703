//! File/log tail connector
//!
//! Reads whatever was appended since the previous activation. A trailing
//! partial line is held back until its newline arrives; a file that shrank
//! is treated as truncated/rotated and re-read from the start.
//! Params: `start` (`beginning` or `end`, default `beginning`),
//! `max_read` (bytes per activation, default 1 MiB), `key_field`.

use std::io::SeekFrom;
use std::path::PathBuf;

use bytes::{Buf, BytesMut};
use contracts::{Record, SourceConfig};
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::{debug, trace};

use super::RecordShape;
use crate::error::{IngestionError, Result};

#[derive(Debug)]
pub struct FileConnector {
    shape: RecordShape,
    path: PathBuf,
    offset: u64,
    max_read: u64,
    partial: BytesMut,
}

impl FileConnector {
    pub async fn new(config: &SourceConfig) -> Result<Self> {
        let path = PathBuf::from(&config.target);
        let offset = if config.params.get("start").map(String::as_str) == Some("end") {
            tokio::fs::metadata(&path)
                .await
                .map(|m| m.len())
                .map_err(|e| IngestionError::io(&config.name, e))?
        } else {
            0
        };

        Ok(Self {
            shape: RecordShape::new(config),
            path,
            offset,
            max_read: config.param_or("max_read", 1u64 << 20).max(1),
            partial: BytesMut::new(),
        })
    }

    pub async fn fetch(&mut self) -> Result<Vec<Record>> {
        let name = self.shape.name();
        let mut file = tokio::fs::File::open(&self.path)
            .await
            .map_err(|e| IngestionError::io(name, e))?;
        let len = file
            .metadata()
            .await
            .map_err(|e| IngestionError::io(name, e))?
            .len();

        if len < self.offset {
            debug!(source = %name, previous = self.offset, len, "file truncated, rereading from start");
            self.offset = 0;
            self.partial.clear();
        }
        if len == self.offset {
            return Ok(Vec::new());
        }

        file.seek(SeekFrom::Start(self.offset))
            .await
            .map_err(|e| IngestionError::io(name, e))?;
        let mut chunk = Vec::new();
        let read = file
            .take(self.max_read)
            .read_to_end(&mut chunk)
            .await
            .map_err(|e| IngestionError::io(name, e))?;
        self.offset += read as u64;
        self.partial.extend_from_slice(&chunk);

        // Only complete lines are consumed
        let Some(last_newline) = self.partial.iter().rposition(|&b| b == b'\n') else {
            return Ok(Vec::new());
        };
        let complete = self.partial.split_to(last_newline + 1);
        let text = String::from_utf8_lossy(complete.chunk());
        let records = self.shape.lines(&text);

        trace!(source = %name, offset = self.offset, count = records.len(), "file tail");
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::SourceKind;
    use std::io::Write;

    fn connector_config(path: &std::path::Path) -> SourceConfig {
        SourceConfig::new("tail", SourceKind::File, path.to_string_lossy())
    }

    #[tokio::test]
    async fn test_tail_appends_and_partial_lines() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let mut connector = FileConnector::new(&connector_config(file.path()))
            .await
            .unwrap();

        write!(file, "{{\"value\": 1}}\n{{\"val").unwrap();
        file.flush().unwrap();
        let records = connector.fetch().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].payload()["value"], 1);

        write!(file, "ue\": 2}}\n").unwrap();
        file.flush().unwrap();
        let records = connector.fetch().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].payload()["value"], 2);

        assert!(connector.fetch().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_truncation_rereads() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{{\"value\": 1}}").unwrap();
        writeln!(file, "{{\"value\": 2}}").unwrap();
        file.flush().unwrap();

        let mut connector = FileConnector::new(&connector_config(file.path()))
            .await
            .unwrap();
        assert_eq!(connector.fetch().await.unwrap().len(), 2);

        file.as_file().set_len(0).unwrap();
        let mut handle = file.reopen().unwrap();
        writeln!(handle, "{{\"value\": 9}}").unwrap();
        handle.flush().unwrap();

        let records = connector.fetch().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].payload()["value"], 9);
    }

    #[tokio::test]
    async fn test_start_at_end_skips_existing() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{{\"value\": 1}}").unwrap();
        file.flush().unwrap();

        let config = connector_config(file.path()).with_param("start", "end");
        let mut connector = FileConnector::new(&config).await.unwrap();
        assert!(connector.fetch().await.unwrap().is_empty());

        writeln!(file, "{{\"value\": 2}}").unwrap();
        file.flush().unwrap();
        assert_eq!(connector.fetch().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = connector_config(&dir.path().join("absent.log"));
        let mut connector = FileConnector::new(&config).await.unwrap();
        assert!(matches!(
            connector.fetch().await,
            Err(IngestionError::Io { .. })
        ));
    }
}
