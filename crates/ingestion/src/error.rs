//! Ingestion 错误类型

use contracts::ContractError;
use thiserror::Error;

/// Ingestion error
#[derive(Debug, Error)]
pub enum IngestionError {
    /// Could not open/bind/build the connector
    #[error("source '{source_name}' connect failed: {message}")]
    Connect {
        source_name: String,
        message: String,
    },

    /// One activation failed (network, query, read)
    #[error("source '{source_name}' fetch failed: {message}")]
    Fetch {
        source_name: String,
        message: String,
    },

    /// Source payload could not be decoded
    #[error("source '{source_name}' returned undecodable data: {message}")]
    Parse {
        source_name: String,
        message: String,
    },

    #[error("source '{source_name}' io error: {source}")]
    Io {
        source_name: String,
        #[source]
        source: std::io::Error,
    },

    /// The Ingestion Buffer was closed by `stop`
    #[error("ingestion buffer is closed")]
    BufferClosed,
}

impl IngestionError {
    pub fn connect(source_name: impl Into<String>, message: impl ToString) -> Self {
        Self::Connect {
            source_name: source_name.into(),
            message: message.to_string(),
        }
    }

    pub fn fetch(source_name: impl Into<String>, message: impl ToString) -> Self {
        Self::Fetch {
            source_name: source_name.into(),
            message: message.to_string(),
        }
    }

    pub fn parse(source_name: impl Into<String>, message: impl ToString) -> Self {
        Self::Parse {
            source_name: source_name.into(),
            message: message.to_string(),
        }
    }

    pub fn io(source_name: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            source_name: source_name.into(),
            source,
        }
    }

    /// The connector must be rebuilt before the next activation
    pub fn needs_reconnect(&self) -> bool {
        matches!(self, Self::Connect { .. })
    }
}

impl From<IngestionError> for ContractError {
    fn from(err: IngestionError) -> Self {
        match err {
            IngestionError::Connect {
                source_name,
                message,
            }
            | IngestionError::Fetch {
                source_name,
                message,
            }
            | IngestionError::Parse {
                source_name,
                message,
            } => ContractError::source(source_name, message),
            IngestionError::Io { source_name, source } => {
                ContractError::source(source_name, source.to_string())
            }
            IngestionError::BufferClosed => {
                ContractError::Other("ingestion buffer is closed".to_string())
            }
        }
    }
}

/// Ingestion Result alias
pub type Result<T> = std::result::Result<T, IngestionError>;
