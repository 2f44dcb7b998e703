//! Record-level processing errors
//!
//! These never escape the processor: each one drops a single record and
//! is counted.

use contracts::ContractError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProcessorError {
    /// Malformed record, dropped by validate
    #[error("invalid record from '{source_name}': {message}")]
    Validation {
        source_name: String,
        message: String,
    },

    /// A later stage failed on one record
    #[error("stage '{stage}' failed: {message}")]
    Stage {
        stage: &'static str,
        message: String,
    },
}

impl ProcessorError {
    pub fn validation(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            source_name: source_name.into(),
            message: message.into(),
        }
    }

    pub fn stage(stage: &'static str, message: impl Into<String>) -> Self {
        Self::Stage {
            stage,
            message: message.into(),
        }
    }
}

impl From<ProcessorError> for ContractError {
    fn from(err: ProcessorError) -> Self {
        match err {
            ProcessorError::Validation {
                source_name,
                message,
            } => ContractError::validation(source_name, message),
            ProcessorError::Stage { stage, message } => ContractError::processing(stage, message),
        }
    }
}
