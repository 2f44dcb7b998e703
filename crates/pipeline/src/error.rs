//! Controller errors

use contracts::{ContractError, PipelineState};
use hub::HubError;
use thiserror::Error;

/// Errors returned synchronously by control operations
///
/// Record- and batch-level failures never surface here; they are counted
/// and published as alerts instead.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// `start` while not stopped
    #[error("pipeline is already running (state: {state})")]
    AlreadyRunning { state: PipelineState },

    /// `stop` while not running
    #[error("pipeline is not running (state: {state})")]
    NotRunning { state: PipelineState },

    /// Fatal configuration problem, rejected at `start`/`add_source`
    #[error("invalid configuration: {0}")]
    Config(#[source] ContractError),

    #[error("source '{name}' is already registered")]
    DuplicateSource { name: String },

    #[error("unknown source '{name}'")]
    UnknownSource { name: String },

    #[error(transparent)]
    Hub(#[from] HubError),
}

impl PipelineError {
    pub fn no_sources() -> Self {
        Self::Config(ContractError::config_validation(
            "sources",
            "no sources registered",
        ))
    }
}

impl From<PipelineError> for ContractError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::AlreadyRunning { state } => ContractError::AlreadyRunning {
                state: state.to_string(),
            },
            PipelineError::NotRunning { state } => ContractError::NotRunning {
                state: state.to_string(),
            },
            PipelineError::Config(inner) => inner,
            PipelineError::DuplicateSource { name } => ContractError::DuplicateSource { name },
            PipelineError::UnknownSource { name } => ContractError::UnknownSource { name },
            PipelineError::Hub(inner) => inner.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
