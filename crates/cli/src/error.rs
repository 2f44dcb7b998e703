//! Error types for CLI operations.

use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Pipeline refused to start
    #[error("Pipeline failed to start: {0}")]
    Start(#[source] pipeline::PipelineError),

    /// Pipeline did not stop cleanly
    #[error("Error during shutdown: {0}")]
    Shutdown(#[source] pipeline::PipelineError),
}

impl CliError {
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }
}
