//! Hub error types

use contracts::ContractError;
use thiserror::Error;

/// Broadcast Hub errors
#[derive(Debug, Error)]
pub enum HubError {
    /// Subscriber cap reached, new connect refused
    #[error("too many subscribers: max_connections={max}")]
    TooManySubscribers { max: usize },

    /// The hub no longer accepts subscribers
    #[error("hub is closed")]
    Closed,

    /// Sink error (from contract)
    #[error("sink error: {0}")]
    Contract(#[from] ContractError),
}

impl From<HubError> for ContractError {
    fn from(err: HubError) -> Self {
        match err {
            HubError::TooManySubscribers { max } => ContractError::TooManySubscribers { max },
            HubError::Closed => ContractError::Other("hub is closed".into()),
            HubError::Contract(inner) => inner,
        }
    }
}
