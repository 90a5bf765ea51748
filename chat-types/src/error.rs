//! Error types for friendlychat.

use thiserror::Error;

/// Errors raised while validating or parsing chat values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChatError {
    /// Message violates the text/image discriminant or has no sender.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// Sequence key could not be parsed.
    #[error("invalid sequence key: {0:?}")]
    InvalidKey(String),

    /// Collection identifier is empty or malformed.
    #[error("invalid collection id: {0:?}")]
    InvalidCollection(String),
}
