//! Error types for chat-store.

use std::path::PathBuf;

use chat_client::StoreError;
use chat_types::ChatError;

/// Storage layer errors.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Database error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A stored row does not decode into a valid message.
    #[error("corrupt row at seq {seq}: {reason}")]
    Corrupt {
        /// Sequence number of the row.
        seq: i64,
        /// What is wrong with it.
        reason: String,
    },

    /// Collection name rejected.
    #[error("invalid collection: {0}")]
    Collection(#[from] ChatError),

    /// Database path error.
    #[error("invalid database path: {path}")]
    InvalidPath {
        /// The invalid path.
        path: PathBuf,
    },
}

/// Result type alias for storage operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;

impl From<StorageError> for StoreError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Corrupt { .. } => StoreError::Corrupt(err.to_string()),
            other => StoreError::Unavailable(other.to_string()),
        }
    }
}
