//! Storage error types.

use antislot_core::CoreError;
use thiserror::Error;

/// Errors that can occur in storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// IO error (reading, writing or renaming a ruleset file).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A stored or supplied document is malformed. Never auto-corrected.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The on-disk version moved since it was read.
    #[error("Version conflict: expected {expected}, found {found}")]
    VersionConflict { expected: u64, found: u64 },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<CoreError> for StorageError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Json(e) => StorageError::Json(e),
            other => StorageError::Validation(other.to_string()),
        }
    }
}

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;
