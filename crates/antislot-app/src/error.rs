//! Errors from the administrative commands.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while running an administrative command.
#[derive(Debug, Error)]
pub enum AppError {
    /// Rule store error.
    #[error("Storage error: {0}")]
    Storage(#[from] antislot_storage::StorageError),

    /// IO error reading an input file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error in a suggestions file.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV export error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// The input file held no usable domains.
    #[error("No valid domains found in {0}")]
    NoDomains(PathBuf),
}

/// Result type for administrative commands.
pub type Result<T> = std::result::Result<T, AppError>;
