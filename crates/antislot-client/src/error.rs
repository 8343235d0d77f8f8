//! Sync error types.

use thiserror::Error;

/// Errors from configuring or running a ruleset sync.
///
/// Every variant leaves the previously verified ruleset in force.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The API URL could not be parsed or uses an unsupported scheme.
    #[error("Invalid API URL: {0}")]
    InvalidUrl(String),

    /// Plain HTTP to a non-local host.
    #[error("HTTPS is required for {0}")]
    InsecureUrl(String),

    /// Transport failure or non-success status.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server did not answer within the configured timeout.
    #[error("Request timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// The response body does not have the snapshot shape.
    #[error("Malformed response: {0}")]
    Malformed(String),

    /// A snapshot signature did not verify.
    #[error("Integrity error: {0}")]
    Integrity(&'static str),

    /// No signing secret was configured.
    #[error("No HMAC secret configured")]
    MissingSecret,

    /// Local state could not be read or written.
    #[error("Storage error: {0}")]
    Storage(#[from] antislot_storage::StorageError),
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, SyncError>;
