//! Core error types.

use thiserror::Error;

/// Errors produced by the core rule and signing logic.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A ruleset failed shape or invariant validation.
    #[error("Invalid ruleset: {0}")]
    InvalidRuleset(String),

    /// The HMAC key could not be used.
    #[error("Invalid signing key")]
    InvalidKey,

    /// JSON serialization error while canonicalizing a payload.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
