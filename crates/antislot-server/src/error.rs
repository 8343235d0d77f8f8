//! API error types.
//!
//! Codes describe what a syncing device can do about the failure: an
//! unavailable ruleset is worth retrying, an invalid one or a signing fault
//! needs an operator.

use antislot_core::CoreError;
use antislot_storage::StorageError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// Ruleset documents served by the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Document {
    Blocklist,
    Patterns,
}

impl Document {
    pub fn as_str(self) -> &'static str {
        match self {
            Document::Blocklist => "blocklist",
            Document::Patterns => "patterns",
        }
    }
}

impl std::fmt::Display for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// API errors.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The document could not be read right now (IO, concurrent writer).
    #[error("{document} unavailable: {source}")]
    RulesetUnavailable {
        document: Document,
        #[source]
        source: StorageError,
    },

    /// The stored document is malformed and will not be served.
    #[error("{document} is invalid: {source}")]
    RulesetInvalid {
        document: Document,
        #[source]
        source: StorageError,
    },

    /// The snapshot could not be signed.
    #[error("failed to sign {document}: {source}")]
    SigningFailed {
        document: Document,
        #[source]
        source: CoreError,
    },

    /// No route for this path.
    #[error("no such endpoint: {0}")]
    UnknownRoute(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Classifies a store failure while reading `document`.
    pub fn storage(document: Document, source: StorageError) -> Self {
        match source {
            StorageError::Json(_) | StorageError::Validation(_) => {
                ApiError::RulesetInvalid { document, source }
            }
            StorageError::Io(_) | StorageError::VersionConflict { .. } | StorageError::Config(_) => {
                ApiError::RulesetUnavailable { document, source }
            }
        }
    }

    /// Wraps a signing failure for `document`.
    pub fn signing(document: Document, source: CoreError) -> Self {
        ApiError::SigningFailed { document, source }
    }

    /// HTTP status and machine-readable code.
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::RulesetUnavailable { .. } => {
                (StatusCode::SERVICE_UNAVAILABLE, "ruleset_unavailable")
            }
            ApiError::RulesetInvalid { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "ruleset_invalid"),
            ApiError::SigningFailed { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "signing_failed"),
            ApiError::UnknownRoute(_) => (StatusCode::NOT_FOUND, "unknown_route"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        }
    }
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        if status.is_server_error() {
            error!(code, "{}", self);
        }

        let body = ErrorResponse {
            error: self.to_string(),
            code: code.to_string(),
        };

        (status, axum::Json(body)).into_response()
    }
}

/// Result type for API operations.
pub type Result<T> = std::result::Result<T, ApiError>;
