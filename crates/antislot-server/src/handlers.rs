//! API route handlers.
//!
//! Store reads hit the filesystem, so they run on the blocking pool rather
//! than on a runtime worker.

use axum::extract::State;
use axum::http::{header, Uri};
use axum::response::IntoResponse;
use axum::Json;
use tracing::debug;

use antislot_core::ruleset::now_millis;
use antislot_core::snapshot::{BlocklistSnapshot, PatternsSnapshot};

use crate::error::{ApiError, Document, Result};
use crate::models::HealthResponse;
use crate::state::AppState;

async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ApiError::Internal(format!("blocking task failed: {e}")))?
}

/// GET /v1/health - Versions and counts of both rulesets.
pub async fn health(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let store = state.store.clone();
    let (rules, patterns) = blocking(move || {
        let rules = store
            .blocklist
            .load()
            .map_err(|e| ApiError::storage(Document::Blocklist, e))?;
        let patterns = store
            .patterns
            .load()
            .map_err(|e| ApiError::storage(Document::Patterns, e))?;
        Ok((rules, patterns))
    })
    .await?;

    let body = HealthResponse {
        status: "ok".to_string(),
        timestamp: now_millis(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        blocklist_version: rules.version,
        blocklist_count: rules.entries.len(),
        patterns_version: patterns.version,
        patterns_count: patterns.patterns.len(),
    };

    Ok((
        [(header::CACHE_CONTROL, state.cache_control.health.clone())],
        Json(body),
    ))
}

/// GET /v1/blocklist - Signed blocklist snapshot.
pub async fn get_blocklist(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let store = state.store.clone();
    let signer = state.signer.clone();
    let snapshot = blocking(move || {
        let rules = store
            .blocklist
            .load()
            .map_err(|e| ApiError::storage(Document::Blocklist, e))?;
        BlocklistSnapshot::sign(&rules, &signer).map_err(|e| ApiError::signing(Document::Blocklist, e))
    })
    .await?;
    debug!(
        version = snapshot.version,
        domains = snapshot.domains.len(),
        "Serving blocklist"
    );

    Ok((
        [(header::CACHE_CONTROL, state.cache_control.blocklist.clone())],
        Json(snapshot),
    ))
}

/// GET /v1/patterns - Signed pattern snapshot.
pub async fn get_patterns(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let store = state.store.clone();
    let signer = state.signer.clone();
    let snapshot = blocking(move || {
        let set = store
            .patterns
            .load()
            .map_err(|e| ApiError::storage(Document::Patterns, e))?;
        PatternsSnapshot::sign(&set, &signer).map_err(|e| ApiError::signing(Document::Patterns, e))
    })
    .await?;
    debug!(
        version = snapshot.version,
        patterns = snapshot.patterns.len(),
        "Serving patterns"
    );

    Ok((
        [(header::CACHE_CONTROL, state.cache_control.patterns.clone())],
        Json(snapshot),
    ))
}

/// Fallback for paths outside the API.
pub async fn unknown_route(uri: Uri) -> ApiError {
    ApiError::UnknownRoute(uri.path().to_string())
}
