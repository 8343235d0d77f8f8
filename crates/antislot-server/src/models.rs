//! API response models.
//!
//! The snapshot bodies live in `antislot_core::snapshot` so clients can share
//! them; only server-specific shapes are defined here.

use serde::{Deserialize, Serialize};

/// Response body for GET /v1/health.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Always "ok" when the stores are readable.
    pub status: String,
    /// Server time (epoch ms).
    pub timestamp: i64,
    /// Server build version.
    pub version: String,
    pub blocklist_version: u64,
    pub blocklist_count: usize,
    pub patterns_version: u64,
    pub patterns_count: usize,
}
