//! AntiSlot administrative operations.
//!
//! The `antislot` binary wraps these in its subcommands:
//!
//! - [`admin`] - version bumps, store statistics and server-side domain checks
//! - [`suggest`] - the observed-domain suggestion pipeline and its integration step
//!
//! Every mutation goes through [`antislot_storage::RuleStore`]; the HTTP API
//! stays read-only.

pub mod admin;
pub mod error;
pub mod suggest;

pub use admin::{bump_versions, check_domains, BumpTarget, Stats};
pub use error::{AppError, Result};
pub use suggest::{
    integrate, run_suggest, IntegrationSummary, ReportFiles, SuggestionReport, SuggestionSummary,
    DEFAULT_INTEGRATE_CONFIDENCE,
};
