//! AntiSlot Core - rules, matching, scoring and signing.
//!
//! This crate holds the decision logic shared by the distribution server,
//! the administrative CLI and client devices:
//!
//! - [`ruleset`] - the versioned blocklist and pattern data model
//! - [`domain`] - hostname normalization helpers
//! - [`matcher`] - boolean "is this domain blocked?" engine with allow-list
//! - [`suggestor`] - heuristic scoring of unknown observed domains
//! - [`classifier`] - SMS spam classification (gambling, scam, advertisement)
//! - [`signature`] - HMAC signing, verification and ETag derivation
//! - [`snapshot`] - the signed wire representation of both rulesets
//!
//! # Example
//!
//! ```
//! use antislot_core::matcher::DomainMatcher;
//! use antislot_core::ruleset::Pattern;
//!
//! let matcher = DomainMatcher::new();
//! matcher.load(&[Pattern::exact("bet365.com"), Pattern::contains("casino", 0.8)]);
//!
//! assert!(matcher.is_blocked("https://www.BET365.com/sports"));
//! assert!(matcher.is_blocked("mycasinoworld.net"));
//! assert!(!matcher.is_blocked("example.org"));
//! ```

pub mod classifier;
pub mod domain;
pub mod error;
pub mod matcher;
pub mod ruleset;
pub mod signature;
pub mod snapshot;
pub mod suggestor;

pub use error::{CoreError, Result};
