//! AntiSlot Storage - versioned JSON file persistence.
//!
//! This crate keeps the two ruleset documents on disk:
//!
//! - `blocklist.json` - blocked domains and their derived rules
//! - `patterns.json` - generic contains/regex patterns
//!
//! Writes are atomic (temp file then rename), every mutation bumps the
//! version unless disabled, and reads are served from a short-TTL cache.
//!
//! # Example
//!
//! ```no_run
//! use antislot_storage::{RuleStore, StoreConfig};
//!
//! let store = RuleStore::open(&StoreConfig::in_dir("./data"));
//! store.blocklist.add_domain("bet365.com", "manual", None).unwrap();
//! println!("version {}", store.blocklist.metadata().unwrap().version);
//! ```

pub mod config;
pub mod error;
mod file;
pub mod repository;

pub use config::StoreConfig;
pub use error::{Result, StorageError};
pub use file::{atomic_write, JsonFileStore};
pub use repository::{
    BlocklistRepository, BlocklistStore, PatternRepository, PatternStore, RuleStore,
    DEFAULT_REASON,
};
