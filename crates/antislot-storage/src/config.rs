//! Store configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;

use crate::error::{Result, StorageError};

/// Default data directory, relative to the working directory.
pub const DEFAULT_DATA_DIR: &str = "./data";

/// Blocklist file name inside the data directory.
pub const BLOCKLIST_FILE_NAME: &str = "blocklist.json";

/// Patterns file name inside the data directory.
pub const PATTERNS_FILE_NAME: &str = "patterns.json";

/// How long a loaded document is served from memory.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(5);

/// Where and how rulesets are persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub data_dir: PathBuf,
    pub blocklist_file: PathBuf,
    pub patterns_file: PathBuf,
    /// Bump the version on every mutation.
    pub auto_version_bump: bool,
    pub cache_ttl: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::in_dir(DEFAULT_DATA_DIR)
    }
}

impl StoreConfig {
    /// Places both files inside `dir`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref().to_path_buf();
        Self {
            blocklist_file: dir.join(BLOCKLIST_FILE_NAME),
            patterns_file: dir.join(PATTERNS_FILE_NAME),
            data_dir: dir,
            auto_version_bump: true,
            cache_ttl: DEFAULT_CACHE_TTL,
        }
    }

    /// Uses the platform application data directory.
    pub fn platform_default() -> Result<Self> {
        let dirs = ProjectDirs::from("com", "antislot", "antislot").ok_or_else(|| {
            StorageError::Config("Could not determine app data directory".into())
        })?;
        Ok(Self::in_dir(dirs.data_dir()))
    }

    /// Overrides the blocklist file path.
    pub fn with_blocklist_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.blocklist_file = path.into();
        self
    }

    /// Overrides the patterns file path.
    pub fn with_patterns_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.patterns_file = path.into();
        self
    }

    /// Enables or disables automatic version bumps.
    pub fn with_auto_version_bump(mut self, enabled: bool) -> Self {
        self.auto_version_bump = enabled;
        self
    }

    /// Sets the read cache TTL.
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }
}
