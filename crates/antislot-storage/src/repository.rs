//! Repository traits over the two ruleset documents.
//!
//! Callers depend on these traits rather than on the file backend, so the
//! storage engine can change without touching the server or CLI.

use std::sync::Arc;

use antislot_core::domain::canonical_key;
use antislot_core::ruleset::{Metadata, Pattern, PatternKind, PatternSet, RuleSet};
use tracing::info;

use crate::config::StoreConfig;
use crate::error::{Result, StorageError};
use crate::file::{Change, JsonFileStore};

/// Default reason recorded for manual additions.
pub const DEFAULT_REASON: &str = "manual";

/// Persistence for the domain blocklist.
pub trait BlocklistRepository: Send + Sync {
    /// Returns the blocklist, creating defaults if none is stored.
    fn load(&self) -> Result<RuleSet>;

    /// Validates and atomically replaces the stored blocklist.
    fn save(&self, rules: &RuleSet) -> Result<()>;

    /// Adds a domain or updates its reason (and patterns, when given).
    ///
    /// Returns true if a new entry was created.
    fn add_domain(&self, domain: &str, reason: &str, patterns: Option<Vec<Pattern>>)
        -> Result<bool>;

    /// Removes a domain. Returns false, without touching the version, if absent.
    fn remove_domain(&self, domain: &str) -> Result<bool>;

    /// Sorted blocked domains.
    fn domains(&self) -> Result<Vec<String>> {
        Ok(self.load()?.domains())
    }

    /// Version and timestamp.
    fn metadata(&self) -> Result<Metadata> {
        use antislot_core::ruleset::Versioned;
        Ok(self.load()?.metadata())
    }

    /// Increments the version unconditionally.
    fn bump_version(&self) -> Result<u64>;

    /// Drops any cached copy.
    fn invalidate_cache(&self);
}

/// Persistence for the generic pattern list.
pub trait PatternRepository: Send + Sync {
    /// Returns the pattern set, creating defaults if none is stored.
    fn load(&self) -> Result<PatternSet>;

    /// Validates and atomically replaces the stored pattern set.
    fn save(&self, patterns: &PatternSet) -> Result<()>;

    /// Appends a pattern unless the same text and kind exist. Returns true if added.
    fn add_pattern(&self, pattern: Pattern) -> Result<bool>;

    /// Removes a pattern by text and kind. Returns false if absent.
    fn remove_pattern(&self, pattern: &str, kind: PatternKind) -> Result<bool>;

    /// Version and timestamp.
    fn metadata(&self) -> Result<Metadata> {
        use antislot_core::ruleset::Versioned;
        Ok(self.load()?.metadata())
    }

    /// Increments the version unconditionally.
    fn bump_version(&self) -> Result<u64>;

    /// Drops any cached copy.
    fn invalidate_cache(&self);
}

/// File-backed blocklist.
pub type BlocklistStore = JsonFileStore<RuleSet>;

/// File-backed pattern set.
pub type PatternStore = JsonFileStore<PatternSet>;

impl BlocklistRepository for BlocklistStore {
    fn load(&self) -> Result<RuleSet> {
        JsonFileStore::load(self)
    }

    fn save(&self, rules: &RuleSet) -> Result<()> {
        JsonFileStore::save(self, rules)
    }

    fn add_domain(
        &self,
        domain: &str,
        reason: &str,
        patterns: Option<Vec<Pattern>>,
    ) -> Result<bool> {
        let key = canonical_key(domain);
        if key.is_empty() {
            return Err(StorageError::Validation("domain must not be empty".into()));
        }
        let reason = if reason.trim().is_empty() {
            DEFAULT_REASON
        } else {
            reason
        };

        let created = self.update(|rules, now| {
            (rules.upsert(&key, reason, patterns, now), Change::Modified)
        })?;
        info!(domain = %key, created, "Domain added to blocklist");
        Ok(created)
    }

    fn remove_domain(&self, domain: &str) -> Result<bool> {
        let removed = self.update(|rules, _| {
            if rules.remove(domain) {
                (true, Change::Modified)
            } else {
                (false, Change::None)
            }
        })?;
        if removed {
            info!(domain = %canonical_key(domain), "Domain removed from blocklist");
        }
        Ok(removed)
    }

    fn bump_version(&self) -> Result<u64> {
        JsonFileStore::bump_version(self)
    }

    fn invalidate_cache(&self) {
        JsonFileStore::invalidate_cache(self)
    }
}

impl PatternRepository for PatternStore {
    fn load(&self) -> Result<PatternSet> {
        JsonFileStore::load(self)
    }

    fn save(&self, patterns: &PatternSet) -> Result<()> {
        JsonFileStore::save(self, patterns)
    }

    fn add_pattern(&self, pattern: Pattern) -> Result<bool> {
        if pattern.pattern.is_empty() {
            return Err(StorageError::Validation("pattern must not be empty".into()));
        }
        let label = pattern.label();
        let added = self.update(|set, _| {
            if set.insert(pattern) {
                (true, Change::Modified)
            } else {
                (false, Change::None)
            }
        })?;
        if added {
            info!(pattern = %label, "Pattern added");
        }
        Ok(added)
    }

    fn remove_pattern(&self, pattern: &str, kind: PatternKind) -> Result<bool> {
        let removed = self.update(|set, _| {
            if set.remove(pattern, kind) {
                (true, Change::Modified)
            } else {
                (false, Change::None)
            }
        })?;
        if removed {
            info!(pattern = %pattern, kind = %kind, "Pattern removed");
        }
        Ok(removed)
    }

    fn bump_version(&self) -> Result<u64> {
        JsonFileStore::bump_version(self)
    }

    fn invalidate_cache(&self) {
        JsonFileStore::invalidate_cache(self)
    }
}

/// Both repositories behind shared handles.
#[derive(Clone)]
pub struct RuleStore {
    pub blocklist: Arc<dyn BlocklistRepository>,
    pub patterns: Arc<dyn PatternRepository>,
}

impl RuleStore {
    /// Opens the file-backed stores described by `config`.
    pub fn open(config: &StoreConfig) -> Self {
        info!(
            blocklist = %config.blocklist_file.display(),
            patterns = %config.patterns_file.display(),
            "Opening rule store"
        );
        Self {
            blocklist: Arc::new(BlocklistStore::new(
                &config.blocklist_file,
                config.auto_version_bump,
                config.cache_ttl,
            )),
            patterns: Arc::new(PatternStore::new(
                &config.patterns_file,
                config.auto_version_bump,
                config.cache_ttl,
            )),
        }
    }

    /// Wraps custom repository implementations.
    pub fn with_repositories(
        blocklist: Arc<dyn BlocklistRepository>,
        patterns: Arc<dyn PatternRepository>,
    ) -> Self {
        Self {
            blocklist,
            patterns,
        }
    }

    /// Loads both documents, creating defaults where absent.
    pub fn initialize(&self) -> Result<()> {
        self.blocklist.load()?;
        self.patterns.load()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    fn open(dir: &TempDir) -> RuleStore {
        RuleStore::open(&StoreConfig::in_dir(dir.path()))
    }

    #[test]
    fn add_domain_derives_patterns_and_bumps() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir);

        assert!(store.blocklist.add_domain("Sports.Bet365.com", "", None).unwrap());
        let rules = store.blocklist.load().unwrap();
        assert_eq!(rules.version, 2);
        let entry = rules.entry("sports.bet365.com").unwrap();
        assert_eq!(entry.reason, DEFAULT_REASON);
        assert_eq!(entry.patterns.len(), 2);
        assert_eq!(entry.patterns[1].pattern, "bet365.com");
    }

    #[test]
    fn add_existing_domain_updates_in_place() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir);

        store.blocklist.add_domain("bet365.com", "first", None).unwrap();
        let created = store.blocklist.add_domain("BET365.com", "second", None).unwrap();
        assert!(!created);

        let rules = store.blocklist.load().unwrap();
        assert_eq!(store.blocklist.domains().unwrap(), vec!["bet365.com"]);
        assert_eq!(rules.entries[0].reason, "second");
        assert_eq!(rules.version, 3);
    }

    #[test]
    fn remove_absent_domain_is_noop() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir);
        store.blocklist.add_domain("bet365.com", "x", None).unwrap();
        let before = store.blocklist.metadata().unwrap();

        assert!(!store.blocklist.remove_domain("nothere.com").unwrap());
        store.blocklist.invalidate_cache();
        assert_eq!(store.blocklist.metadata().unwrap(), before);

        assert!(store.blocklist.remove_domain(" BET365.COM ").unwrap());
        assert!(store.blocklist.domains().unwrap().is_empty());
        assert_eq!(store.blocklist.metadata().unwrap().version, before.version + 1);
    }

    #[test]
    fn disabled_auto_bump_keeps_version() {
        let dir = TempDir::new().unwrap();
        let store = RuleStore::open(
            &StoreConfig::in_dir(dir.path()).with_auto_version_bump(false),
        );
        store.blocklist.add_domain("bet365.com", "x", None).unwrap();
        assert_eq!(store.blocklist.metadata().unwrap().version, 1);
        assert_eq!(store.blocklist.bump_version().unwrap(), 2);
    }

    #[test]
    fn empty_domain_is_rejected() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir);
        assert!(matches!(
            store.blocklist.add_domain("   ", "x", None),
            Err(StorageError::Validation(_))
        ));
    }

    #[test]
    fn default_patterns_on_first_run() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir);
        store.initialize().unwrap();
        let set = store.patterns.load().unwrap();
        assert_eq!(set.version, 1);
        assert_eq!(set.patterns.len(), 7);
        assert!(dir.path().join("patterns.json").exists());
        assert!(dir.path().join("blocklist.json").exists());
    }

    #[test]
    fn pattern_add_and_remove() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir);

        assert!(!store.patterns.add_pattern(Pattern::contains("casino", 0.8)).unwrap());
        assert_eq!(store.patterns.metadata().unwrap().version, 1);

        assert!(store.patterns.add_pattern(Pattern::contains("rulet", 0.6)).unwrap());
        assert_eq!(store.patterns.metadata().unwrap().version, 2);

        assert!(store.patterns.remove_pattern("rulet", PatternKind::Contains).unwrap());
        assert!(!store.patterns.remove_pattern("rulet", PatternKind::Contains).unwrap());
        assert_eq!(store.patterns.metadata().unwrap().version, 3);
    }

    #[test]
    fn concurrent_adds_are_serialized() {
        let dir = TempDir::new().unwrap();
        let store = RuleStore::open(
            &StoreConfig::in_dir(dir.path()).with_cache_ttl(Duration::ZERO),
        );
        store.initialize().unwrap();

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let repo = Arc::clone(&store.blocklist);
                std::thread::spawn(move || {
                    repo.add_domain(&format!("site{i}.bet"), "load test", None).unwrap();
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let rules = store.blocklist.load().unwrap();
        assert_eq!(rules.entries.len(), 8);
        assert_eq!(rules.version, 9);
    }
}
