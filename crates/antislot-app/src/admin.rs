//! Blocklist administration: the out-of-band write path.

use std::fmt;

use antislot_core::matcher::{Decision, DomainMatcher};
use antislot_core::ruleset::Metadata;
use antislot_storage::RuleStore;
use chrono::DateTime;
use tracing::info;

use crate::error::Result;

/// Which documents a version bump applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BumpTarget {
    Blocklist,
    Patterns,
    #[default]
    Both,
}

/// Bumps the selected versions; returns `(document, new version)` pairs.
pub fn bump_versions(store: &RuleStore, target: BumpTarget) -> Result<Vec<(&'static str, u64)>> {
    let mut bumped = Vec::new();
    if matches!(target, BumpTarget::Blocklist | BumpTarget::Both) {
        bumped.push(("blocklist", store.blocklist.bump_version()?));
    }
    if matches!(target, BumpTarget::Patterns | BumpTarget::Both) {
        bumped.push(("patterns", store.patterns.bump_version()?));
    }
    Ok(bumped)
}

/// Versions and sizes of both documents.
#[derive(Debug, Clone, PartialEq)]
pub struct Stats {
    pub blocklist: Metadata,
    pub domain_count: usize,
    pub patterns: Metadata,
    pub pattern_count: usize,
}

impl Stats {
    /// Reads the current stats.
    pub fn collect(store: &RuleStore) -> Result<Self> {
        let rules = store.blocklist.load()?;
        let set = store.patterns.load()?;
        Ok(Self {
            blocklist: Metadata {
                version: rules.version,
                updated_at: rules.updated_at,
            },
            domain_count: rules.entries.len(),
            patterns: Metadata {
                version: set.version,
                updated_at: set.updated_at,
            },
            pattern_count: set.patterns.len(),
        })
    }
}

fn format_millis(ms: i64) -> String {
    DateTime::from_timestamp_millis(ms)
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| ms.to_string())
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "AntiSlot rule store")?;
        writeln!(f)?;
        writeln!(f, "Blocklist:")?;
        writeln!(f, "  Version: {}", self.blocklist.version)?;
        writeln!(f, "  Updated: {}", format_millis(self.blocklist.updated_at))?;
        writeln!(f, "  Domains: {}", self.domain_count)?;
        writeln!(f)?;
        writeln!(f, "Patterns:")?;
        writeln!(f, "  Version: {}", self.patterns.version)?;
        writeln!(f, "  Updated: {}", format_millis(self.patterns.updated_at))?;
        write!(f, "  Patterns: {}", self.pattern_count)
    }
}

/// Evaluates inputs against the server-side rulesets, as a device would
/// after a sync.
pub fn check_domains<S: AsRef<str>>(
    store: &RuleStore,
    inputs: &[S],
    allow_list: &[String],
) -> Result<Vec<Decision>> {
    let rules = store.blocklist.load()?;
    let patterns = store.patterns.load()?;
    let matcher = DomainMatcher::from_rulesets(&rules, &patterns);
    matcher.set_allow_list(allow_list);
    info!(rules = matcher.rule_count(), "Checking {} input(s)", inputs.len());

    Ok(inputs.iter().map(|i| matcher.evaluate(i.as_ref())).collect())
}
