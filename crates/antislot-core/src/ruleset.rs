//! Versioned ruleset data model.
//!
//! Two documents are persisted and distributed:
//!
//! - [`RuleSet`] - the domain blocklist, one [`BlocklistEntry`] per root domain
//! - [`PatternSet`] - a flat list of generic [`Pattern`] rules
//!
//! Both carry a monotonic `version` and an `updatedAt` epoch-millisecond
//! timestamp and implement [`Versioned`] so storage can treat them uniformly.

use std::collections::HashSet;
use std::fmt;

use chrono::Utc;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::domain::{canonical_key, root_domain};
use crate::error::{CoreError, Result};

/// Weight of the exact rule derived for a new blocklist entry.
pub const EXACT_RULE_WEIGHT: f64 = 1.0;

/// Weight of the subdomain rule derived for a new blocklist entry.
pub const SUBDOMAIN_RULE_WEIGHT: f64 = 0.9;

/// Current time as epoch milliseconds.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// How a [`Pattern`] is matched against a domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternKind {
    /// The domain equals the pattern.
    Exact,
    /// The domain equals the pattern or ends with `.` + pattern.
    Subdomain,
    /// The pattern is a substring of the domain.
    Contains,
    /// The pattern is a case-insensitive regular expression.
    Regex,
}

impl PatternKind {
    /// Returns all pattern kinds.
    pub fn all() -> &'static [PatternKind] {
        &[
            PatternKind::Exact,
            PatternKind::Subdomain,
            PatternKind::Contains,
            PatternKind::Regex,
        ]
    }

    /// Returns the wire name of this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            PatternKind::Exact => "exact",
            PatternKind::Subdomain => "subdomain",
            PatternKind::Contains => "contains",
            PatternKind::Regex => "regex",
        }
    }

    /// Parses a wire name.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "exact" => Some(PatternKind::Exact),
            "subdomain" => Some(PatternKind::Subdomain),
            "contains" => Some(PatternKind::Contains),
            "regex" => Some(PatternKind::Regex),
            _ => None,
        }
    }
}

impl fmt::Display for PatternKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An atomic matching rule.
///
/// `weight` is only consulted by scorers; the boolean matcher treats any hit
/// as blocking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pattern {
    /// Pattern text (domain, substring or regex source).
    pub pattern: String,
    /// Match strategy.
    #[serde(rename = "type")]
    pub kind: PatternKind,
    /// Rule confidence in `[0, 1]`.
    pub weight: f64,
}

impl Pattern {
    /// Creates a pattern, trimming the text and clamping the weight to `[0, 1]`.
    pub fn new(pattern: impl Into<String>, kind: PatternKind, weight: f64) -> Self {
        let weight = if weight.is_finite() {
            weight.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self {
            pattern: pattern.into().trim().to_string(),
            kind,
            weight,
        }
    }

    /// Creates an exact rule with full weight.
    pub fn exact(domain: impl Into<String>) -> Self {
        Self::new(domain, PatternKind::Exact, EXACT_RULE_WEIGHT)
    }

    /// Creates a subdomain rule.
    pub fn subdomain(domain: impl Into<String>, weight: f64) -> Self {
        Self::new(domain, PatternKind::Subdomain, weight)
    }

    /// Creates a contains rule.
    pub fn contains(needle: impl Into<String>, weight: f64) -> Self {
        Self::new(needle, PatternKind::Contains, weight)
    }

    /// Creates a regex rule.
    pub fn regex(source: impl Into<String>, weight: f64) -> Self {
        Self::new(source, PatternKind::Regex, weight)
    }

    /// Returns true if `other` has the same text and kind.
    pub fn same_rule(&self, other: &Pattern) -> bool {
        self.kind == other.kind && self.pattern == other.pattern
    }

    /// Label used in match reports, e.g. `contains:casino`.
    pub fn label(&self) -> String {
        format!("{}:{}", self.kind, self.pattern)
    }

    fn validate(&self) -> Result<()> {
        if self.pattern.is_empty() {
            return Err(CoreError::InvalidRuleset("empty pattern".into()));
        }
        if !self.weight.is_finite() || !(0.0..=1.0).contains(&self.weight) {
            return Err(CoreError::InvalidRuleset(format!(
                "pattern '{}' has weight {} outside [0, 1]",
                self.pattern, self.weight
            )));
        }
        Ok(())
    }
}

/// Derives the default rules for a blocked domain.
///
/// Always an exact rule for the domain itself, plus a subdomain rule for its
/// root (last two labels) when that differs from the domain.
pub fn derive_patterns(domain: &str) -> Vec<Pattern> {
    let mut patterns = vec![Pattern::exact(domain)];
    let root = root_domain(domain);
    if root != domain {
        patterns.push(Pattern::subdomain(root, SUBDOMAIN_RULE_WEIGHT));
    }
    patterns
}

/// One blocked root domain and its rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlocklistEntry {
    /// Lowercased, trimmed domain; unique within a [`RuleSet`].
    pub domain: String,
    /// Rules derived from or supplied for this domain.
    pub patterns: Vec<Pattern>,
    /// Creation time (epoch ms).
    pub added_at: i64,
    /// Last modification time (epoch ms).
    pub updated_at: i64,
    /// Why the domain was blocked.
    pub reason: String,
}

impl BlocklistEntry {
    /// Creates an entry, deriving patterns unless `patterns` is given.
    pub fn new(
        domain: &str,
        reason: impl Into<String>,
        patterns: Option<Vec<Pattern>>,
        now: i64,
    ) -> Self {
        let domain = canonical_key(domain);
        let patterns = patterns.unwrap_or_else(|| derive_patterns(&domain));
        Self {
            domain,
            patterns,
            added_at: now,
            updated_at: now,
            reason: reason.into(),
        }
    }
}

/// Version and timestamp of a ruleset document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    /// Monotonic version, starting at 1.
    pub version: u64,
    /// Last modification time (epoch ms).
    pub updated_at: i64,
}

/// Behaviour shared by both persisted ruleset documents.
pub trait Versioned: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Human-readable document name for logs.
    const KIND: &'static str;

    /// The document written on first run.
    fn defaults(now: i64) -> Self;

    /// Current version and timestamp.
    fn metadata(&self) -> Metadata;

    /// Overwrites version and timestamp.
    fn set_metadata(&mut self, metadata: Metadata);

    /// Checks invariants that the type system cannot express.
    fn validate(&self) -> Result<()>;

    /// Increments the version and stamps `now`; returns the new version.
    fn bump(&mut self, now: i64) -> u64 {
        let version = self.metadata().version + 1;
        self.set_metadata(Metadata {
            version,
            updated_at: now,
        });
        version
    }

    /// Stamps `now` without changing the version.
    fn touch(&mut self, now: i64) {
        let version = self.metadata().version;
        self.set_metadata(Metadata {
            version,
            updated_at: now,
        });
    }
}

fn validate_version(kind: &str, version: u64) -> Result<()> {
    if version == 0 {
        return Err(CoreError::InvalidRuleset(format!(
            "{kind} version must start at 1"
        )));
    }
    Ok(())
}

/// The domain blocklist document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleSet {
    /// Monotonic version.
    pub version: u64,
    /// Last modification time (epoch ms).
    pub updated_at: i64,
    /// Blocked domains, unique by `domain`.
    pub entries: Vec<BlocklistEntry>,
}

impl RuleSet {
    /// Returns the entry for a domain, if present.
    pub fn entry(&self, domain: &str) -> Option<&BlocklistEntry> {
        let key = canonical_key(domain);
        self.entries.iter().find(|e| e.domain == key)
    }

    /// Returns true if the domain has an entry.
    pub fn contains_domain(&self, domain: &str) -> bool {
        self.entry(domain).is_some()
    }

    /// Returns all blocked domains, sorted.
    pub fn domains(&self) -> Vec<String> {
        let mut domains: Vec<String> = self.entries.iter().map(|e| e.domain.clone()).collect();
        domains.sort();
        domains
    }

    /// Returns every entry rule, flattened.
    pub fn all_patterns(&self) -> impl Iterator<Item = &Pattern> {
        self.entries.iter().flat_map(|e| e.patterns.iter())
    }

    /// Inserts a domain or updates it in place.
    ///
    /// An existing entry keeps its `addedAt`; its `reason` and `updatedAt` are
    /// replaced and its patterns are replaced only when `patterns` is given.
    /// Returns true if a new entry was created.
    pub fn upsert(
        &mut self,
        domain: &str,
        reason: &str,
        patterns: Option<Vec<Pattern>>,
        now: i64,
    ) -> bool {
        let key = canonical_key(domain);
        if let Some(entry) = self.entries.iter_mut().find(|e| e.domain == key) {
            entry.updated_at = now;
            entry.reason = reason.to_string();
            if let Some(patterns) = patterns {
                entry.patterns = patterns;
            }
            return false;
        }
        self.entries
            .push(BlocklistEntry::new(&key, reason, patterns, now));
        true
    }

    /// Removes a domain. Returns false if it was absent.
    pub fn remove(&mut self, domain: &str) -> bool {
        let key = canonical_key(domain);
        let before = self.entries.len();
        self.entries.retain(|e| e.domain != key);
        self.entries.len() != before
    }
}

impl Versioned for RuleSet {
    const KIND: &'static str = "blocklist";

    fn defaults(now: i64) -> Self {
        Self {
            version: 1,
            updated_at: now,
            entries: Vec::new(),
        }
    }

    fn metadata(&self) -> Metadata {
        Metadata {
            version: self.version,
            updated_at: self.updated_at,
        }
    }

    fn set_metadata(&mut self, metadata: Metadata) {
        self.version = metadata.version;
        self.updated_at = metadata.updated_at;
    }

    fn validate(&self) -> Result<()> {
        validate_version(Self::KIND, self.version)?;
        let mut seen = HashSet::new();
        for entry in &self.entries {
            if entry.domain.is_empty() {
                return Err(CoreError::InvalidRuleset("empty blocklist domain".into()));
            }
            if entry.domain != canonical_key(&entry.domain) {
                return Err(CoreError::InvalidRuleset(format!(
                    "domain '{}' is not normalized",
                    entry.domain
                )));
            }
            if !seen.insert(entry.domain.as_str()) {
                return Err(CoreError::InvalidRuleset(format!(
                    "duplicate domain '{}'",
                    entry.domain
                )));
            }
            for pattern in &entry.patterns {
                pattern.validate()?;
            }
        }
        Ok(())
    }
}

/// The generic pattern list document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatternSet {
    /// Monotonic version.
    pub version: u64,
    /// Last modification time (epoch ms).
    pub updated_at: i64,
    /// Generic rules layered on top of entry rules.
    pub patterns: Vec<Pattern>,
}

impl PatternSet {
    /// Appends a rule unless an identical text+kind rule exists.
    ///
    /// Returns true if the rule was added.
    pub fn insert(&mut self, pattern: Pattern) -> bool {
        if self.patterns.iter().any(|p| p.same_rule(&pattern)) {
            return false;
        }
        self.patterns.push(pattern);
        true
    }

    /// Removes the rule with this text and kind. Returns false if absent.
    pub fn remove(&mut self, pattern: &str, kind: PatternKind) -> bool {
        let before = self.patterns.len();
        self.patterns
            .retain(|p| !(p.kind == kind && p.pattern == pattern));
        self.patterns.len() != before
    }
}

/// Generic rules installed on first run.
pub fn default_patterns() -> Vec<Pattern> {
    vec![
        Pattern::contains("bet", 0.7),
        Pattern::contains("casino", 0.8),
        Pattern::contains("poker", 0.7),
        Pattern::contains("slot", 0.7),
        Pattern::contains("gambling", 0.9),
        Pattern::regex(r"^bet\d+\.", 0.8),
        Pattern::regex(r"^casino\d+\.", 0.8),
    ]
}

impl Versioned for PatternSet {
    const KIND: &'static str = "patterns";

    fn defaults(now: i64) -> Self {
        Self {
            version: 1,
            updated_at: now,
            patterns: default_patterns(),
        }
    }

    fn metadata(&self) -> Metadata {
        Metadata {
            version: self.version,
            updated_at: self.updated_at,
        }
    }

    fn set_metadata(&mut self, metadata: Metadata) {
        self.version = metadata.version;
        self.updated_at = metadata.updated_at;
    }

    fn validate(&self) -> Result<()> {
        validate_version(Self::KIND, self.version)?;
        for pattern in &self.patterns {
            pattern.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_exact_and_root_subdomain_rules() {
        let patterns = derive_patterns("sub.bet365.com");
        assert_eq!(patterns.len(), 2);
        assert_eq!(patterns[0], Pattern::exact("sub.bet365.com"));
        assert_eq!(patterns[1].kind, PatternKind::Subdomain);
        assert_eq!(patterns[1].pattern, "bet365.com");
        assert_eq!(patterns[1].weight, SUBDOMAIN_RULE_WEIGHT);
    }

    #[test]
    fn root_domain_gets_exact_rule_only() {
        let patterns = derive_patterns("bet365.com");
        assert_eq!(patterns, vec![Pattern::exact("bet365.com")]);
    }

    #[test]
    fn pattern_weight_is_clamped() {
        assert_eq!(Pattern::contains("bet", 1.7).weight, 1.0);
        assert_eq!(Pattern::contains("bet", -0.2).weight, 0.0);
        assert_eq!(Pattern::contains("bet", f64::NAN).weight, 0.0);
    }

    #[test]
    fn pattern_serializes_with_type_tag() {
        let json = serde_json::to_value(Pattern::contains("casino", 0.8)).unwrap();
        assert_eq!(json["type"], "contains");
        assert_eq!(json["pattern"], "casino");

        let parsed: Pattern =
            serde_json::from_str(r#"{"pattern":"^bet\\d+","type":"regex","weight":0.5}"#).unwrap();
        assert_eq!(parsed.kind, PatternKind::Regex);
    }

    #[test]
    fn unknown_pattern_type_is_rejected() {
        let parsed: std::result::Result<Pattern, _> =
            serde_json::from_str(r#"{"pattern":"x","type":"fuzzy","weight":0.5}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn upsert_updates_in_place() {
        let mut rules = RuleSet::defaults(1);
        assert!(rules.upsert(" Bet365.COM ", "manual", None, 10));
        assert!(!rules.upsert("bet365.com", "re-reviewed", None, 20));

        assert_eq!(rules.entries.len(), 1);
        let entry = &rules.entries[0];
        assert_eq!(entry.domain, "bet365.com");
        assert_eq!(entry.reason, "re-reviewed");
        assert_eq!(entry.added_at, 10);
        assert_eq!(entry.updated_at, 20);
    }

    #[test]
    fn upsert_replaces_patterns_only_when_given() {
        let mut rules = RuleSet::defaults(1);
        rules.upsert("bet365.com", "manual", None, 10);
        rules.upsert("bet365.com", "manual", Some(vec![Pattern::contains("365", 0.5)]), 11);
        assert_eq!(rules.entries[0].patterns, vec![Pattern::contains("365", 0.5)]);

        rules.upsert("bet365.com", "manual", None, 12);
        assert_eq!(rules.entries[0].patterns, vec![Pattern::contains("365", 0.5)]);
    }

    #[test]
    fn domains_are_sorted() {
        let mut rules = RuleSet::defaults(1);
        rules.upsert("zbet.com", "manual", None, 1);
        rules.upsert("abet.com", "manual", None, 1);
        assert_eq!(rules.domains(), vec!["abet.com", "zbet.com"]);
    }

    #[test]
    fn bump_increments_version() {
        let mut rules = RuleSet::defaults(1);
        assert_eq!(rules.bump(99), 2);
        assert_eq!(rules.metadata(), Metadata { version: 2, updated_at: 99 });
    }

    #[test]
    fn validate_rejects_duplicates_and_zero_version() {
        let mut rules = RuleSet::defaults(1);
        rules.entries.push(BlocklistEntry::new("a.com", "x", None, 1));
        rules.entries.push(BlocklistEntry::new("a.com", "y", None, 1));
        assert!(rules.validate().is_err());

        let mut patterns = PatternSet::defaults(1);
        assert!(patterns.validate().is_ok());
        patterns.version = 0;
        assert!(patterns.validate().is_err());
    }

    #[test]
    fn pattern_set_dedupes_by_text_and_kind() {
        let mut set = PatternSet::defaults(1);
        let before = set.patterns.len();
        assert!(!set.insert(Pattern::contains("casino", 0.3)));
        assert!(set.insert(Pattern::exact("casino")));
        assert_eq!(set.patterns.len(), before + 1);

        assert!(set.remove("casino", PatternKind::Exact));
        assert!(!set.remove("casino", PatternKind::Exact));
    }

    #[test]
    fn ruleset_serializes_camel_case() {
        let mut rules = RuleSet::defaults(5);
        rules.upsert("bet365.com", "manual", None, 5);
        let json = serde_json::to_value(&rules).unwrap();
        assert_eq!(json["updatedAt"], 5);
        assert_eq!(json["entries"][0]["addedAt"], 5);
    }
}
