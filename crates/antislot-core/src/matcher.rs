//! Boolean domain matching engine.
//!
//! Rules are compiled into a [`MatcherIndex`] and swapped in whole, so a
//! concurrent lookup sees either the old index or the new one, never a mix.
//!
//! Lookup order, each stage short-circuiting on the first hit:
//!
//! 1. allow-list (always wins, returns "not blocked")
//! 2. exact set
//! 3. subdomain set (the domain or any parent suffix)
//! 4. contains list
//! 5. regex list
//!
//! Weights are ignored here; any hit blocks.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use regex::{Regex, RegexBuilder};
use serde::Serialize;
use tracing::{debug, warn};

use crate::domain::{normalize_domain, suffixes};
use crate::ruleset::{
    derive_patterns, Pattern, PatternKind, PatternSet, RuleSet, SUBDOMAIN_RULE_WEIGHT,
};

/// Which rule stage produced a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStage {
    Exact,
    Subdomain,
    Contains,
    Regex,
}

impl MatchStage {
    /// Returns the stage name.
    pub fn name(&self) -> &'static str {
        match self {
            MatchStage::Exact => "exact",
            MatchStage::Subdomain => "subdomain",
            MatchStage::Contains => "contains",
            MatchStage::Regex => "regex",
        }
    }
}

/// Outcome of evaluating a domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum Decision {
    /// The domain is on the allow-list.
    AllowListed { domain: String },
    /// A rule matched.
    Blocked {
        domain: String,
        stage: MatchStage,
        rule: String,
    },
    /// No rule matched.
    NotBlocked { domain: String },
}

impl Decision {
    /// Returns true if the domain should be blocked.
    pub fn is_blocked(&self) -> bool {
        matches!(self, Decision::Blocked { .. })
    }

    /// Returns the normalized domain that was evaluated.
    pub fn domain(&self) -> &str {
        match self {
            Decision::AllowListed { domain }
            | Decision::Blocked { domain, .. }
            | Decision::NotBlocked { domain } => domain,
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::AllowListed { domain } => write!(f, "{domain}: allowed (allow-list)"),
            Decision::Blocked {
                domain,
                stage,
                rule,
            } => write!(f, "{domain}: blocked ({} rule '{rule}')", stage.name()),
            Decision::NotBlocked { domain } => write!(f, "{domain}: not blocked"),
        }
    }
}

/// Summary of an index build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    /// Rules that made it into the index.
    pub loaded: usize,
    /// Rules skipped (empty text or a regex that failed to compile).
    pub skipped: usize,
}

/// Compiled, immutable rule index.
#[derive(Debug, Default)]
pub struct MatcherIndex {
    exact: HashSet<String>,
    subdomain: HashSet<String>,
    contains: Vec<String>,
    regexes: Vec<Regex>,
    skipped: usize,
}

impl MatcherIndex {
    /// Compiles rules into an index. Invalid regexes are logged and skipped.
    pub fn build<'a>(patterns: impl IntoIterator<Item = &'a Pattern>) -> Self {
        let mut index = Self::default();
        let mut seen_contains = HashSet::new();
        let mut seen_regex = HashSet::new();

        for pattern in patterns {
            let text = pattern.pattern.trim();
            if text.is_empty() {
                index.skipped += 1;
                continue;
            }

            match pattern.kind {
                PatternKind::Exact => {
                    index.exact.insert(normalize_domain(text));
                }
                PatternKind::Subdomain => {
                    index.subdomain.insert(normalize_domain(text));
                }
                PatternKind::Contains => {
                    let needle = text.to_lowercase();
                    if seen_contains.insert(needle.clone()) {
                        index.contains.push(needle);
                    }
                }
                PatternKind::Regex => {
                    if !seen_regex.insert(text.to_string()) {
                        continue;
                    }
                    match RegexBuilder::new(text).case_insensitive(true).build() {
                        Ok(re) => index.regexes.push(re),
                        Err(e) => {
                            warn!(pattern = %text, error = %e, "Skipping invalid regex rule");
                            index.skipped += 1;
                        }
                    }
                }
            }
        }

        index
    }

    /// Number of distinct compiled rules.
    pub fn len(&self) -> usize {
        self.exact.len() + self.subdomain.len() + self.contains.len() + self.regexes.len()
    }

    /// Returns true if no rules are compiled.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn find(&self, domain: &str) -> Option<(MatchStage, String)> {
        if self.exact.contains(domain) {
            return Some((MatchStage::Exact, domain.to_string()));
        }

        // Every parent suffix, which includes the base domain.
        if let Some(hit) = suffixes(domain).find(|s| self.subdomain.contains(*s)) {
            return Some((MatchStage::Subdomain, hit.to_string()));
        }

        if let Some(hit) = self.contains.iter().find(|c| domain.contains(c.as_str())) {
            return Some((MatchStage::Contains, hit.clone()));
        }

        self.regexes
            .iter()
            .find(|re| re.is_match(domain))
            .map(|re| (MatchStage::Regex, re.as_str().to_string()))
    }
}

/// Builds the flat rule list a client derives from a blocklist snapshot:
/// exact + subdomain rules per domain, followed by the generic patterns.
pub fn snapshot_rules(domains: &[String], patterns: &[Pattern]) -> Vec<Pattern> {
    let mut rules = Vec::with_capacity(domains.len() * 2 + patterns.len());
    for domain in domains {
        rules.push(Pattern::exact(domain.as_str()));
        rules.push(Pattern::subdomain(domain.as_str(), SUBDOMAIN_RULE_WEIGHT));
    }
    rules.extend(patterns.iter().cloned());
    rules
}

/// Thread-safe matcher with an atomically replaceable index and allow-list.
pub struct DomainMatcher {
    index: RwLock<Arc<MatcherIndex>>,
    allow_list: RwLock<Arc<HashSet<String>>>,
}

impl Default for DomainMatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DomainMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DomainMatcher")
            .field("rules", &self.index.read().len())
            .field("allow_list", &self.allow_list.read().len())
            .finish()
    }
}

impl DomainMatcher {
    /// Creates an empty matcher that blocks nothing.
    pub fn new() -> Self {
        Self {
            index: RwLock::new(Arc::new(MatcherIndex::default())),
            allow_list: RwLock::new(Arc::new(HashSet::new())),
        }
    }

    /// Creates a matcher from the server-side documents.
    pub fn from_rulesets(rules: &RuleSet, patterns: &PatternSet) -> Self {
        let matcher = Self::new();
        matcher.load_rulesets(rules, patterns);
        matcher
    }

    /// Replaces the index with one compiled from `patterns`.
    pub fn load(&self, patterns: &[Pattern]) -> LoadReport {
        let index = MatcherIndex::build(patterns);
        let report = LoadReport {
            loaded: index.len(),
            skipped: index.skipped,
        };
        *self.index.write() = Arc::new(index);
        debug!(loaded = report.loaded, skipped = report.skipped, "Matcher index swapped");
        report
    }

    /// Replaces the index with entry rules plus generic patterns.
    ///
    /// Entries without explicit rules get the derived exact/subdomain pair.
    pub fn load_rulesets(&self, rules: &RuleSet, patterns: &PatternSet) -> LoadReport {
        let mut all = Vec::new();
        for entry in &rules.entries {
            if entry.patterns.is_empty() {
                all.extend(derive_patterns(&entry.domain));
            } else {
                all.extend(entry.patterns.iter().cloned());
            }
        }
        all.extend(patterns.patterns.iter().cloned());
        self.load(&all)
    }

    /// Replaces the allow-list.
    pub fn set_allow_list<I, S>(&self, domains: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let list: HashSet<String> = domains
            .into_iter()
            .map(|d| normalize_domain(d.as_ref()))
            .filter(|d| !d.is_empty())
            .collect();
        *self.allow_list.write() = Arc::new(list);
    }

    /// Returns the allow-listed domains, sorted.
    pub fn allow_list(&self) -> Vec<String> {
        let mut list: Vec<String> = self.allow_list.read().iter().cloned().collect();
        list.sort();
        list
    }

    /// Number of compiled rules in the active index.
    pub fn rule_count(&self) -> usize {
        self.index.read().len()
    }

    /// Evaluates a URL or hostname and reports which stage decided.
    pub fn evaluate(&self, input: &str) -> Decision {
        let domain = normalize_domain(input);
        if domain.is_empty() {
            return Decision::NotBlocked { domain };
        }

        // Snapshot both under short read locks; matching runs lock-free.
        let allow = self.allow_list.read().clone();
        if allow.contains(&domain) {
            return Decision::AllowListed { domain };
        }

        let index = self.index.read().clone();
        match index.find(&domain) {
            Some((stage, rule)) => Decision::Blocked {
                domain,
                stage,
                rule,
            },
            None => Decision::NotBlocked { domain },
        }
    }

    /// Returns true if the URL or hostname should be blocked.
    pub fn is_blocked(&self, input: &str) -> bool {
        self.evaluate(input).is_blocked()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ruleset::Versioned;

    fn matcher(patterns: &[Pattern]) -> DomainMatcher {
        let m = DomainMatcher::new();
        m.load(patterns);
        m
    }

    #[test]
    fn blocks_exact_after_normalization() {
        let m = matcher(&[Pattern::exact("bet365.com")]);
        let decision = m.evaluate("https://www.BET365.com/sports");
        assert_eq!(decision.domain(), "bet365.com");
        assert!(matches!(
            decision,
            Decision::Blocked { stage: MatchStage::Exact, .. }
        ));
    }

    #[test]
    fn blocks_contains_without_entry() {
        let m = matcher(&[Pattern::contains("casino", 0.8)]);
        assert!(m.is_blocked("mycasinoworld.net"));
        assert!(!m.is_blocked("example.org"));
    }

    #[test]
    fn subdomain_rule_covers_children() {
        let m = matcher(&[Pattern::subdomain("bet365.com", 0.9)]);
        assert!(m.is_blocked("bet365.com"));
        assert!(m.is_blocked("sports.bet365.com"));
        assert!(m.is_blocked("a.b.bet365.com"));
        assert!(!m.is_blocked("notbet365.com"));
    }

    #[test]
    fn base_domain_hits_subdomain_rule() {
        let m = matcher(&[Pattern::subdomain("casino.com", 0.9)]);
        let decision = m.evaluate("live.casino.com");
        assert_eq!(
            decision,
            Decision::Blocked {
                domain: "live.casino.com".into(),
                stage: MatchStage::Subdomain,
                rule: "casino.com".into(),
            }
        );
    }

    #[test]
    fn regex_is_case_insensitive() {
        let m = matcher(&[Pattern::regex(r"^BET\d+\.", 0.8)]);
        assert!(m.is_blocked("bet777.io"));
        assert!(!m.is_blocked("better.io"));
    }

    #[test]
    fn invalid_regex_is_skipped_not_fatal() {
        let m = DomainMatcher::new();
        let report = m.load(&[
            Pattern::regex("([unclosed", 0.5),
            Pattern::exact("bet365.com"),
            Pattern::regex(r"casino\d+", 0.5),
        ]);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.loaded, 2);
        assert!(m.is_blocked("bet365.com"));
        assert!(m.is_blocked("casino99.net"));
    }

    #[test]
    fn allow_list_always_wins() {
        let m = matcher(&[
            Pattern::exact("bet365.com"),
            Pattern::contains("bet", 1.0),
            Pattern::regex(".*", 1.0),
        ]);
        m.set_allow_list(["https://www.Bet365.com"]);
        assert_eq!(
            m.evaluate("bet365.com"),
            Decision::AllowListed { domain: "bet365.com".into() }
        );
        assert!(!m.is_blocked("www.bet365.com/login"));
        assert!(m.is_blocked("betway.com"));
    }

    #[test]
    fn stages_short_circuit_in_order() {
        let m = matcher(&[
            Pattern::regex("bet", 1.0),
            Pattern::contains("bet", 1.0),
            Pattern::exact("bet365.com"),
        ]);
        assert!(matches!(
            m.evaluate("bet365.com"),
            Decision::Blocked { stage: MatchStage::Exact, .. }
        ));
        assert!(matches!(
            m.evaluate("betway.com"),
            Decision::Blocked { stage: MatchStage::Contains, .. }
        ));
    }

    #[test]
    fn reload_replaces_whole_index() {
        let m = matcher(&[Pattern::exact("old.com")]);
        assert!(m.is_blocked("old.com"));
        m.load(&[Pattern::exact("new.com")]);
        assert!(!m.is_blocked("old.com"));
        assert!(m.is_blocked("new.com"));
    }

    #[test]
    fn empty_input_is_not_blocked() {
        let m = matcher(&[Pattern::contains("a", 1.0)]);
        assert!(!m.is_blocked(""));
        assert!(!m.is_blocked("   "));
    }

    #[test]
    fn loads_server_documents() {
        let mut rules = RuleSet::defaults(1);
        rules.upsert("m.bet365.com", "manual", None, 1);
        let m = DomainMatcher::from_rulesets(&rules, &PatternSet::defaults(1));

        assert!(m.is_blocked("m.bet365.com"));
        assert!(m.is_blocked("www.bet365.com"));
        assert!(m.is_blocked("pokerroom.org"));
        assert!(m.is_blocked("casino7.example"));
    }

    #[test]
    fn snapshot_rules_cover_domains_and_patterns() {
        let rules = snapshot_rules(&["betway.com".into()], &[Pattern::contains("slot", 0.7)]);
        assert_eq!(rules.len(), 3);
        let m = matcher(&rules);
        assert!(m.is_blocked("sports.betway.com"));
        assert!(m.is_blocked("slotland.net"));
    }

    #[test]
    fn concurrent_lookups_during_reload() {
        let m = Arc::new(matcher(&[Pattern::exact("bet365.com")]));
        let readers: Vec<_> = (0..4)
            .map(|_| {
                let m = Arc::clone(&m);
                std::thread::spawn(move || {
                    for _ in 0..500 {
                        assert!(m.is_blocked("bet365.com"));
                    }
                })
            })
            .collect();
        for i in 0..50 {
            m.load(&[Pattern::exact("bet365.com"), Pattern::exact(format!("x{i}.com"))]);
        }
        for r in readers {
            r.join().unwrap();
        }
    }
}
