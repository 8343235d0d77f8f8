//! Heuristic scoring of observed domains for blocklist inclusion.
//!
//! Four independent sub-scores are summed and the total clamped to `[0, 100]`:
//!
//! | Signal | Cap |
//! |---|---|
//! | gambling keywords | 50 |
//! | similarity to a blocked domain | 30 |
//! | evasion tricks | 25 |
//! | existing pattern rules | 20 |
//!
//! The caps can add up past 100 before the final clamp. Suggestions are
//! advisory; promotion into the blocklist is always a separate step.

mod similarity;
mod tricks;

use std::collections::{BTreeSet, HashMap};

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::canonical_key;
use crate::ruleset::{Pattern, PatternKind, PatternSet, RuleSet};

pub use similarity::{levenshtein, similarity};
pub use tricks::{TrickDetector, TrickHit, SUSPICIOUS_TLDS};

/// Gambling-related keywords looked for inside domains.
pub const GAMBLING_KEYWORDS: &[&str] = &[
    "bet",
    "casino",
    "bahis",
    "slot",
    "wager",
    "poker",
    "roulette",
    "jackpot",
    "lottery",
    "bingo",
    "gambling",
    "wagering",
    "odds",
    "stake",
    "pari",
    "sportbook",
    "sportsbook",
    "parlay",
    "blackjack",
    "craps",
    "baccarat",
    "keno",
    "scratch",
    "pachinko",
];

/// Scoring constants.
pub mod scoring {
    /// Points per contained keyword, before weighting.
    pub const KEYWORD_POINTS: f64 = 30.0;
    /// Fraction taken back when the keyword is not a whole token.
    pub const PARTIAL_PENALTY: f64 = 0.3;
    /// Bonus per whole-token keyword when more than one matched.
    pub const MULTI_KEYWORD_BONUS: f64 = 5.0;
    /// Maximum multi-keyword bonus.
    pub const MULTI_KEYWORD_BONUS_CAP: f64 = 15.0;
    /// Keyword sub-score cap.
    pub const KEYWORD_CAP: f64 = 50.0;
    /// Similarity scale (max similarity of 1.0 yields this many points).
    pub const SIMILARITY_POINTS: f64 = 30.0;
    /// Similarity above this earns a "moderate similarity" reason.
    pub const MODERATE_SIMILARITY: f64 = 0.5;
    /// Trick scale, applied after capping the raw trick sum at 1.0.
    pub const TRICK_POINTS: f64 = 25.0;
    /// Pattern scale, applied after capping the weight sum at 1.0.
    pub const PATTERN_POINTS: f64 = 20.0;
    /// Final confidence ceiling.
    pub const MAX_CONFIDENCE: f64 = 100.0;
}

/// Suggestor tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SuggestorConfig {
    /// Minimum confidence (0-100) for a domain to be suggested.
    pub min_confidence: u8,
    /// Per-keyword weight overrides; missing keywords weigh 1.0.
    pub keyword_weights: HashMap<String, f64>,
    /// Similarity at or above which the closest blocked domain is named.
    pub similarity_threshold: f64,
}

impl Default for SuggestorConfig {
    fn default() -> Self {
        Self {
            min_confidence: 50,
            keyword_weights: HashMap::new(),
            similarity_threshold: 0.7,
        }
    }
}

impl SuggestorConfig {
    /// Sets the minimum confidence.
    pub fn with_min_confidence(mut self, min_confidence: u8) -> Self {
        self.min_confidence = min_confidence.min(100);
        self
    }

    /// Sets the similarity threshold.
    pub fn with_similarity_threshold(mut self, threshold: f64) -> Self {
        self.similarity_threshold = threshold;
        self
    }

    /// Overrides the weight of one keyword.
    pub fn with_keyword_weight(mut self, keyword: impl Into<String>, weight: f64) -> Self {
        self.keyword_weights.insert(keyword.into(), weight);
        self
    }
}

/// A scored candidate domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Suggestion {
    pub domain: String,
    /// 0-100.
    pub confidence: u8,
    pub reasons: Vec<String>,
    pub matched_patterns: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyword_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub similarity_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trick_score: Option<f64>,
}

struct CompiledPattern {
    pattern: Pattern,
    regex: Option<Regex>,
}

impl CompiledPattern {
    fn matches(&self, domain: &str) -> bool {
        let p = self.pattern.pattern.as_str();
        match self.pattern.kind {
            PatternKind::Exact => domain == p,
            PatternKind::Subdomain => domain == p || domain.ends_with(&format!(".{p}")),
            PatternKind::Contains => domain.contains(p),
            PatternKind::Regex => self.regex.as_ref().is_some_and(|re| re.is_match(domain)),
        }
    }
}

#[derive(Default)]
struct SubScore {
    score: f64,
    reasons: Vec<String>,
    patterns: Vec<String>,
}

/// Scores observed domains against the current rulesets.
pub struct DomainSuggestor {
    config: SuggestorConfig,
    blocked: BTreeSet<String>,
    patterns: Vec<CompiledPattern>,
    keyword_regexes: Vec<(&'static str, Regex)>,
    tricks: TrickDetector,
}

impl DomainSuggestor {
    /// Creates a suggestor over blocked domains and generic patterns.
    pub fn new<I, S>(config: SuggestorConfig, blocked: I, patterns: &[Pattern]) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let blocked: BTreeSet<String> = blocked
            .into_iter()
            .map(|d| canonical_key(d.as_ref()))
            .filter(|d| !d.is_empty())
            .collect();

        let patterns = patterns
            .iter()
            .filter_map(|p| {
                let regex = match p.kind {
                    PatternKind::Regex => {
                        match RegexBuilder::new(&p.pattern).case_insensitive(true).build() {
                            Ok(re) => Some(re),
                            Err(e) => {
                                warn!(pattern = %p.pattern, error = %e, "Skipping invalid regex pattern");
                                return None;
                            }
                        }
                    }
                    _ => None,
                };
                Some(CompiledPattern {
                    pattern: p.clone(),
                    regex,
                })
            })
            .collect();

        let keyword_regexes = GAMBLING_KEYWORDS
            .iter()
            .map(|kw| {
                let re = Regex::new(&format!(r"(?i)\b{}\b", regex::escape(kw)))
                    .expect("escaped keyword is a valid regex");
                (*kw, re)
            })
            .collect();

        debug!(blocked = blocked.len(), "Domain suggestor initialized");

        Self {
            config,
            blocked,
            patterns,
            keyword_regexes,
            tricks: TrickDetector::new(),
        }
    }

    /// Creates a suggestor from the stored documents.
    pub fn from_rulesets(config: SuggestorConfig, rules: &RuleSet, patterns: &PatternSet) -> Self {
        Self::new(config, rules.domains(), &patterns.patterns)
    }

    /// Returns the active configuration.
    pub fn config(&self) -> &SuggestorConfig {
        &self.config
    }

    /// Scores a single domain.
    pub fn analyze(&self, domain: &str) -> Suggestion {
        let normalized = canonical_key(domain);

        if self.blocked.contains(&normalized) {
            return Suggestion {
                domain: normalized,
                confidence: 0,
                reasons: vec!["already in blocklist".to_string()],
                matched_patterns: Vec::new(),
                keyword_score: None,
                similarity_score: None,
                trick_score: None,
            };
        }

        let mut confidence = 0.0;
        let mut reasons = Vec::new();
        let mut matched = Vec::new();

        let keywords = self.score_keywords(&normalized);
        if keywords.score > 0.0 {
            confidence += keywords.score;
            reasons.extend(keywords.reasons.iter().cloned());
            matched.extend(keywords.patterns.iter().cloned());
        }

        let similar = self.score_similarity(&normalized);
        if similar.score > 0.0 {
            confidence += similar.score * scoring::SIMILARITY_POINTS;
            reasons.extend(similar.reasons.iter().cloned());
            matched.extend(similar.patterns.iter().cloned());
        }

        let tricks = self.score_tricks(&normalized);
        if tricks.score > 0.0 {
            confidence += tricks.score * scoring::TRICK_POINTS;
            reasons.extend(tricks.reasons.iter().cloned());
            matched.extend(tricks.patterns.iter().cloned());
        }

        let existing = self.score_patterns(&normalized);
        if existing.score > 0.0 {
            confidence += existing.score * scoring::PATTERN_POINTS;
            reasons.extend(existing.reasons);
            matched.extend(existing.patterns);
        }

        let confidence = confidence.clamp(0.0, scoring::MAX_CONFIDENCE).round() as u8;

        Suggestion {
            domain: normalized,
            confidence,
            reasons: dedupe(reasons),
            matched_patterns: dedupe(matched),
            keyword_score: Some(keywords.score),
            similarity_score: Some(similar.score),
            trick_score: Some(tricks.score),
        }
    }

    /// Scores many domains and keeps those at or above `min_confidence`,
    /// highest confidence first.
    pub fn suggest<I, S>(&self, domains: I) -> Vec<Suggestion>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut suggestions: Vec<Suggestion> = domains
            .into_iter()
            .map(|d| self.analyze(d.as_ref()))
            .filter(|s| s.confidence >= self.config.min_confidence)
            .collect();
        suggestions.sort_by(|a, b| b.confidence.cmp(&a.confidence));
        suggestions
    }

    fn keyword_weight(&self, keyword: &str) -> f64 {
        self.config
            .keyword_weights
            .get(keyword)
            .copied()
            .unwrap_or(1.0)
    }

    fn score_keywords(&self, domain: &str) -> SubScore {
        let mut out = SubScore::default();

        for (keyword, re) in &self.keyword_regexes {
            if !domain.contains(*keyword) {
                continue;
            }
            let points = scoring::KEYWORD_POINTS * self.keyword_weight(keyword);
            out.score += points;

            if re.is_match(domain) {
                out.reasons.push(format!("contains gambling keyword: \"{keyword}\""));
                out.patterns.push((*keyword).to_string());
            } else {
                // Partial hit such as "abet" for "bet".
                out.score -= points * scoring::PARTIAL_PENALTY;
            }
        }

        let whole_tokens = out.patterns.len();
        if whole_tokens > 1 {
            let bonus = (whole_tokens as f64 * scoring::MULTI_KEYWORD_BONUS)
                .min(scoring::MULTI_KEYWORD_BONUS_CAP);
            out.score += bonus;
            out.reasons
                .push(format!("contains {whole_tokens} gambling keywords"));
        }

        out.score = out.score.min(scoring::KEYWORD_CAP);
        out
    }

    fn score_similarity(&self, domain: &str) -> SubScore {
        let mut best = 0.0;
        let mut closest: Option<&str> = None;

        for blocked in &self.blocked {
            let s = similarity(domain, blocked);
            if s > best {
                best = s;
                closest = Some(blocked.as_str());
            }
        }

        let mut out = SubScore {
            score: best,
            ..SubScore::default()
        };
        let percent = (best * 100.0).round();

        if best >= self.config.similarity_threshold {
            if let Some(closest) = closest {
                out.reasons
                    .push(format!("high similarity ({percent}%) to blocked domain {closest}"));
                out.patterns.push(format!("similar:{closest}"));
            }
        } else if best > scoring::MODERATE_SIMILARITY {
            out.reasons
                .push(format!("moderate similarity ({percent}%) to blocked domains"));
        }

        out
    }

    fn score_tricks(&self, domain: &str) -> SubScore {
        let mut out = SubScore::default();
        for hit in self.tricks.detect(domain, &self.blocked) {
            out.score += hit.increment;
            out.reasons.push(hit.reason);
            out.patterns.push(hit.pattern);
        }
        out.score = out.score.min(1.0);
        out
    }

    fn score_patterns(&self, domain: &str) -> SubScore {
        let mut out = SubScore::default();
        for compiled in &self.patterns {
            if compiled.matches(domain) {
                let p = &compiled.pattern;
                out.score += p.weight;
                out.reasons
                    .push(format!("matches pattern: {} ({})", p.pattern, p.kind));
                out.patterns.push(p.label());
            }
        }
        out.score = out.score.min(1.0);
        out
    }
}

fn dedupe(items: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}
