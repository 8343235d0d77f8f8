//! Evasion-trick detectors.
//!
//! Each detector that fires adds a fixed increment to a raw score; the caller
//! caps the sum at 1.0 before scaling.

use std::collections::BTreeSet;

use regex::Regex;

use crate::domain::first_label;

/// Top-level domains favoured by gambling operators.
pub const SUSPICIOUS_TLDS: &[&str] = &[".bet", ".casino", ".poker", ".games", ".win"];

/// Increment for a suspicious TLD.
pub const TLD_INCREMENT: f64 = 1.0;
/// Increment per numeric camouflage pattern.
pub const NUMBER_INCREMENT: f64 = 0.8;
/// Increment for `bet-365` style hyphenation.
pub const HYPHEN_INCREMENT: f64 = 0.7;
/// Increment for a reversed known-blocked name.
pub const MIRROR_REVERSED_INCREMENT: f64 = 0.8;
/// Increment for a homoglyph variant of a known-blocked name.
pub const MIRROR_HOMOGLYPH_INCREMENT: f64 = 0.6;
/// Increment for `www-bet365` style subdomain flattening.
pub const SUBDOMAIN_TRICK_INCREMENT: f64 = 0.6;
/// Increment for digit/letter substitution around `bet`.
pub const SUBSTITUTION_INCREMENT: f64 = 0.5;

const NUMBER_PATTERNS: &[&str] = &[
    r"bet\d+",
    r"casino\d+",
    r"\d+bet",
    r"\d+casino",
    r"\d+bahis",
    r"bahis\d+",
];

const SUBSTITUTION_PATTERNS: &[&str] = &[r"\d+[a-z]+bet", r"bet\d+[a-z]+", r"[0-5]+bet", r"bet[0-5]+"];

const COMMON_SUBDOMAINS: &[&str] = &["www", "m", "mobile", "app", "secure"];

/// One fired detector.
#[derive(Debug, Clone, PartialEq)]
pub struct TrickHit {
    pub increment: f64,
    pub reason: String,
    pub pattern: String,
}

/// Precompiled trick detectors.
pub struct TrickDetector {
    number_patterns: Vec<(&'static str, Regex)>,
    hyphen: Regex,
    substitutions: Vec<Regex>,
}

impl Default for TrickDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl TrickDetector {
    /// Compiles the built-in detector patterns.
    pub fn new() -> Self {
        Self {
            number_patterns: NUMBER_PATTERNS
                .iter()
                .map(|src| (*src, case_insensitive(src)))
                .collect(),
            hyphen: case_insensitive(r"(bet|casino|poker|slot|bahis)[-_]([a-z0-9]+)"),
            substitutions: SUBSTITUTION_PATTERNS
                .iter()
                .map(|src| case_insensitive(src))
                .collect(),
        }
    }

    /// Runs every detector against a normalized domain.
    pub fn detect(&self, domain: &str, blocked: &BTreeSet<String>) -> Vec<TrickHit> {
        let mut hits = Vec::new();

        for tld in SUSPICIOUS_TLDS {
            if domain.ends_with(tld) {
                hits.push(TrickHit {
                    increment: TLD_INCREMENT,
                    reason: format!("uses suspicious TLD: {tld}"),
                    pattern: format!("tld:{tld}"),
                });
            }
        }

        for (src, re) in &self.number_patterns {
            if re.is_match(domain) {
                hits.push(TrickHit {
                    increment: NUMBER_INCREMENT,
                    reason: format!("matches number pattern: {src}"),
                    pattern: format!("number-pattern:{src}"),
                });
            }
        }

        if self.hyphen.is_match(domain) {
            hits.push(TrickHit {
                increment: HYPHEN_INCREMENT,
                reason: "contains hyphenated gambling keyword".to_string(),
                pattern: "hyphenated-keyword".to_string(),
            });
        }

        let mirror = mirror_score(domain, blocked);
        if mirror > 0.0 {
            hits.push(TrickHit {
                increment: mirror,
                reason: "possible mirror of a blocked domain".to_string(),
                pattern: "mirror-domain".to_string(),
            });
        }

        if has_subdomain_trick(domain) {
            hits.push(TrickHit {
                increment: SUBDOMAIN_TRICK_INCREMENT,
                reason: "subdomain manipulation detected".to_string(),
                pattern: "subdomain-trick".to_string(),
            });
        }

        if self.substitutions.iter().any(|re| re.is_match(domain)) {
            hits.push(TrickHit {
                increment: SUBSTITUTION_INCREMENT,
                reason: "character substitution detected".to_string(),
                pattern: "char-substitution".to_string(),
            });
        }

        hits
    }
}

fn case_insensitive(src: &str) -> Regex {
    Regex::new(&format!("(?i){src}")).expect("built-in trick pattern is valid")
}

fn homoglyph_fold(label: &str) -> String {
    label
        .chars()
        .map(|c| match c {
            '0' => 'o',
            '1' => 'i',
            '5' => 's',
            other => other,
        })
        .collect()
}

/// Scores the first label against each blocked domain's first label.
///
/// The first blocked domain that mirrors wins.
fn mirror_score(domain: &str, blocked: &BTreeSet<String>) -> f64 {
    let main = first_label(domain);
    let folded = homoglyph_fold(main);

    for other in blocked {
        let other_main = first_label(other);
        let reversed: String = other_main.chars().rev().collect();
        if main == reversed {
            return MIRROR_REVERSED_INCREMENT;
        }
        if folded == homoglyph_fold(other_main) && main != other_main {
            return MIRROR_HOMOGLYPH_INCREMENT;
        }
    }

    0.0
}

/// Detects a flattened subdomain in the label left of the TLD.
fn has_subdomain_trick(domain: &str) -> bool {
    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 {
        return false;
    }
    let main = labels[labels.len() - 2];
    COMMON_SUBDOMAINS.iter().any(|sub| {
        main.ends_with(&format!("-{sub}")) || main.starts_with(&format!("{sub}-"))
    })
}
