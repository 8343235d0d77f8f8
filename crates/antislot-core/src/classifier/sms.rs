//! Message scoring.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::keywords::{KeywordMatcher, ADVERTISEMENT_KEYWORDS, GAMBLING_KEYWORDS, SCAM_KEYWORDS};
use super::patterns::{analyze_sender, has_url, PatternScanner};
use super::{SmsMessage, SpamCategory, SpamDetectionResult};

const CUSTOM_KEYWORD_WEIGHT: f64 = 0.9;
const GAMBLING_KEYWORD_WEIGHT: f64 = 0.6;
const SCAM_KEYWORD_WEIGHT: f64 = 0.8;
const AD_KEYWORD_WEIGHT: f64 = 0.4;
const PATTERN_WEIGHT: f64 = 0.5;
const SENDER_BOOST: f64 = 0.3;
const URL_WITH_KEYWORDS_BOOST: f64 = 0.5;
const MANY_PATTERNS_BOOST: f64 = 0.4;
const MANY_KEYWORDS_BOOST: f64 = 0.4;
const MANY_PATTERNS: usize = 2;
const MANY_KEYWORDS: usize = 3;
const STRICT_DIVISOR: f64 = 1.4;
const NORMAL_DIVISOR: f64 = 2.1;
const STRICT_THRESHOLD: f64 = 0.35;
const NORMAL_THRESHOLD: f64 = 0.5;

/// Classifier options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClassifierOptions {
    /// User keywords; any hit counts as gambling.
    pub custom_keywords: Vec<String>,
    /// Flag with less evidence.
    pub strict_mode: bool,
}

/// Keyword, pattern and sender based SMS classifier.
pub struct SmsClassifier {
    custom: KeywordMatcher,
    gambling: KeywordMatcher,
    scam: KeywordMatcher,
    advertisement: KeywordMatcher,
    patterns: PatternScanner,
    strict_mode: bool,
}

impl Default for SmsClassifier {
    fn default() -> Self {
        Self::new(ClassifierOptions::default())
    }
}

impl SmsClassifier {
    /// Creates a classifier with the built-in keyword lists.
    pub fn new(options: ClassifierOptions) -> Self {
        Self {
            custom: KeywordMatcher::new(&options.custom_keywords),
            gambling: KeywordMatcher::new(GAMBLING_KEYWORDS.iter()),
            scam: KeywordMatcher::new(SCAM_KEYWORDS.iter()),
            advertisement: KeywordMatcher::new(ADVERTISEMENT_KEYWORDS.iter()),
            patterns: PatternScanner::new(),
            strict_mode: options.strict_mode,
        }
    }

    /// Returns true if strict mode is on.
    pub fn strict_mode(&self) -> bool {
        self.strict_mode
    }

    /// Classifies a single message.
    pub fn classify(&self, message: &SmsMessage) -> SpamDetectionResult {
        let body = message.body.trim().to_lowercase();
        let sender = message.sender.trim();

        let mut keywords: Vec<String> = Vec::new();
        let mut matched_patterns: Vec<String> = Vec::new();
        let mut reasons: Vec<String> = Vec::new();
        let mut keyword_score = 0.0;
        let mut pattern_score = 0.0;
        let mut boost = 0.0;
        let mut category = SpamCategory::Normal;

        let custom = self.custom.find(&body);
        if !custom.is_empty() {
            keyword_score += CUSTOM_KEYWORD_WEIGHT * custom.len() as f64;
            reasons.push(format!("Matched {} custom keyword(s)", custom.len()));
            category = SpamCategory::Gambling;
            keywords.extend(custom);
        }

        let gambling = self.gambling.find(&body);
        if !gambling.is_empty() {
            keyword_score += GAMBLING_KEYWORD_WEIGHT * gambling.len() as f64;
            reasons.push(format!("Matched {} gambling keyword(s)", gambling.len()));
            if category == SpamCategory::Normal {
                category = SpamCategory::Gambling;
            }
            keywords.extend(gambling.iter().cloned());
        }

        let scam = self.scam.find(&body);
        if !scam.is_empty() {
            keyword_score += SCAM_KEYWORD_WEIGHT * scam.len() as f64;
            reasons.push(format!("Matched {} scam keyword(s)", scam.len()));
            if matches!(category, SpamCategory::Normal | SpamCategory::Advertisement) {
                category = SpamCategory::Scam;
            }
            keywords.extend(scam.iter().cloned());
        }

        // Advertisement only counts when nothing stronger fired.
        if category == SpamCategory::Normal {
            let ads = self.advertisement.find(&body);
            if !ads.is_empty() {
                keyword_score += AD_KEYWORD_WEIGHT * ads.len() as f64;
                reasons.push(format!("Matched {} advertisement keyword(s)", ads.len()));
                category = SpamCategory::Advertisement;
                keywords.extend(ads);
            }
        }

        for pattern in self.patterns.scan(&body) {
            pattern_score += PATTERN_WEIGHT;
            matched_patterns.push(pattern.description.to_string());
            reasons.push(format!("Matched pattern: {}", pattern.description));
            if category == SpamCategory::Normal {
                category = pattern.category;
            }
        }

        if !sender.is_empty() {
            let analysis = analyze_sender(sender);
            if analysis.is_suspicious {
                boost += SENDER_BOOST;
                reasons.extend(analysis.reasons);
            }
        }

        let url = has_url(&body);
        if url && !gambling.is_empty() {
            boost += URL_WITH_KEYWORDS_BOOST;
            reasons.push("Contains URL with gambling keywords".to_string());
            category = SpamCategory::Gambling;
        }
        if url && !scam.is_empty() {
            boost += URL_WITH_KEYWORDS_BOOST;
            reasons.push("Contains URL with scam keywords".to_string());
            category = SpamCategory::Scam;
        }
        if matched_patterns.len() >= MANY_PATTERNS {
            boost += MANY_PATTERNS_BOOST;
        }
        if keywords.len() >= MANY_KEYWORDS {
            boost += MANY_KEYWORDS_BOOST;
        }

        let total = keyword_score + pattern_score + boost;
        let (divisor, threshold) = if self.strict_mode {
            (STRICT_DIVISOR, STRICT_THRESHOLD)
        } else {
            (NORMAL_DIVISOR, NORMAL_THRESHOLD)
        };
        let confidence = (total / divisor).min(1.0);
        let is_spam = confidence >= threshold && category != SpamCategory::Normal;

        SpamDetectionResult {
            is_spam,
            category,
            confidence: (confidence * 100.0).round() / 100.0,
            reasons,
            matched_keywords: dedupe(keywords),
            matched_patterns: dedupe(matched_patterns),
        }
    }

    /// Classifies messages in order.
    pub fn classify_batch(&self, messages: &[SmsMessage]) -> Vec<SpamDetectionResult> {
        messages.iter().map(|m| self.classify(m)).collect()
    }
}

fn dedupe(items: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}
