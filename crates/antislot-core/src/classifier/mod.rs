//! SMS spam classification.
//!
//! Scores a message body and sender against keyword buckets, suspicious
//! patterns and sender-ID heuristics to decide whether it is gambling, scam
//! or advertisement spam. Runs entirely locally.

mod filter;
mod keywords;
mod patterns;
mod sms;

use serde::{Deserialize, Serialize};

pub use filter::{FilterSettings, FilterStats, SmsFilterService};
pub use keywords::{
    all_keywords, KeywordList, KeywordMatcher, ADVERTISEMENT_KEYWORDS, GAMBLING_KEYWORDS,
    SCAM_KEYWORDS,
};
pub use patterns::{analyze_sender, has_url, PatternScanner, SenderAnalysis, SpamPattern, SPAM_PATTERNS};
pub use sms::{ClassifierOptions, SmsClassifier};

/// Spam categories a message can be assigned.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpamCategory {
    Gambling,
    Scam,
    Advertisement,
    #[default]
    Normal,
}

impl SpamCategory {
    /// Returns all categories.
    pub fn all() -> &'static [SpamCategory] {
        &[
            SpamCategory::Gambling,
            SpamCategory::Scam,
            SpamCategory::Advertisement,
            SpamCategory::Normal,
        ]
    }

    /// Returns a human-readable name.
    pub fn name(&self) -> &'static str {
        match self {
            SpamCategory::Gambling => "Gambling",
            SpamCategory::Scam => "Scam",
            SpamCategory::Advertisement => "Advertisement",
            SpamCategory::Normal => "Normal",
        }
    }
}

/// An incoming SMS.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmsMessage {
    pub body: String,
    #[serde(default)]
    pub sender: String,
    /// Receive time (epoch ms), if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

impl SmsMessage {
    /// Creates a message without a timestamp.
    pub fn new(body: impl Into<String>, sender: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            sender: sender.into(),
            timestamp: None,
        }
    }

    /// Sets the receive time.
    pub fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

/// Verdict for a single message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpamDetectionResult {
    pub is_spam: bool,
    pub category: SpamCategory,
    /// `[0, 1]`, rounded to two decimals.
    pub confidence: f64,
    pub reasons: Vec<String>,
    pub matched_keywords: Vec<String>,
    pub matched_patterns: Vec<String>,
}

impl SpamDetectionResult {
    /// A "not spam" verdict with no evidence.
    pub fn clean() -> Self {
        Self {
            is_spam: false,
            category: SpamCategory::Normal,
            confidence: 0.0,
            reasons: Vec::new(),
            matched_keywords: Vec::new(),
            matched_patterns: Vec::new(),
        }
    }
}
