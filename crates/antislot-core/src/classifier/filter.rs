//! SMS filter service: classifier plus user settings and counters.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::sms::{ClassifierOptions, SmsClassifier};
use super::{SmsMessage, SpamDetectionResult};

const DAY_MILLIS: i64 = 24 * 60 * 60 * 1000;

/// User-facing filter settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FilterSettings {
    pub enabled: bool,
    pub custom_keywords: Vec<String>,
    /// Flagged messages older than this many days may be purged.
    pub auto_delete_days: Option<u32>,
    pub strict_mode: bool,
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            custom_keywords: Vec::new(),
            auto_delete_days: None,
            strict_mode: false,
        }
    }
}

impl FilterSettings {
    fn classifier_options(&self) -> ClassifierOptions {
        ClassifierOptions {
            custom_keywords: self.custom_keywords.clone(),
            strict_mode: self.strict_mode,
        }
    }
}

/// Blocked/allowed counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterStats {
    pub blocked: u64,
    pub allowed: u64,
}

/// Classifies messages according to the current settings.
pub struct SmsFilterService {
    settings: RwLock<FilterSettings>,
    classifier: RwLock<Arc<SmsClassifier>>,
    blocked: AtomicU64,
    allowed: AtomicU64,
}

impl Default for SmsFilterService {
    fn default() -> Self {
        Self::new(FilterSettings::default())
    }
}

impl SmsFilterService {
    /// Creates a service with the given settings.
    pub fn new(settings: FilterSettings) -> Self {
        let classifier = SmsClassifier::new(settings.classifier_options());
        Self {
            settings: RwLock::new(settings),
            classifier: RwLock::new(Arc::new(classifier)),
            blocked: AtomicU64::new(0),
            allowed: AtomicU64::new(0),
        }
    }

    /// Returns a copy of the current settings.
    pub fn settings(&self) -> FilterSettings {
        self.settings.read().clone()
    }

    /// Replaces the settings and rebuilds the classifier.
    pub fn update_settings(&self, settings: FilterSettings) {
        let classifier = Arc::new(SmsClassifier::new(settings.classifier_options()));
        debug!(
            enabled = settings.enabled,
            strict = settings.strict_mode,
            keywords = settings.custom_keywords.len(),
            "SMS filter settings updated"
        );
        *self.classifier.write() = classifier;
        *self.settings.write() = settings;
    }

    /// Classifies a message and records the outcome.
    ///
    /// A disabled filter lets everything through without counting.
    pub fn classify(&self, message: &SmsMessage) -> SpamDetectionResult {
        if !self.settings.read().enabled {
            return SpamDetectionResult::clean();
        }
        let classifier = self.classifier.read().clone();
        let result = classifier.classify(message);
        if result.is_spam {
            self.blocked.fetch_add(1, Ordering::Relaxed);
        } else {
            self.allowed.fetch_add(1, Ordering::Relaxed);
        }
        result
    }

    /// Classifies messages in order.
    pub fn classify_batch(&self, messages: &[SmsMessage]) -> Vec<SpamDetectionResult> {
        messages.iter().map(|m| self.classify(m)).collect()
    }

    /// Returns true if a message received at `timestamp` is past the
    /// auto-delete window at `now` (both epoch ms).
    pub fn is_expired(&self, timestamp: i64, now: i64) -> bool {
        match self.settings.read().auto_delete_days {
            Some(days) => now - timestamp > i64::from(days) * DAY_MILLIS,
            None => false,
        }
    }

    /// Current counters.
    pub fn stats(&self) -> FilterStats {
        FilterStats {
            blocked: self.blocked.load(Ordering::Relaxed),
            allowed: self.allowed.load(Ordering::Relaxed),
        }
    }

    /// Resets both counters to zero.
    pub fn reset_stats(&self) {
        self.blocked.store(0, Ordering::Relaxed);
        self.allowed.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::SpamCategory;

    fn spam() -> SmsMessage {
        SmsMessage::new("Kazandıran kupon linki: http://bit.ly/xyz", "905551234567")
    }

    #[test]
    fn counts_blocked_and_allowed() {
        let service = SmsFilterService::default();
        service.classify(&spam());
        service.classify(&SmsMessage::new("lunch?", "Mom"));
        service.classify(&spam());
        assert_eq!(service.stats(), FilterStats { blocked: 2, allowed: 1 });

        service.reset_stats();
        assert_eq!(service.stats(), FilterStats::default());
    }

    #[test]
    fn disabled_filter_passes_everything() {
        let service = SmsFilterService::new(FilterSettings {
            enabled: false,
            ..Default::default()
        });
        let result = service.classify(&spam());
        assert!(!result.is_spam);
        assert_eq!(result.category, SpamCategory::Normal);
        assert_eq!(service.stats(), FilterStats::default());
    }

    #[test]
    fn update_settings_rebuilds_classifier() {
        let service = SmsFilterService::default();
        let msg = SmsMessage::new("yeni bahis", "");
        assert!(!service.classify(&msg).is_spam);

        service.update_settings(FilterSettings {
            strict_mode: true,
            ..Default::default()
        });
        assert!(service.settings().strict_mode);
        assert!(service.classify(&msg).is_spam);
    }

    #[test]
    fn batch_counts_each_message() {
        let service = SmsFilterService::default();
        let results = service.classify_batch(&[spam(), spam(), SmsMessage::new("hi", "")]);
        assert_eq!(results.len(), 3);
        assert_eq!(service.stats().blocked, 2);
    }

    #[test]
    fn auto_delete_window() {
        let service = SmsFilterService::default();
        assert!(!service.is_expired(0, 100 * DAY_MILLIS));

        service.update_settings(FilterSettings {
            auto_delete_days: Some(7),
            ..Default::default()
        });
        assert!(service.is_expired(0, 8 * DAY_MILLIS));
        assert!(!service.is_expired(0, 6 * DAY_MILLIS));
    }

    #[test]
    fn settings_deserialize_with_defaults() {
        let settings: FilterSettings = serde_json::from_str(r#"{"strictMode":true}"#).unwrap();
        assert!(settings.enabled);
        assert!(settings.strict_mode);
        assert_eq!(settings.auto_delete_days, None);
    }
}
