//! Suspicious message patterns and sender-ID heuristics.

use std::sync::OnceLock;

use regex::{Regex, RegexSet};

use super::SpamCategory;

/// A message pattern and the category it hints at.
#[derive(Debug, Clone, Copy)]
pub struct SpamPattern {
    pub source: &'static str,
    pub category: SpamCategory,
    pub description: &'static str,
}

/// Built-in message patterns, all matched case-insensitively.
pub const SPAM_PATTERNS: &[SpamPattern] = &[
    SpamPattern {
        source: r"https?://[^\s]+",
        category: SpamCategory::Gambling,
        description: "Contains HTTP/HTTPS URL",
    },
    SpamPattern {
        source: r"(bit\.ly|tinyurl|goo\.gl|t\.co|ow\.ly|is\.gd|buff\.ly|adf\.ly|shorte\.st)[^\s]*",
        category: SpamCategory::Gambling,
        description: "Contains shortened URL service",
    },
    SpamPattern {
        source: r"(promo|kupon|code|kod)[\s:]*[A-Z0-9]{4,}",
        category: SpamCategory::Gambling,
        description: "Contains promo code pattern",
    },
    SpamPattern {
        source: r"\d{10,}",
        category: SpamCategory::Scam,
        description: "Contains long number sequence",
    },
    SpamPattern {
        source: r"(\d+[\.,]\d+\s*(TL|TRY|USD|EUR|£|\$)|₺\s*\d+)",
        category: SpamCategory::Advertisement,
        description: "Contains monetary amount",
    },
    SpamPattern {
        source: r"%\s*\d+|oran\s*[:=]\s*\d+|\d+\.\d+\s*oran",
        category: SpamCategory::Gambling,
        description: "Contains percentage or odds",
    },
    SpamPattern {
        source: r"(acil|hemen|şimdi|bugün|son gün|limited time|urgent|hurry|now)",
        category: SpamCategory::Advertisement,
        description: "Contains urgency language",
    },
    SpamPattern {
        source: r"(tıkla|click|üye ol|join|kayıt ol|register|başla|start)[\s\S]{0,50}(http|www|bit\.ly|link)",
        category: SpamCategory::Gambling,
        description: "Contains call-to-action with link",
    },
    SpamPattern {
        source: r"(kupon|ticket|bilet)[\s:]*#?\d{4,}",
        category: SpamCategory::Gambling,
        description: "Contains ticket or coupon number",
    },
    SpamPattern {
        source: r"(free\s*spin|ücretsiz\s*dönüş|free\s*bet|bedava\s*bahis)",
        category: SpamCategory::Gambling,
        description: "Contains free spin or free bet offer",
    },
    SpamPattern {
        source: r"(deposit|withdraw|çekim|yatırım|yükleme)\s*(bonus|fırsat|kampanya)?",
        category: SpamCategory::Gambling,
        description: "Contains deposit or withdrawal language",
    },
    SpamPattern {
        source: r"(vip|premium|özel\s*üye|high\s*roller)",
        category: SpamCategory::Gambling,
        description: "Contains VIP membership language",
    },
    SpamPattern {
        source: r"(telegram|whatsapp|signal)\s*(link|grup|group)",
        category: SpamCategory::Scam,
        description: "Contains messaging group invite",
    },
    SpamPattern {
        source: r"(casino|bet|bahis|slot)\s*(link|giriş|site|adres|domain)",
        category: SpamCategory::Gambling,
        description: "Contains gambling site access language",
    },
    SpamPattern {
        source: r"(bonus|promo|kampanya)\s*(kodu|code)\s*[:=]?\s*[A-Z0-9]{4,}",
        category: SpamCategory::Gambling,
        description: "Contains bonus code",
    },
    SpamPattern {
        source: r"(canlı|live)\s*(casino|bet|bahis)",
        category: SpamCategory::Gambling,
        description: "Contains live betting language",
    },
];

/// Compiled message patterns.
pub struct PatternScanner {
    set: RegexSet,
}

impl Default for PatternScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl PatternScanner {
    /// Compiles [`SPAM_PATTERNS`].
    pub fn new() -> Self {
        let sources = SPAM_PATTERNS.iter().map(|p| format!("(?i){}", p.source));
        Self {
            set: RegexSet::new(sources).expect("built-in spam patterns are valid"),
        }
    }

    /// Returns the patterns that match, in table order.
    pub fn scan(&self, body: &str) -> Vec<&'static SpamPattern> {
        self.set
            .matches(body)
            .into_iter()
            .map(|idx| &SPAM_PATTERNS[idx])
            .collect()
    }
}

/// Returns true if the body contains a URL or `www.` link.
pub fn has_url(body: &str) -> bool {
    static URL_RE: OnceLock<Regex> = OnceLock::new();
    URL_RE
        .get_or_init(|| Regex::new(r"(?i)https?://|www\.").expect("url regex is valid"))
        .is_match(body)
}

/// Result of sender-ID analysis.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SenderAnalysis {
    pub is_suspicious: bool,
    pub reasons: Vec<String>,
}

struct SenderRules {
    long_number: Regex,
    numeric: Regex,
    alphanumeric: Regex,
    bulk: Regex,
}

fn sender_rules() -> &'static SenderRules {
    static RULES: OnceLock<SenderRules> = OnceLock::new();
    RULES.get_or_init(|| SenderRules {
        long_number: Regex::new(r"^\d{10,}$").expect("valid"),
        numeric: Regex::new(r"^\d+$").expect("valid"),
        alphanumeric: Regex::new(r"(?i)^[A-Z0-9]{6,}$").expect("valid"),
        bulk: Regex::new(r"^(\+?\d{1,3})?\d{8,}$").expect("valid"),
    })
}

/// Flags sender IDs shaped like bulk or throwaway senders.
///
/// Raises suspicion only; never assigns a category.
pub fn analyze_sender(sender: &str) -> SenderAnalysis {
    let rules = sender_rules();
    let mut reasons = Vec::new();

    if rules.long_number.is_match(sender) {
        reasons.push("Sender is a long number sequence".to_string());
    }
    if rules.numeric.is_match(sender) && sender.len() >= 6 {
        reasons.push("Sender is numeric only".to_string());
    }
    if rules.alphanumeric.is_match(sender) && !sender.contains(' ') && !sender.contains('-') {
        reasons.push("Sender has unusual alphanumeric pattern".to_string());
    }
    if rules.bulk.is_match(sender) {
        reasons.push("Sender resembles bulk SMS number".to_string());
    }

    SenderAnalysis {
        is_suspicious: !reasons.is_empty(),
        reasons,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptions(body: &str) -> Vec<&'static str> {
        PatternScanner::new()
            .scan(body)
            .into_iter()
            .map(|p| p.description)
            .collect()
    }

    #[test]
    fn detects_url_shortener_and_promo() {
        let hits = descriptions("kazandıran kupon linki: http://bit.ly/xyz");
        assert_eq!(
            hits,
            vec![
                "Contains HTTP/HTTPS URL",
                "Contains shortened URL service",
                "Contains promo code pattern",
            ]
        );
    }

    #[test]
    fn detects_money_and_odds() {
        let hits = descriptions("sadece 99,90 tl! oran: 5");
        assert!(hits.contains(&"Contains monetary amount"));
        assert!(hits.contains(&"Contains percentage or odds"));
    }

    #[test]
    fn detects_live_betting_and_site_access() {
        let hits = descriptions("canlı bahis giriş adresi");
        assert!(hits.contains(&"Contains live betting language"));
        assert!(hits.contains(&"Contains gambling site access language"));
    }

    #[test]
    fn plain_message_has_no_patterns() {
        assert!(descriptions("see you at dinner").is_empty());
    }

    #[test]
    fn url_detection() {
        assert!(has_url("visit www.example.com"));
        assert!(has_url("HTTPS://x.y"));
        assert!(!has_url("no links here"));
    }

    #[test]
    fn numeric_sender_is_suspicious() {
        let analysis = analyze_sender("905551234567");
        assert!(analysis.is_suspicious);
        assert_eq!(analysis.reasons.len(), 4);
    }

    #[test]
    fn named_sender_is_not_suspicious() {
        let analysis = analyze_sender("Mom");
        assert!(!analysis.is_suspicious);
        assert!(analysis.reasons.is_empty());

        assert!(!analyze_sender("MY-BANK").is_suspicious);
    }

    #[test]
    fn alphanumeric_sender_code() {
        let analysis = analyze_sender("BETWIN777");
        assert_eq!(
            analysis.reasons,
            vec!["Sender has unusual alphanumeric pattern".to_string()]
        );
    }
}
