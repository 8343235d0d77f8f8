//! Keyword lists and whole-word keyword matching.

use regex::Regex;

/// Keywords in the two supported languages.
#[derive(Debug, Clone, Copy)]
pub struct KeywordList {
    pub turkish: &'static [&'static str],
    pub english: &'static [&'static str],
}

impl KeywordList {
    /// Iterates both languages.
    pub fn iter(&self) -> impl Iterator<Item = &'static str> {
        self.turkish.iter().chain(self.english.iter()).copied()
    }
}

pub const GAMBLING_KEYWORDS: KeywordList = KeywordList {
    turkish: &[
        "bahis",
        "kumar",
        "kupon",
        "kazandıran",
        "iddaa",
        "canlı bahis",
        "bedava bahis",
        "deneme bonusu",
        "yatırım bonusu",
        "hoşgeldin bonusu",
        "çevrimsiz",
        "rulet",
        "slot",
        "freebet",
    ],
    english: &[
        "bet",
        "betting",
        "casino",
        "gamble",
        "gambling",
        "poker",
        "slots",
        "roulette",
        "jackpot",
        "free spins",
        "free bet",
        "bonus",
        "odds",
        "sportsbook",
        "wager",
        "blackjack",
    ],
};

pub const SCAM_KEYWORDS: KeywordList = KeywordList {
    turkish: &[
        "hesabınız",
        "şifre",
        "şifrenizi",
        "doğrulama",
        "askıya",
        "bloke",
        "kimlik bilgileri",
        "ödül kazandınız",
        "tebrikler",
        "icra",
        "borcunuz",
    ],
    english: &[
        "verify your account",
        "account suspended",
        "password",
        "winner",
        "congratulations",
        "claim your",
        "prize",
        "refund",
        "bank details",
        "gift card",
    ],
};

pub const ADVERTISEMENT_KEYWORDS: KeywordList = KeywordList {
    turkish: &[
        "indirim",
        "kampanya",
        "fırsat",
        "ücretsiz",
        "kazan",
        "abone",
        "sipariş",
        "mağaza",
    ],
    english: &[
        "sale",
        "discount",
        "offer",
        "free",
        "shop",
        "subscribe",
        "deal",
        "coupon",
    ],
};

/// Every built-in keyword, for display or export.
pub fn all_keywords() -> Vec<&'static str> {
    GAMBLING_KEYWORDS
        .iter()
        .chain(SCAM_KEYWORDS.iter())
        .chain(ADVERTISEMENT_KEYWORDS.iter())
        .collect()
}

struct CompiledKeyword {
    keyword: String,
    lowered: String,
    word: Regex,
}

/// A precompiled keyword bucket.
///
/// A keyword hits when it appears as a whole word, or, for multi-word
/// phrases, anywhere as a substring.
pub struct KeywordMatcher {
    keywords: Vec<CompiledKeyword>,
}

impl KeywordMatcher {
    /// Compiles a bucket of keywords.
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keywords = keywords
            .into_iter()
            .filter_map(|kw| {
                let keyword = kw.as_ref().trim().to_string();
                if keyword.is_empty() {
                    return None;
                }
                let lowered = keyword.to_lowercase();
                let word = Regex::new(&format!(r"(?i)\b{}\b", regex::escape(&lowered))).ok()?;
                Some(CompiledKeyword {
                    keyword,
                    lowered,
                    word,
                })
            })
            .collect();
        Self { keywords }
    }

    /// Returns the keywords that hit, in list order.
    pub fn find(&self, body: &str) -> Vec<String> {
        self.keywords
            .iter()
            .filter(|k| {
                k.word.is_match(body) || (k.lowered.contains(' ') && body.contains(&k.lowered))
            })
            .map(|k| k.keyword.clone())
            .collect()
    }

    /// Number of keywords in the bucket.
    pub fn len(&self) -> usize {
        self.keywords.len()
    }

    /// Returns true if the bucket is empty.
    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty()
    }
}
