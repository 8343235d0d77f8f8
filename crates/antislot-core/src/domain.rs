//! Hostname normalization helpers.
//!
//! Every component that compares domains (store, matcher, suggestor, client)
//! funnels its input through these functions so that `https://www.BET365.com/x`
//! and `bet365.com` compare equal.

use std::sync::OnceLock;

use regex::Regex;

/// Normalizes a URL or hostname into a bare, lowercase domain.
///
/// Strips the scheme, userinfo, path, query, fragment, port, a leading `www.`
/// and any trailing dot.
///
/// # Examples
///
/// ```
/// use antislot_core::domain::normalize_domain;
///
/// assert_eq!(normalize_domain("https://www.BET365.com/sports"), "bet365.com");
/// assert_eq!(normalize_domain("casino.example:8443"), "casino.example");
/// ```
pub fn normalize_domain(input: &str) -> String {
    let mut host = input.trim();

    if let Some(idx) = host.find("://") {
        host = &host[idx + 3..];
    }

    // Cut at the first path/query/fragment delimiter.
    if let Some(idx) = host.find(['/', '?', '#']) {
        host = &host[..idx];
    }

    if let Some(idx) = host.rfind('@') {
        host = &host[idx + 1..];
    }

    // Remove port
    if let Some((name, port)) = host.rsplit_once(':') {
        if port.chars().all(|c| c.is_ascii_digit()) {
            host = name;
        }
    }

    let host = host.trim_end_matches('.').to_lowercase();
    match host.strip_prefix("www.") {
        Some(rest) => rest.to_string(),
        None => host,
    }
}

/// Lowercases and trims a domain without URL parsing.
///
/// This is the key normalization used by the rule store.
pub fn canonical_key(domain: &str) -> String {
    domain.trim().to_lowercase()
}

/// Returns the base domain: the last two dot-separated labels.
///
/// ```
/// use antislot_core::domain::root_domain;
///
/// assert_eq!(root_domain("sub.bet365.com"), "bet365.com");
/// assert_eq!(root_domain("localhost"), "localhost");
/// ```
pub fn root_domain(domain: &str) -> &str {
    let mut dots = domain.rmatch_indices('.');
    match (dots.next(), dots.next()) {
        (Some(_), Some((idx, _))) => &domain[idx + 1..],
        _ => domain,
    }
}

/// Iterates a domain and each parent suffix: `a.b.com`, `b.com`, `com`.
pub fn suffixes(domain: &str) -> impl Iterator<Item = &str> {
    std::iter::once(domain).chain(
        domain
            .match_indices('.')
            .map(move |(idx, _)| &domain[idx + 1..]),
    )
}

/// Returns the first label of a domain (`bet365` for `bet365.com`).
pub fn first_label(domain: &str) -> &str {
    domain.split('.').next().unwrap_or(domain)
}

/// Checks whether a string looks like a registrable domain name.
///
/// Used to filter observed-domain input files before scoring.
pub fn is_plausible_domain(domain: &str) -> bool {
    static DOMAIN_RE: OnceLock<Regex> = OnceLock::new();
    let re = DOMAIN_RE.get_or_init(|| {
        Regex::new(r"(?i)^[a-z0-9.-]+\.[a-z]{2,}$").expect("domain regex is valid")
    });
    re.is_match(domain)
}
