//! Edit-distance similarity.

/// Levenshtein distance over Unicode scalar values.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    // Two-row dynamic programming.
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// Normalized similarity `1 - distance / max(len)` in `[0, 1]`.
///
/// Two empty strings are identical (1.0); one empty string is 0.0.
pub fn similarity(a: &str, b: &str) -> f64 {
    let len_a = a.chars().count();
    let len_b = b.chars().count();

    if len_a == 0 {
        return if len_b == 0 { 1.0 } else { 0.0 };
    }
    if len_b == 0 {
        return 0.0;
    }

    let max_len = len_a.max(len_b) as f64;
    1.0 - levenshtein(a, b) as f64 / max_len
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_basics() {
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("abc", ""), 3);
        assert_eq!(levenshtein("same", "same"), 0);
        assert_eq!(levenshtein("bet-365x.net", "bet365.com"), 5);
    }

    #[test]
    fn similarity_is_reflexive() {
        for s in ["", "a", "bet365.com", "çekim.net"] {
            assert_eq!(similarity(s, s), 1.0);
        }
    }

    #[test]
    fn similarity_is_symmetric() {
        let pairs = [
            ("bet365.com", "bet-365x.net"),
            ("casino.com", "casinos.org"),
            ("", "abc"),
            ("betway.com", "wayb.et"),
        ];
        for (a, b) in pairs {
            assert_eq!(similarity(a, b), similarity(b, a), "{a} vs {b}");
        }
    }

    #[test]
    fn similarity_is_bounded() {
        assert_eq!(similarity("abc", ""), 0.0);
        assert_eq!(similarity("abc", "xyz"), 0.0);
        let s = similarity("bet-365x.net", "bet365.com");
        assert!((s - 7.0 / 12.0).abs() < 1e-9);
    }
}
