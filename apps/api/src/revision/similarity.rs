//! Fuzzy text matching used to locate the bullet a proposed change targets when
//! the proposal was generated against slightly stale text.

use std::collections::HashSet;

/// Minimum score for a fuzzy candidate to be accepted.
pub const MATCH_THRESHOLD: f64 = 0.6;

/// Shorter string must be at least this many normalized chars before containment counts.
pub const MIN_CONTAINMENT_LEN: usize = 8;

/// Score assigned when one normalized string contains the other.
pub const CONTAINMENT_SCORE: f64 = 0.9;

/// Lowercases, drops everything outside `[a-z0-9\s]`, and collapses whitespace.
pub fn normalize(text: &str) -> String {
    let lowered = text.to_lowercase();
    let kept: String = lowered
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c.is_whitespace())
        .collect();
    kept.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Similarity in `[0, 1]` between two pieces of text.
///
/// Containment of the shorter normalized string in the longer one scores
/// [`CONTAINMENT_SCORE`] when the shorter side has at least
/// [`MIN_CONTAINMENT_LEN`] chars. Otherwise the score is the token-overlap
/// ratio: shared words divided by the size of the smaller word set.
pub fn similarity(a: &str, b: &str) -> f64 {
    let a = normalize(a);
    let b = normalize(b);
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a == b {
        return 1.0;
    }

    let (shorter, longer) = if a.len() <= b.len() { (&a, &b) } else { (&b, &a) };
    if shorter.len() >= MIN_CONTAINMENT_LEN && longer.contains(shorter.as_str()) {
        return CONTAINMENT_SCORE;
    }

    token_overlap(&a, &b)
}

/// |A ∩ B| / min(|A|, |B|) over whitespace-separated words of normalized input.
pub fn token_overlap(a: &str, b: &str) -> f64 {
    let words_a: HashSet<&str> = a.split_whitespace().collect();
    let words_b: HashSet<&str> = b.split_whitespace().collect();
    let smaller = words_a.len().min(words_b.len());
    if smaller == 0 {
        return 0.0;
    }
    let shared = words_a.intersection(&words_b).count();
    shared as f64 / smaller as f64
}
