//! Degraded-mode scoring: a cheap keyword-overlap estimate used when the full
//! analyzer run is unavailable (timeout, worker failure, or no analyzer output).

use crate::ats::text::fallback_keywords;
use crate::ats::types::{AtsScoreOutput, ScoreMetadata};

const MAX_FALLBACK_KEYWORDS: usize = 50;
const MAX_MISSING_KEYWORDS: usize = 20;
const DEGRADED_CONFIDENCE: f64 = 0.5;

fn match_ratio(keywords: &[String], resume_text: &str) -> f64 {
    if keywords.is_empty() {
        return 0.0;
    }
    let haystack = resume_text.to_lowercase();
    let matched = keywords.iter().filter(|k| haystack.contains(k.as_str())).count();
    matched as f64 / keywords.len() as f64
}

fn to_score(value: f64) -> u8 {
    value.round().clamp(0.0, 100.0) as u8
}

fn estimate(keywords: &[String], text: &str) -> f64 {
    40.0 + match_ratio(keywords, text) * 45.0
}

/// Keyword-overlap estimate for a single text, in 40..=85.
pub fn keyword_estimate(text: &str, job_text: Option<&str>) -> u8 {
    let keywords = fallback_keywords(job_text.unwrap_or_default(), MAX_FALLBACK_KEYWORDS);
    to_score(estimate(&keywords, text))
}

/// Deterministic estimate with the same output shape as a full run. The
/// optimized score is always at least five points above the original.
pub fn degraded_score(before: &str, after: &str, job_text: Option<&str>) -> AtsScoreOutput {
    let keywords = fallback_keywords(job_text.unwrap_or_default(), MAX_FALLBACK_KEYWORDS);
    let ratio_after = match_ratio(&keywords, after);

    let original = estimate(&keywords, before);
    let optimized = (original + 5.0).max(45.0 + ratio_after * 45.0);

    let after_lower = after.to_lowercase();
    let missing_keywords = keywords
        .iter()
        .filter(|k| !after_lower.contains(k.as_str()))
        .take(MAX_MISSING_KEYWORDS)
        .cloned()
        .collect();

    AtsScoreOutput {
        ats_score_original: to_score(original),
        ats_score_optimized: to_score(optimized),
        subscores: None,
        subscores_original: None,
        suggestions: Vec::new(),
        confidence: DEGRADED_CONFIDENCE,
        missing_keywords,
        metadata: ScoreMetadata {
            degraded: true,
            warnings: vec!["full scoring unavailable; keyword-overlap estimate returned".to_string()],
            ..ScoreMetadata::default()
        },
    }
}
