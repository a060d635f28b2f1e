use serde::{Deserialize, Serialize};

use crate::ats::analyzers::Dimension;

/// Per-dimension scores. A `None` means that dimension's analyzer failed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubScores {
    pub keyword_exact: Option<u8>,
    pub keyword_phrase: Option<u8>,
    pub semantic_relevance: Option<u8>,
    pub title_alignment: Option<u8>,
    pub metrics_presence: Option<u8>,
    pub section_completeness: Option<u8>,
    pub format_parseability: Option<u8>,
    pub recency_fit: Option<u8>,
}

impl SubScores {
    pub fn get(&self, dimension: Dimension) -> Option<u8> {
        match dimension {
            Dimension::KeywordExact => self.keyword_exact,
            Dimension::KeywordPhrase => self.keyword_phrase,
            Dimension::SemanticRelevance => self.semantic_relevance,
            Dimension::TitleAlignment => self.title_alignment,
            Dimension::MetricsPresence => self.metrics_presence,
            Dimension::SectionCompleteness => self.section_completeness,
            Dimension::FormatParseability => self.format_parseability,
            Dimension::RecencyFit => self.recency_fit,
        }
    }

    pub fn set(&mut self, dimension: Dimension, score: Option<u8>) {
        let slot = match dimension {
            Dimension::KeywordExact => &mut self.keyword_exact,
            Dimension::KeywordPhrase => &mut self.keyword_phrase,
            Dimension::SemanticRelevance => &mut self.semantic_relevance,
            Dimension::TitleAlignment => &mut self.title_alignment,
            Dimension::MetricsPresence => &mut self.metrics_presence,
            Dimension::SectionCompleteness => &mut self.section_completeness,
            Dimension::FormatParseability => &mut self.format_parseability,
            Dimension::RecencyFit => &mut self.recency_fit,
        };
        *slot = score;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionCategory {
    Keywords,
    Alignment,
    Relevance,
    Metrics,
    Structure,
    Formatting,
    Recency,
}

impl SuggestionCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            SuggestionCategory::Keywords => "keywords",
            SuggestionCategory::Alignment => "alignment",
            SuggestionCategory::Relevance => "relevance",
            SuggestionCategory::Metrics => "metrics",
            SuggestionCategory::Structure => "structure",
            SuggestionCategory::Formatting => "formatting",
            SuggestionCategory::Recency => "recency",
        }
    }

    /// Relative effort to act on a suggestion: 1 low, 2 medium, 3 high.
    pub fn effort(self) -> u32 {
        match self {
            SuggestionCategory::Keywords
            | SuggestionCategory::Structure
            | SuggestionCategory::Formatting => 1,
            SuggestionCategory::Alignment => 2,
            SuggestionCategory::Metrics
            | SuggestionCategory::Relevance
            | SuggestionCategory::Recency => 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub id: String,
    pub text: String,
    pub estimated_gain: u32,
    pub quick_win: bool,
    pub category: SuggestionCategory,
    pub targets: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreMetadata {
    pub processing_time_ms: u64,
    pub analyzers_run: Vec<Dimension>,
    pub analyzers_failed: Vec<Dimension>,
    pub warnings: Vec<String>,
    pub degraded: bool,
    pub cache_hit: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AtsScoreOutput {
    pub ats_score_original: u8,
    pub ats_score_optimized: u8,
    /// `None` in degraded mode.
    pub subscores: Option<SubScores>,
    pub subscores_original: Option<SubScores>,
    pub suggestions: Vec<Suggestion>,
    pub confidence: f64,
    pub missing_keywords: Vec<String>,
    pub metadata: ScoreMetadata,
}

/// The optimized score annotated with its change against a baseline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreDelta {
    pub score: u8,
    pub before: u8,
    pub delta: i32,
    pub missing_keywords: Vec<String>,
    pub recommendations: Vec<String>,
}

impl ScoreDelta {
    /// `before` is the caller's baseline when one is supplied, otherwise the
    /// engine's own score for the original text.
    pub fn from_output(output: &AtsScoreOutput, baseline: Option<u8>) -> Self {
        let before = baseline.unwrap_or(output.ats_score_original);
        Self {
            score: output.ats_score_optimized,
            before,
            delta: i32::from(output.ats_score_optimized) - i32::from(before),
            missing_keywords: output.missing_keywords.clone(),
            recommendations: output.suggestions.iter().map(|s| s.text.clone()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output(original: u8, optimized: u8) -> AtsScoreOutput {
        AtsScoreOutput {
            ats_score_original: original,
            ats_score_optimized: optimized,
            subscores: None,
            subscores_original: None,
            suggestions: vec![Suggestion {
                id: "keywords".to_string(),
                text: "Add missing keywords".to_string(),
                estimated_gain: 4,
                quick_win: true,
                category: SuggestionCategory::Keywords,
                targets: vec!["kafka".to_string()],
            }],
            confidence: 0.8,
            missing_keywords: vec!["kafka".to_string()],
            metadata: ScoreMetadata::default(),
        }
    }

    #[test]
    fn test_delta_uses_baseline_when_supplied() {
        let delta = ScoreDelta::from_output(&output(50, 72), Some(80));
        assert_eq!(delta.before, 80);
        assert_eq!(delta.delta, -8);
        assert_eq!(delta.recommendations, vec!["Add missing keywords"]);
    }

    #[test]
    fn test_delta_falls_back_to_original_score() {
        let delta = ScoreDelta::from_output(&output(50, 72), None);
        assert_eq!(delta.before, 50);
        assert_eq!(delta.delta, 22);
    }

    #[test]
    fn test_subscores_get_set_round_trip_every_dimension() {
        let mut scores = SubScores::default();
        for (i, d) in Dimension::ALL.iter().enumerate() {
            scores.set(*d, Some(i as u8 * 10));
        }
        for (i, d) in Dimension::ALL.iter().enumerate() {
            assert_eq!(scores.get(*d), Some(i as u8 * 10));
        }
    }

    #[test]
    fn test_failed_dimension_serializes_as_null() {
        let mut scores = SubScores::default();
        scores.set(Dimension::RecencyFit, Some(64));
        let value = serde_json::to_value(&scores).unwrap();
        assert_eq!(value["recency_fit"], 64);
        assert!(value["keyword_exact"].is_null());
    }
}
