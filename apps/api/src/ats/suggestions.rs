//! Turns weak sub-scores into ranked, merged improvement suggestions.

use std::collections::{BTreeMap, HashSet};

use crate::ats::analyzers::Dimension;
use crate::ats::text::{tokenize, AnalysisText, JobProfile};
use crate::ats::types::{SubScores, Suggestion, SuggestionCategory};

/// Dimensions at or above this score produce no suggestion.
const SUGGESTION_THRESHOLD: u8 = 90;
const MAX_TARGETS: usize = 5;

pub fn category_for(dimension: Dimension) -> SuggestionCategory {
    match dimension {
        Dimension::KeywordExact | Dimension::KeywordPhrase => SuggestionCategory::Keywords,
        Dimension::SemanticRelevance => SuggestionCategory::Relevance,
        Dimension::TitleAlignment => SuggestionCategory::Alignment,
        Dimension::MetricsPresence => SuggestionCategory::Metrics,
        Dimension::SectionCompleteness => SuggestionCategory::Structure,
        Dimension::FormatParseability => SuggestionCategory::Formatting,
        Dimension::RecencyFit => SuggestionCategory::Recency,
    }
}

fn advice(dimension: Dimension) -> &'static str {
    match dimension {
        Dimension::KeywordExact => "Add the job's key terms where they honestly describe your experience",
        Dimension::KeywordPhrase => "Reuse the job's multi-word phrases verbatim",
        Dimension::SemanticRelevance => "Shift emphasis toward the responsibilities the job describes",
        Dimension::TitleAlignment => "Mirror the target job title in your headline or summary",
        Dimension::MetricsPresence => "Quantify achievements with numbers, percentages, or amounts",
        Dimension::SectionCompleteness => "Add the missing standard sections and contact details",
        Dimension::FormatParseability => "Remove tables, tabs, and decorative symbols",
        Dimension::RecencyFit => "Lead with your most recent, dated experience",
    }
}

fn targets_for(dimension: Dimension, resume: &AnalysisText, job: Option<&JobProfile>) -> Vec<String> {
    let Some(job) = job else {
        return Vec::new();
    };
    match dimension {
        Dimension::KeywordExact => job.missing_keywords(resume, MAX_TARGETS),
        Dimension::KeywordPhrase => {
            let present = resume.bigram_set();
            job.phrases
                .iter()
                .filter(|p| !present.contains(*p))
                .take(MAX_TARGETS)
                .cloned()
                .collect()
        }
        Dimension::TitleAlignment => {
            let headline: HashSet<String> = resume
                .lines
                .iter()
                .take(10)
                .flat_map(|l| tokenize(l))
                .collect();
            job.title_tokens
                .iter()
                .filter(|t| !headline.contains(*t))
                .cloned()
                .collect()
        }
        _ => Vec::new(),
    }
}

fn estimated_gain(dimension: Dimension, score: u8) -> u32 {
    let gap = f64::from(100 - score.min(100));
    ((gap * dimension.weight()).round() as u32).max(1)
}

fn is_quick_win(gain: u32, category: SuggestionCategory) -> bool {
    f64::from(gain) / f64::from(category.effort()) >= 2.0
}

/// One suggestion per dimension scoring below the threshold, merged by
/// category and ranked by estimated gain (descending), then id.
pub fn build_suggestions(
    subscores: &SubScores,
    resume: &AnalysisText,
    job: Option<&JobProfile>,
) -> Vec<Suggestion> {
    let raw = Dimension::ALL.iter().filter_map(|&dimension| {
        let score = subscores.get(dimension)?;
        if score >= SUGGESTION_THRESHOLD {
            return None;
        }
        let category = category_for(dimension);
        let gain = estimated_gain(dimension, score);
        Some(Suggestion {
            id: category.as_str().to_string(),
            text: advice(dimension).to_string(),
            estimated_gain: gain,
            quick_win: is_quick_win(gain, category),
            category,
            targets: targets_for(dimension, resume, job),
        })
    });

    let mut merged = merge_by_category(raw);
    merged.sort_by(|a, b| {
        b.estimated_gain
            .cmp(&a.estimated_gain)
            .then_with(|| a.id.cmp(&b.id))
    });
    merged
}

/// Gains are summed, targets unioned in order, quick_win OR'ed.
fn merge_by_category(suggestions: impl Iterator<Item = Suggestion>) -> Vec<Suggestion> {
    let mut by_category: BTreeMap<SuggestionCategory, Suggestion> = BTreeMap::new();
    for suggestion in suggestions {
        match by_category.get_mut(&suggestion.category) {
            Some(existing) => {
                existing.estimated_gain += suggestion.estimated_gain;
                existing.quick_win |= suggestion.quick_win;
                existing.text = format!("{}; {}", existing.text, suggestion.text);
                for target in suggestion.targets {
                    if !existing.targets.contains(&target) {
                        existing.targets.push(target);
                    }
                }
            }
            None => {
                by_category.insert(suggestion.category, suggestion);
            }
        }
    }
    by_category.into_values().collect()
}
