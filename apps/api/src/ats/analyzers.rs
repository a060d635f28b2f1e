//! The eight ATS analyzers. Each one measures a single dimension on a 0–100
//! scale and knows nothing about the others; the engine runs them in isolation.

use std::collections::HashSet;

use chrono::{Datelike, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ats::text::{tokenize, AnalysisText, JobProfile};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    KeywordExact,
    KeywordPhrase,
    SemanticRelevance,
    TitleAlignment,
    MetricsPresence,
    SectionCompleteness,
    FormatParseability,
    RecencyFit,
}

impl Dimension {
    pub const ALL: [Dimension; 8] = [
        Dimension::KeywordExact,
        Dimension::KeywordPhrase,
        Dimension::SemanticRelevance,
        Dimension::TitleAlignment,
        Dimension::MetricsPresence,
        Dimension::SectionCompleteness,
        Dimension::FormatParseability,
        Dimension::RecencyFit,
    ];

    /// Composite weight. The eight weights sum to 1.0.
    pub fn weight(self) -> f64 {
        match self {
            Dimension::KeywordExact => 0.22,
            Dimension::KeywordPhrase => 0.12,
            Dimension::SemanticRelevance => 0.15,
            Dimension::TitleAlignment => 0.10,
            Dimension::MetricsPresence => 0.12,
            Dimension::SectionCompleteness => 0.12,
            Dimension::FormatParseability => 0.09,
            Dimension::RecencyFit => 0.08,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Dimension::KeywordExact => "keyword_exact",
            Dimension::KeywordPhrase => "keyword_phrase",
            Dimension::SemanticRelevance => "semantic_relevance",
            Dimension::TitleAlignment => "title_alignment",
            Dimension::MetricsPresence => "metrics_presence",
            Dimension::SectionCompleteness => "section_completeness",
            Dimension::FormatParseability => "format_parseability",
            Dimension::RecencyFit => "recency_fit",
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum AnalyzerError {
    #[error("job description text is required")]
    MissingJobText,

    #[error("insufficient input: {0}")]
    InsufficientInput(String),

    #[error("analyzer produced out-of-range score {0}")]
    InvalidOutput(f64),

    #[error("analyzer panicked: {0}")]
    Panicked(String),
}

/// A single scoring dimension. Returns a score in `[0, 100]`.
pub trait Analyzer: Send + Sync {
    fn dimension(&self) -> Dimension;

    fn analyze(&self, resume: &AnalysisText, job: Option<&JobProfile>) -> Result<f64, AnalyzerError>;
}

/// The production analyzer set, one per dimension.
pub fn default_analyzers() -> Vec<Box<dyn Analyzer>> {
    vec![
        Box::new(KeywordExact),
        Box::new(KeywordPhrase),
        Box::new(SemanticRelevance),
        Box::new(TitleAlignment),
        Box::new(MetricsPresence),
        Box::new(SectionCompleteness),
        Box::new(FormatParseability),
        Box::new(RecencyFit::current()),
    ]
}

fn require_job(job: Option<&JobProfile>) -> Result<&JobProfile, AnalyzerError> {
    match job {
        Some(j) if !j.text.is_blank() => Ok(j),
        _ => Err(AnalyzerError::MissingJobText),
    }
}

fn require_resume(resume: &AnalysisText) -> Result<(), AnalyzerError> {
    if resume.is_blank() {
        Err(AnalyzerError::InsufficientInput("resume text is empty".to_string()))
    } else {
        Ok(())
    }
}

fn ratio_score(hits: f64, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        (hits / total as f64 * 100.0).clamp(0.0, 100.0)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Keyword dimensions
// ────────────────────────────────────────────────────────────────────────────

/// Share of job keywords that appear verbatim as resume tokens.
pub struct KeywordExact;

impl Analyzer for KeywordExact {
    fn dimension(&self) -> Dimension {
        Dimension::KeywordExact
    }

    fn analyze(&self, resume: &AnalysisText, job: Option<&JobProfile>) -> Result<f64, AnalyzerError> {
        let job = require_job(job)?;
        require_resume(resume)?;
        if job.keywords.is_empty() {
            return Err(AnalyzerError::InsufficientInput(
                "job text has no keywords".to_string(),
            ));
        }
        let hits = job
            .keywords
            .iter()
            .filter(|k| resume.token_set.contains(*k))
            .count();
        Ok(ratio_score(hits as f64, job.keywords.len()))
    }
}

/// Share of recurring two-word job phrases reproduced in the resume.
pub struct KeywordPhrase;

impl Analyzer for KeywordPhrase {
    fn dimension(&self) -> Dimension {
        Dimension::KeywordPhrase
    }

    fn analyze(&self, resume: &AnalysisText, job: Option<&JobProfile>) -> Result<f64, AnalyzerError> {
        let job = require_job(job)?;
        require_resume(resume)?;
        if job.phrases.is_empty() {
            return Err(AnalyzerError::InsufficientInput(
                "job text has no multi-word phrases".to_string(),
            ));
        }
        let resume_phrases = resume.bigram_set();
        let hits = job
            .phrases
            .iter()
            .filter(|p| resume_phrases.contains(*p))
            .count();
        Ok(ratio_score(hits as f64, job.phrases.len()))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Relevance and alignment
// ────────────────────────────────────────────────────────────────────────────

/// Cosine similarity of term-frequency vectors, square-root scaled so that
/// partially overlapping documents don't collapse toward zero.
pub struct SemanticRelevance;

impl Analyzer for SemanticRelevance {
    fn dimension(&self) -> Dimension {
        Dimension::SemanticRelevance
    }

    fn analyze(&self, resume: &AnalysisText, job: Option<&JobProfile>) -> Result<f64, AnalyzerError> {
        let job = require_job(job)?;
        let resume_tf = resume.term_frequencies();
        let job_tf = job.text.term_frequencies();
        if resume_tf.is_empty() || job_tf.is_empty() {
            return Err(AnalyzerError::InsufficientInput(
                "no content terms to compare".to_string(),
            ));
        }

        let dot: f64 = job_tf
            .iter()
            .filter_map(|(term, jw)| resume_tf.get(term).map(|rw| rw * jw))
            .sum();
        let cosine = dot / (l2_norm(resume_tf.values()) * l2_norm(job_tf.values()));
        Ok((cosine.sqrt() * 100.0).clamp(0.0, 100.0))
    }
}

fn l2_norm<'a>(weights: impl Iterator<Item = &'a f64>) -> f64 {
    weights.map(|v| v * v).sum::<f64>().sqrt()
}

/// Lines at the top of the resume that count as its headline.
const HEADLINE_LINES: usize = 10;

/// How well the resume echoes the job title. Tokens found in the headline area
/// earn full credit; tokens found only further down earn half.
pub struct TitleAlignment;

impl Analyzer for TitleAlignment {
    fn dimension(&self) -> Dimension {
        Dimension::TitleAlignment
    }

    fn analyze(&self, resume: &AnalysisText, job: Option<&JobProfile>) -> Result<f64, AnalyzerError> {
        let job = require_job(job)?;
        require_resume(resume)?;
        if job.title_tokens.is_empty() {
            return Err(AnalyzerError::InsufficientInput(
                "job title not found".to_string(),
            ));
        }

        let headline: HashSet<String> = resume
            .lines
            .iter()
            .take(HEADLINE_LINES)
            .flat_map(|l| tokenize(l))
            .collect();

        let credit: f64 = job
            .title_tokens
            .iter()
            .map(|t| {
                if headline.contains(t) {
                    1.0
                } else if resume.token_set.contains(t) {
                    0.5
                } else {
                    0.0
                }
            })
            .sum();
        Ok(ratio_score(credit, job.title_tokens.len()))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Content quality
// ────────────────────────────────────────────────────────────────────────────

/// True when an achievement carries a concrete measure: a number, a percentage,
/// a currency amount, or an explicit `[LOW_METRICS]` marker.
pub fn is_quantified(text: &str) -> bool {
    text.chars().any(|c| c.is_ascii_digit())
        || text.contains("[LOW_METRICS]")
        || text.contains('%')
        || text.contains('$')
        || text.contains('€')
        || text.contains('£')
}

fn bullet_lines(resume: &AnalysisText) -> Vec<&str> {
    resume
        .lines
        .iter()
        .filter_map(|l| {
            l.strip_prefix("- ")
                .or_else(|| l.strip_prefix("* "))
                .or_else(|| l.strip_prefix("• "))
        })
        .collect()
}

/// Share of achievement bullets that are quantified. Falls back to sentences of
/// four or more words when the text has no bullet lines.
pub struct MetricsPresence;

impl Analyzer for MetricsPresence {
    fn dimension(&self) -> Dimension {
        Dimension::MetricsPresence
    }

    fn analyze(&self, resume: &AnalysisText, _job: Option<&JobProfile>) -> Result<f64, AnalyzerError> {
        require_resume(resume)?;
        let mut candidates = bullet_lines(resume);
        if candidates.is_empty() {
            candidates = resume
                .raw
                .split(['.', '\n'])
                .map(str::trim)
                .filter(|s| s.split_whitespace().count() >= 4)
                .collect();
        }
        if candidates.is_empty() {
            return Err(AnalyzerError::InsufficientInput(
                "no achievements to evaluate".to_string(),
            ));
        }
        let quantified = candidates.iter().filter(|c| is_quantified(c)).count();
        Ok(ratio_score(quantified as f64, candidates.len()))
    }
}

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").expect("valid regex"));
static PHONE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\+?\d[\d\s().-]{7,}\d").expect("valid regex"));

const SECTION_WEIGHTS: &[(&str, f64, &[&str])] = &[
    (
        "experience",
        0.30,
        &["experience", "work experience", "professional experience", "employment", "employment history", "work history"],
    ),
    ("skills", 0.20, &["skills", "technical skills", "core competencies", "competencies"]),
    ("education", 0.15, &["education", "academic background"]),
    ("summary", 0.15, &["summary", "professional summary", "profile", "about", "objective"]),
    ("projects", 0.05, &["projects", "selected projects"]),
    ("certifications", 0.05, &["certifications", "certificates", "licenses"]),
];

const CONTACT_WEIGHT: f64 = 0.10;

/// Weighted presence of the standard resume sections plus reachable contact details.
pub struct SectionCompleteness;

impl Analyzer for SectionCompleteness {
    fn dimension(&self) -> Dimension {
        Dimension::SectionCompleteness
    }

    fn analyze(&self, resume: &AnalysisText, _job: Option<&JobProfile>) -> Result<f64, AnalyzerError> {
        require_resume(resume)?;
        let headings: HashSet<String> = resume
            .lines
            .iter()
            .map(|l| l.trim_end_matches(':').trim().to_lowercase())
            .collect();

        let mut score: f64 = SECTION_WEIGHTS
            .iter()
            .filter(|(_, _, synonyms)| synonyms.iter().any(|s| headings.contains(*s)))
            .map(|(_, weight, _)| weight)
            .sum();

        if EMAIL_RE.is_match(&resume.raw) || PHONE_RE.is_match(&resume.raw) {
            score += CONTACT_WEIGHT;
        }
        Ok((score * 100.0).clamp(0.0, 100.0))
    }
}

const DECORATIVE_GLYPHS: &[char] = &['★', '☆', '✓', '✔', '►', '▶', '◆', '■', '□', '●', '○', '→', '❖', '➤'];

/// Starts from 100 and subtracts capped penalties for constructs that ATS
/// parsers routinely mangle.
pub struct FormatParseability;

impl Analyzer for FormatParseability {
    fn dimension(&self) -> Dimension {
        Dimension::FormatParseability
    }

    fn analyze(&self, resume: &AnalysisText, _job: Option<&JobProfile>) -> Result<f64, AnalyzerError> {
        require_resume(resume)?;
        let raw = &resume.raw;

        let table_lines = raw.lines().filter(|l| l.matches('|').count() >= 2).count();
        let tab_lines = raw.lines().filter(|l| l.contains('\t')).count();
        let glyphs = raw
            .chars()
            .filter(|c| DECORATIVE_GLYPHS.contains(c) || (*c as u32) >= 0x1F300)
            .count();
        let long_lines = raw.lines().filter(|l| l.chars().count() > 200).count();

        let mut penalty = 0.0;
        penalty += (table_lines as f64 * 5.0).min(20.0);
        penalty += (tab_lines as f64 * 2.0).min(10.0);
        penalty += (glyphs as f64).min(15.0);
        penalty += (long_lines as f64 * 3.0).min(15.0);
        if !EMAIL_RE.is_match(raw) {
            penalty += 10.0;
        }
        if resume.word_count() < 50 {
            penalty += 15.0;
        }
        Ok((100.0 - penalty).clamp(0.0, 100.0))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Recency
// ────────────────────────────────────────────────────────────────────────────

static YEAR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(19[5-9]\d|20\d{2})\b").expect("valid regex"));
static CURRENT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\b(present|current|now)\b").expect("valid regex"));

const RECENCY_HALF_LIFE_MONTHS: f64 = 18.0;

/// Exponential decay from the most recent year the resume mentions.
pub struct RecencyFit {
    current_year: i32,
}

impl RecencyFit {
    pub fn new(current_year: i32) -> Self {
        Self { current_year }
    }

    pub fn current() -> Self {
        Self::new(Utc::now().year())
    }
}

impl Analyzer for RecencyFit {
    fn dimension(&self) -> Dimension {
        Dimension::RecencyFit
    }

    fn analyze(&self, resume: &AnalysisText, _job: Option<&JobProfile>) -> Result<f64, AnalyzerError> {
        require_resume(resume)?;
        let latest = if CURRENT_RE.is_match(&resume.raw) {
            Some(self.current_year)
        } else {
            YEAR_RE
                .find_iter(&resume.raw)
                .filter_map(|m| m.as_str().parse::<i32>().ok())
                .filter(|y| *y <= self.current_year)
                .max()
        };
        let latest = latest.ok_or_else(|| {
            AnalyzerError::InsufficientInput("no dates found".to_string())
        })?;

        // Years carry no month; assume mid-year.
        let months_since = ((self.current_year - latest) as f64 * 12.0 - 6.0).max(0.0);
        Ok((0.5_f64.powf(months_since / RECENCY_HALF_LIFE_MONTHS) * 100.0).clamp(0.0, 100.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESUME: &str = "Jane Doe\n\
        jane@example.com, +1 555 010 9999\n\
        \n\
        SUMMARY\n\
        Senior backend engineer focused on distributed systems and Rust.\n\
        \n\
        EXPERIENCE\n\
        Senior Backend Engineer at Acme (2021 - Present)\n\
        - Cut p99 latency by 40% on the payments API\n\
        - Built event pipelines on Kafka processing 2M events/day\n\
        - Mentored junior engineers\n\
        \n\
        EDUCATION\n\
        BSc Computer Science, State University 2015\n\
        \n\
        SKILLS\n\
        Technical: Rust, Kafka, Postgres, Kubernetes\n";

    const JOB: &str = "Senior Backend Engineer\n\
        We build distributed systems in Rust. Experience with Kafka and Postgres required.\n\
        Kubernetes and Terraform a plus. Distributed systems experience is essential.";

    fn run(analyzer: &dyn Analyzer, resume: &str, job: Option<&str>) -> Result<f64, AnalyzerError> {
        let resume = AnalysisText::new(resume);
        let job = job.map(JobProfile::new);
        analyzer.analyze(&resume, job.as_ref())
    }

    #[test]
    fn test_weights_sum_to_one() {
        let total: f64 = Dimension::ALL.iter().map(|d| d.weight()).sum();
        assert!((total - 1.0).abs() < 1e-9, "weights sum to {total}");
    }

    #[test]
    fn test_dimension_serde_matches_as_str() {
        for d in Dimension::ALL {
            let json = serde_json::to_string(&d).unwrap();
            assert_eq!(json, format!("\"{}\"", d.as_str()));
        }
    }

    #[test]
    fn test_default_analyzers_cover_every_dimension_once() {
        let dims: Vec<Dimension> = default_analyzers().iter().map(|a| a.dimension()).collect();
        assert_eq!(dims, Dimension::ALL.to_vec());
    }

    #[test]
    fn test_keyword_exact_requires_job_text() {
        assert_eq!(run(&KeywordExact, RESUME, None), Err(AnalyzerError::MissingJobText));
        assert_eq!(run(&KeywordExact, RESUME, Some("   ")), Err(AnalyzerError::MissingJobText));
    }

    #[test]
    fn test_keyword_exact_rewards_overlap() {
        let strong = run(&KeywordExact, RESUME, Some(JOB)).unwrap();
        let weak = run(&KeywordExact, "Pastry chef. Croissants and bread.", Some(JOB)).unwrap();
        assert!(strong > weak, "strong={strong} weak={weak}");
        assert!(strong > 50.0);
    }

    #[test]
    fn test_keyword_phrase_finds_shared_bigram() {
        let score = run(&KeywordPhrase, RESUME, Some(JOB)).unwrap();
        assert!(score > 0.0);
    }

    #[test]
    fn test_semantic_relevance_identical_text_is_full() {
        let score = run(&SemanticRelevance, JOB, Some(JOB)).unwrap();
        assert!((score - 100.0).abs() < 1e-6);
    }

    #[test]
    fn test_title_alignment_headline_gets_full_credit() {
        let score = run(&TitleAlignment, RESUME, Some(JOB)).unwrap();
        assert_eq!(score, 100.0);
        let score = run(&TitleAlignment, "Chef\n\n\n\n\n\n\n\n\n\n\nline\nline\nline\nline\nline\nline\nline\nline\nline\nline\nsenior backend engineer", Some(JOB)).unwrap();
        assert_eq!(score, 50.0);
    }

    #[test]
    fn test_metrics_presence_counts_quantified_bullets() {
        // 2 of 3 bullets carry numbers.
        let score = run(&MetricsPresence, RESUME, None).unwrap();
        assert!((score - 200.0 / 3.0).abs() < 1e-9, "score was {score}");
    }

    #[test]
    fn test_metrics_presence_without_content_fails() {
        assert!(run(&MetricsPresence, "Jane", None).is_err());
    }

    #[test]
    fn test_is_quantified_markers() {
        assert!(is_quantified("Saved $2M"));
        assert!(is_quantified("Improved uptime [LOW_METRICS]"));
        assert!(!is_quantified("Improved reliability significantly"));
    }

    #[test]
    fn test_section_completeness_full_resume() {
        // experience, skills, education, summary, contact = 0.9
        let score = run(&SectionCompleteness, RESUME, None).unwrap();
        assert!((score - 90.0).abs() < 1e-9, "score was {score}");
    }

    #[test]
    fn test_format_parseability_penalizes_tables_and_glyphs() {
        let clean = run(&FormatParseability, RESUME, None).unwrap();
        let messy = format!("{RESUME}\n| a | b |\n| c | d |\n★★★★★ ✔ ✔\n");
        let messy = run(&FormatParseability, &messy, None).unwrap();
        assert!(messy < clean, "messy={messy} clean={clean}");
    }

    #[test]
    fn test_recency_present_is_full_and_old_is_low() {
        let analyzer = RecencyFit::new(2026);
        assert_eq!(run(&analyzer, RESUME, None).unwrap(), 100.0);
        let old = run(&analyzer, "Engineer at Initech 2005 - 2010", None).unwrap();
        assert!(old < 1.0, "old={old}");
        assert!(run(&analyzer, "No dates here", None).is_err());
    }

    #[test]
    fn test_recency_ignores_future_years() {
        let analyzer = RecencyFit::new(2026);
        let score = run(&analyzer, "Engineer 2024, graduating 2031", None).unwrap();
        // 2024 → 18 months ago → half.
        assert!((score - 50.0).abs() < 1e-9, "score was {score}");
    }
}
