use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, VecDeque};
use std::hash::{Hash, Hasher};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::ats::analyzers::{default_analyzers, Analyzer, AnalyzerError, Dimension};
use crate::ats::fallback::{degraded_score, keyword_estimate};
use crate::ats::suggestions::build_suggestions;
use crate::ats::text::{AnalysisText, JobProfile};
use crate::ats::types::{AtsScoreOutput, ScoreMetadata, SubScores};

const CACHE_CAPACITY: usize = 128;
const MAX_MISSING_KEYWORDS: usize = 20;

/// Outcome of running every analyzer over one text.
struct AnalyzerRun {
    subscores: SubScores,
    composite: Option<u8>,
    succeeded: usize,
    failed: Vec<Dimension>,
    warnings: Vec<String>,
}

#[derive(Default)]
struct ScoreCache {
    entries: HashMap<u64, AtsScoreOutput>,
    order: VecDeque<u64>,
}

impl ScoreCache {
    fn get(&self, key: u64) -> Option<AtsScoreOutput> {
        self.entries.get(&key).cloned()
    }

    fn insert(&mut self, key: u64, output: AtsScoreOutput) {
        if self.entries.insert(key, output).is_none() {
            self.order.push_back(key);
        }
        while self.order.len() > CACHE_CAPACITY {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
            }
        }
    }
}

/// Weighted multi-analyzer scorer. Never returns an error: when no analyzer
/// produces output the degraded estimate is returned instead.
pub struct AtsEngine {
    analyzers: Vec<Box<dyn Analyzer>>,
    cache: Mutex<ScoreCache>,
}

impl Default for AtsEngine {
    fn default() -> Self {
        Self::with_analyzers(default_analyzers())
    }
}

impl AtsEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_analyzers(analyzers: Vec<Box<dyn Analyzer>>) -> Self {
        Self {
            analyzers,
            cache: Mutex::new(ScoreCache::default()),
        }
    }

    /// Scores `before` and `after` against the optional job description.
    pub fn score(&self, before: &str, after: &str, job_text: Option<&str>) -> AtsScoreOutput {
        let started = Instant::now();
        let key = cache_key(before, after, job_text);

        if let Ok(cache) = self.cache.lock() {
            if let Some(mut hit) = cache.get(key) {
                debug!("ATS score cache hit");
                hit.metadata.cache_hit = true;
                return hit;
            }
        }

        let job = job_text
            .filter(|t| !t.trim().is_empty())
            .map(JobProfile::new);
        let before_text = AnalysisText::new(before);
        let after_text = AnalysisText::new(after);

        let original = self.run_all(&before_text, job.as_ref());
        let optimized = self.run_all(&after_text, job.as_ref());

        let Some(score_optimized) = optimized.composite else {
            warn!("No analyzer produced a score; returning degraded estimate");
            let mut output = degraded_score(before, after, job_text);
            output.metadata.warnings.extend(optimized.warnings);
            output.metadata.processing_time_ms = started.elapsed().as_millis() as u64;
            return output;
        };

        // An unscorable original (often empty) only costs the baseline; the
        // revised text keeps its full analysis.
        let mut estimate_warning = None;
        let (score_original, subscores_original) = match original.composite {
            Some(score) => (score, Some(original.subscores)),
            None => {
                debug!("Original text produced no composite; using keyword estimate");
                estimate_warning =
                    Some("original text could not be scored; keyword estimate used".to_string());
                (keyword_estimate(before, job_text), None)
            }
        };

        let total_runs = self.analyzers.len() * 2;
        let succeeded = original.succeeded + optimized.succeeded;
        let confidence = confidence(succeeded, total_runs, &after_text, job.as_ref());

        let mut failed = original.failed;
        failed.extend(optimized.failed);
        failed.sort();
        failed.dedup();

        let mut warnings = original.warnings;
        warnings.extend(optimized.warnings);
        warnings.extend(estimate_warning);

        let output = AtsScoreOutput {
            ats_score_original: score_original,
            ats_score_optimized: score_optimized,
            suggestions: build_suggestions(&optimized.subscores, &after_text, job.as_ref()),
            missing_keywords: job
                .as_ref()
                .map(|j| j.missing_keywords(&after_text, MAX_MISSING_KEYWORDS))
                .unwrap_or_default(),
            subscores: Some(optimized.subscores),
            subscores_original,
            confidence,
            metadata: ScoreMetadata {
                processing_time_ms: started.elapsed().as_millis() as u64,
                analyzers_run: self.analyzers.iter().map(|a| a.dimension()).collect(),
                analyzers_failed: failed,
                warnings,
                degraded: false,
                cache_hit: false,
            },
        };

        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(key, output.clone());
        }
        output
    }

    /// Runs [`AtsEngine::score`] on a blocking worker. On timeout or worker
    /// failure the degraded estimate is returned.
    pub async fn score_with_timeout(
        self: &Arc<Self>,
        before: String,
        after: String,
        job_text: Option<String>,
        limit: Duration,
    ) -> AtsScoreOutput {
        let engine = Arc::clone(self);
        let (b, a, j) = (before.clone(), after.clone(), job_text.clone());
        let task = tokio::task::spawn_blocking(move || engine.score(&b, &a, j.as_deref()));

        match tokio::time::timeout(limit, task).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                warn!("Scoring worker failed: {e}; returning degraded estimate");
                degraded_score(&before, &after, job_text.as_deref())
            }
            Err(_) => {
                warn!("Scoring exceeded {}ms; returning degraded estimate", limit.as_millis());
                degraded_score(&before, &after, job_text.as_deref())
            }
        }
    }

    fn run_all(&self, text: &AnalysisText, job: Option<&JobProfile>) -> AnalyzerRun {
        let mut run = AnalyzerRun {
            subscores: SubScores::default(),
            composite: None,
            succeeded: 0,
            failed: Vec::new(),
            warnings: Vec::new(),
        };
        let mut weighted = 0.0;
        let mut weight_total = 0.0;

        for analyzer in &self.analyzers {
            let dimension = analyzer.dimension();
            match run_isolated(analyzer.as_ref(), text, job) {
                Ok(score) => {
                    run.subscores.set(dimension, Some(score.round() as u8));
                    run.succeeded += 1;
                    weighted += dimension.weight() * score;
                    weight_total += dimension.weight();
                }
                Err(e) => {
                    warn!("Analyzer {} failed: {e}", dimension.as_str());
                    run.failed.push(dimension);
                    run.warnings.push(format!("{}: {e}", dimension.as_str()));
                }
            }
        }

        if weight_total > 0.0 {
            run.composite = Some((weighted / weight_total).round().clamp(0.0, 100.0) as u8);
        }
        run
    }
}

/// Runs one analyzer, converting panics and out-of-range output into errors.
fn run_isolated(
    analyzer: &dyn Analyzer,
    text: &AnalysisText,
    job: Option<&JobProfile>,
) -> Result<f64, AnalyzerError> {
    let result = panic::catch_unwind(AssertUnwindSafe(|| analyzer.analyze(text, job)))
        .map_err(|payload| {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            AnalyzerError::Panicked(message)
        })??;

    if !result.is_finite() || !(0.0..=100.0).contains(&result) {
        return Err(AnalyzerError::InvalidOutput(result));
    }
    Ok(result)
}

/// Coverage of successful analyzer runs, discounted for thin inputs.
fn confidence(succeeded: usize, total: usize, resume: &AnalysisText, job: Option<&JobProfile>) -> f64 {
    let coverage = if total == 0 {
        0.0
    } else {
        succeeded as f64 / total as f64
    };
    let mut value = 0.3 + 0.65 * coverage;

    let resume_words = resume.word_count();
    if resume_words < 30 {
        value *= 0.6;
    } else if resume_words < 100 {
        value *= 0.8;
    }

    match job {
        None => value *= 0.7,
        Some(j) if j.text.word_count() < 50 => value *= 0.85,
        Some(_) => {}
    }
    value.clamp(0.0, 1.0)
}

fn cache_key(before: &str, after: &str, job_text: Option<&str>) -> u64 {
    let mut hasher = DefaultHasher::new();
    before.hash(&mut hasher);
    after.hash(&mut hasher);
    job_text.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(Dimension, f64);

    impl Analyzer for Fixed {
        fn dimension(&self) -> Dimension {
            self.0
        }
        fn analyze(&self, _: &AnalysisText, _: Option<&JobProfile>) -> Result<f64, AnalyzerError> {
            Ok(self.1)
        }
    }

    struct Failing(Dimension);

    impl Analyzer for Failing {
        fn dimension(&self) -> Dimension {
            self.0
        }
        fn analyze(&self, _: &AnalysisText, _: Option<&JobProfile>) -> Result<f64, AnalyzerError> {
            Err(AnalyzerError::InsufficientInput("nothing here".to_string()))
        }
    }

    struct Panicking(Dimension);

    impl Analyzer for Panicking {
        fn dimension(&self) -> Dimension {
            self.0
        }
        fn analyze(&self, _: &AnalysisText, _: Option<&JobProfile>) -> Result<f64, AnalyzerError> {
            panic!("boom")
        }
    }

    /// Scores any non-blank text; blank text has nothing to analyze.
    struct NeedsText(Dimension);

    impl Analyzer for NeedsText {
        fn dimension(&self) -> Dimension {
            self.0
        }
        fn analyze(&self, text: &AnalysisText, _: Option<&JobProfile>) -> Result<f64, AnalyzerError> {
            if text.is_blank() {
                return Err(AnalyzerError::InsufficientInput("resume text is empty".to_string()));
            }
            Ok(72.0)
        }
    }

    struct Slow;

    impl Analyzer for Slow {
        fn dimension(&self) -> Dimension {
            Dimension::KeywordExact
        }
        fn analyze(&self, _: &AnalysisText, _: Option<&JobProfile>) -> Result<f64, AnalyzerError> {
            std::thread::sleep(Duration::from_millis(200));
            Ok(50.0)
        }
    }

    fn fixed_all(score: f64) -> Vec<Box<dyn Analyzer>> {
        Dimension::ALL
            .iter()
            .map(|d| Box::new(Fixed(*d, score)) as Box<dyn Analyzer>)
            .collect()
    }

    const RESUME: &str = "Jane Doe\njane@example.com\n\nSUMMARY\nSenior backend engineer building distributed systems in Rust.\n\nEXPERIENCE\nSenior Backend Engineer at Acme (2021 - Present)\n- Cut p99 latency by 40% on the payments API\n- Built Kafka pipelines processing 2M events/day\n\nSKILLS\nTechnical: Rust, Kafka, Postgres";
    const JOB: &str = "Senior Backend Engineer\nRust, Kafka, Postgres, Kubernetes. Distributed systems experience.";

    #[test]
    fn test_composite_is_weighted_mean() {
        let engine = AtsEngine::with_analyzers(fixed_all(70.0));
        let output = engine.score("a", "b", Some("job"));
        assert_eq!(output.ats_score_original, 70);
        assert_eq!(output.ats_score_optimized, 70);
        assert!(!output.metadata.degraded);
        assert_eq!(output.metadata.analyzers_run.len(), 8);
    }

    #[test]
    fn test_failed_analyzer_excluded_from_composite_and_null() {
        let mut analyzers = fixed_all(80.0);
        analyzers[0] = Box::new(Fixed(Dimension::KeywordExact, 0.0));
        analyzers[1] = Box::new(Failing(Dimension::KeywordPhrase));
        let engine = AtsEngine::with_analyzers(analyzers);
        let output = engine.score("a", "b", Some("job"));

        let subscores = output.subscores.unwrap();
        assert_eq!(subscores.keyword_phrase, None);
        assert_eq!(subscores.keyword_exact, Some(0));
        assert_eq!(output.metadata.analyzers_failed, vec![Dimension::KeywordPhrase]);
        // 80 × (0.88 − 0.22) / 0.88 = 60
        assert_eq!(output.ats_score_optimized, 60);
    }

    #[test]
    fn test_panicking_analyzer_is_isolated() {
        let mut analyzers = fixed_all(50.0);
        analyzers[3] = Box::new(Panicking(Dimension::TitleAlignment));
        let engine = AtsEngine::with_analyzers(analyzers);
        let output = engine.score("a", "b", None);
        assert_eq!(output.ats_score_optimized, 50);
        assert!(output.metadata.warnings.iter().any(|w| w.contains("boom")));
    }

    #[test]
    fn test_out_of_range_output_is_a_failure() {
        let mut analyzers = fixed_all(50.0);
        analyzers[2] = Box::new(Fixed(Dimension::SemanticRelevance, 140.0));
        analyzers[4] = Box::new(Fixed(Dimension::MetricsPresence, f64::NAN));
        let engine = AtsEngine::with_analyzers(analyzers);
        let output = engine.score("a", "b", None);
        assert_eq!(
            output.metadata.analyzers_failed,
            vec![Dimension::SemanticRelevance, Dimension::MetricsPresence]
        );
    }

    #[test]
    fn test_all_failures_degrade_instead_of_erroring() {
        let analyzers = Dimension::ALL
            .iter()
            .map(|d| Box::new(Failing(*d)) as Box<dyn Analyzer>)
            .collect();
        let engine = AtsEngine::with_analyzers(analyzers);
        let output = engine.score("rust", "rust kafka", Some("Rust Kafka"));
        assert!(output.metadata.degraded);
        assert!(output.subscores.is_none());
        assert!(output.ats_score_optimized >= output.ats_score_original + 5);
    }

    #[test]
    fn test_empty_original_keeps_full_analysis_of_revision() {
        let analyzers = Dimension::ALL
            .iter()
            .map(|d| Box::new(NeedsText(*d)) as Box<dyn Analyzer>)
            .collect();
        let engine = AtsEngine::with_analyzers(analyzers);
        let output = engine.score("", RESUME, Some(JOB));

        assert!(!output.metadata.degraded);
        assert_eq!(output.ats_score_optimized, 72);
        assert!(output.subscores.is_some());
        assert!(output.subscores_original.is_none());
        assert_eq!(output.ats_score_original, keyword_estimate("", Some(JOB)));
        assert!(output
            .metadata
            .warnings
            .iter()
            .any(|w| w.contains("keyword estimate")));
    }

    #[test]
    fn test_confidence_strictly_lower_when_an_analyzer_fails() {
        let healthy = AtsEngine::with_analyzers(fixed_all(60.0)).score(RESUME, RESUME, Some(JOB));
        let mut analyzers = fixed_all(60.0);
        analyzers[7] = Box::new(Failing(Dimension::RecencyFit));
        let degraded = AtsEngine::with_analyzers(analyzers).score(RESUME, RESUME, Some(JOB));
        assert!(
            degraded.confidence < healthy.confidence,
            "{} !< {}",
            degraded.confidence,
            healthy.confidence
        );
    }

    #[test]
    fn test_confidence_penalizes_missing_job_text() {
        let engine = AtsEngine::with_analyzers(fixed_all(60.0));
        let with_job = engine.score(RESUME, RESUME, Some(JOB)).confidence;
        let without_job = engine.score(RESUME, RESUME, None).confidence;
        assert!(without_job < with_job);
        assert!((0.0..=1.0).contains(&with_job));
    }

    #[test]
    fn test_scores_within_bounds_with_real_analyzers() {
        let engine = AtsEngine::new();
        let output = engine.score("Pastry chef baking croissants since 2010", RESUME, Some(JOB));
        assert!(output.ats_score_optimized <= 100);
        assert!(output.ats_score_optimized > output.ats_score_original);
        let subscores = output.subscores.unwrap();
        for d in Dimension::ALL {
            if let Some(s) = subscores.get(d) {
                assert!(s <= 100);
            }
        }
    }

    #[test]
    fn test_identical_request_is_served_from_cache() {
        let engine = AtsEngine::new();
        let first = engine.score(RESUME, RESUME, Some(JOB));
        let second = engine.score(RESUME, RESUME, Some(JOB));
        assert!(!first.metadata.cache_hit);
        assert!(second.metadata.cache_hit);
        assert_eq!(first.ats_score_optimized, second.ats_score_optimized);
    }

    #[test]
    fn test_cache_is_bounded() {
        let mut cache = ScoreCache::default();
        let output = degraded_score("", "", None);
        for key in 0..(CACHE_CAPACITY as u64 + 10) {
            cache.insert(key, output.clone());
        }
        assert_eq!(cache.entries.len(), CACHE_CAPACITY);
        assert!(cache.get(0).is_none());
        assert!(cache.get(CACHE_CAPACITY as u64 + 9).is_some());
    }

    #[tokio::test]
    async fn test_timeout_returns_degraded_result() {
        let engine = Arc::new(AtsEngine::with_analyzers(vec![Box::new(Slow)]));
        let output = engine
            .score_with_timeout(
                "rust".to_string(),
                "rust kafka".to_string(),
                Some("Rust Kafka".to_string()),
                Duration::from_millis(10),
            )
            .await;
        assert!(output.metadata.degraded);
    }

    #[tokio::test]
    async fn test_within_timeout_returns_full_result() {
        let engine = Arc::new(AtsEngine::with_analyzers(fixed_all(75.0)));
        let output = engine
            .score_with_timeout(
                "a".to_string(),
                "b".to_string(),
                None,
                Duration::from_secs(5),
            )
            .await;
        assert!(!output.metadata.degraded);
        assert_eq!(output.ats_score_optimized, 75);
    }
}
