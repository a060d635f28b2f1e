//! Text preparation shared by the analyzers: tokenization, stopwords, and the
//! job-side keyword/phrase inventories.

use std::collections::{HashMap, HashSet};

/// Words ignored when building keyword inventories and term vectors.
const STOPWORDS: &[&str] = &[
    "a", "about", "above", "across", "after", "all", "also", "an", "and", "any", "are", "as",
    "at", "be", "been", "being", "both", "but", "by", "can", "could", "do", "does", "each",
    "etc", "for", "from", "has", "have", "having", "he", "her", "his", "how", "i", "if", "in",
    "into", "is", "it", "its", "job", "join", "just", "like", "may", "me", "more", "most",
    "must", "my", "new", "no", "not", "of", "on", "one", "or", "our", "out", "over", "own",
    "plus", "role", "she", "should", "so", "some", "such", "than", "that", "the", "their",
    "them", "then", "there", "these", "they", "this", "those", "through", "to", "up", "us",
    "use", "using", "very", "we", "well", "were", "what", "when", "where", "which", "while",
    "who", "will", "with", "within", "work", "would", "year", "years", "you", "your",
];

pub fn is_stopword(word: &str) -> bool {
    STOPWORDS.binary_search(&word).is_ok()
}

/// Lowercased word tokens. `+` and `#` are kept so `c++` and `c#` survive.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !(c.is_alphanumeric() || c == '+' || c == '#'))
        .filter(|t| t.chars().any(char::is_alphanumeric))
        .map(str::to_string)
        .collect()
}

fn is_content_token(token: &str) -> bool {
    token.chars().count() >= 3
        && !is_stopword(token)
        && !token.chars().all(|c| c.is_ascii_digit())
}

/// A piece of text pre-processed once and shared by every analyzer.
#[derive(Debug, Clone)]
pub struct AnalysisText {
    pub raw: String,
    pub lines: Vec<String>,
    pub tokens: Vec<String>,
    pub token_set: HashSet<String>,
}

impl AnalysisText {
    pub fn new(text: &str) -> Self {
        let tokens = tokenize(text);
        let token_set = tokens.iter().cloned().collect();
        let lines = text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect();
        Self {
            raw: text.to_string(),
            lines,
            tokens,
            token_set,
        }
    }

    pub fn word_count(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_blank(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Term frequencies over content tokens.
    pub fn term_frequencies(&self) -> HashMap<&str, f64> {
        let mut tf = HashMap::new();
        for token in self.tokens.iter().filter(|t| is_content_token(t)) {
            *tf.entry(token.as_str()).or_insert(0.0) += 1.0;
        }
        tf
    }

    /// Adjacent content-token pairs within a line, joined by a space.
    pub fn bigram_set(&self) -> HashSet<String> {
        self.lines
            .iter()
            .flat_map(|line| line_bigrams(line))
            .collect()
    }
}

fn line_bigrams(line: &str) -> Vec<String> {
    let tokens = tokenize(line);
    tokens
        .windows(2)
        .filter(|w| is_content_token(&w[0]) && is_content_token(&w[1]))
        .map(|w| format!("{} {}", w[0], w[1]))
        .collect()
}

/// Ranks items by frequency (descending), breaking ties by first appearance.
fn rank_by_frequency(items: impl Iterator<Item = String>, limit: usize) -> Vec<String> {
    let mut counts: HashMap<String, (usize, usize)> = HashMap::new();
    for (position, item) in items.enumerate() {
        counts
            .entry(item)
            .and_modify(|(count, _)| *count += 1)
            .or_insert((1, position));
    }
    let mut ranked: Vec<(String, usize, usize)> = counts
        .into_iter()
        .map(|(item, (count, first))| (item, count, first))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));
    ranked.into_iter().take(limit).map(|(item, _, _)| item).collect()
}

const MAX_JOB_KEYWORDS: usize = 40;
const MAX_JOB_PHRASES: usize = 20;

/// Job-side inventories computed once per scoring request.
#[derive(Debug, Clone)]
pub struct JobProfile {
    pub text: AnalysisText,
    pub keywords: Vec<String>,
    pub phrases: Vec<String>,
    pub title_tokens: Vec<String>,
}

impl JobProfile {
    pub fn new(job_text: &str) -> Self {
        let text = AnalysisText::new(job_text);
        let keywords = rank_by_frequency(
            text.tokens.iter().filter(|t| is_content_token(t)).cloned(),
            MAX_JOB_KEYWORDS,
        );
        let phrases = rank_by_frequency(
            text.lines.iter().flat_map(|l| line_bigrams(l)),
            MAX_JOB_PHRASES,
        );
        let title_tokens = text
            .lines
            .first()
            .map(|title| {
                let mut seen = HashSet::new();
                tokenize(title)
                    .into_iter()
                    .filter(|t| t.chars().count() >= 2 && !is_stopword(t))
                    .filter(|t| seen.insert(t.clone()))
                    .collect()
            })
            .unwrap_or_default();
        Self {
            text,
            keywords,
            phrases,
            title_tokens,
        }
    }

    /// Job keywords absent from the resume, in inventory order.
    pub fn missing_keywords(&self, resume: &AnalysisText, limit: usize) -> Vec<String> {
        self.keywords
            .iter()
            .filter(|k| !resume.token_set.contains(*k))
            .take(limit)
            .cloned()
            .collect()
    }
}

/// Keywords for degraded-mode scoring: alphabetic tokens of at least four
/// letters, lowercased, de-duplicated, first `limit` by order of appearance.
pub fn fallback_keywords(job_text: &str, limit: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    job_text
        .split(|c: char| !c.is_alphabetic())
        .filter(|t| t.chars().count() >= 4)
        .map(str::to_lowercase)
        .filter(|t| seen.insert(t.clone()))
        .take(limit)
        .collect()
}
