//! Lightweight language identification: Unicode script ranges decide
//! non-Latin scripts, and function-word profiles separate Latin-script
//! languages. Used as a side input to scoring and stored with each version.

use crate::models::resume::{LanguageSource, LanguageTag};

/// Below this many letters the text is too short to call.
const MIN_LETTERS: usize = 20;

/// Latin-script profiles: high-frequency function words per language.
const LATIN_PROFILES: &[(&str, &[&str])] = &[
    ("en", &["the", "and", "of", "to", "in", "with", "for", "on", "at", "by", "from", "is", "was", "led", "built"]),
    ("es", &["el", "la", "de", "que", "y", "en", "los", "las", "con", "para", "por", "una", "del"]),
    ("fr", &["le", "la", "les", "de", "des", "et", "en", "du", "pour", "avec", "une", "dans", "sur"]),
    ("de", &["der", "die", "das", "und", "mit", "von", "für", "den", "im", "ein", "eine", "zu", "bei"]),
    ("pt", &["o", "a", "os", "as", "de", "e", "em", "com", "para", "do", "da", "uma", "no", "na"]),
    ("it", &["il", "la", "di", "e", "che", "per", "con", "del", "della", "un", "una", "nel", "gli"]),
    ("nl", &["de", "het", "een", "en", "van", "met", "voor", "op", "in", "bij", "aan", "te"]),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Script {
    Latin,
    Arabic,
    Hebrew,
    Cyrillic,
    Greek,
    Devanagari,
    Hangul,
    Kana,
    Han,
    Thai,
}

impl Script {
    fn of(c: char) -> Option<Self> {
        let cp = c as u32;
        let script = match cp {
            0x0041..=0x005A | 0x0061..=0x007A | 0x00C0..=0x024F => Script::Latin,
            0x0370..=0x03FF => Script::Greek,
            0x0400..=0x04FF => Script::Cyrillic,
            0x0590..=0x05FF => Script::Hebrew,
            0x0600..=0x06FF | 0x0750..=0x077F | 0xFB50..=0xFDFF | 0xFE70..=0xFEFF => Script::Arabic,
            0x0900..=0x097F => Script::Devanagari,
            0x0E00..=0x0E7F => Script::Thai,
            0x1100..=0x11FF | 0xAC00..=0xD7AF => Script::Hangul,
            0x3040..=0x30FF => Script::Kana,
            0x4E00..=0x9FFF | 0x3400..=0x4DBF => Script::Han,
            _ => return None,
        };
        Some(script)
    }

    /// Language code and right-to-left flag for non-Latin scripts.
    fn language(self) -> Option<(&'static str, bool)> {
        match self {
            Script::Latin => None,
            Script::Arabic => Some(("ar", true)),
            Script::Hebrew => Some(("he", true)),
            Script::Cyrillic => Some(("ru", false)),
            Script::Greek => Some(("el", false)),
            Script::Devanagari => Some(("hi", false)),
            Script::Hangul => Some(("ko", false)),
            Script::Kana => Some(("ja", false)),
            Script::Han => Some(("zh", false)),
            Script::Thai => Some(("th", false)),
        }
    }
}

pub fn is_rtl(code: &str) -> bool {
    matches!(code, "ar" | "he" | "fa" | "ur")
}

fn detected(code: &str, confidence: f64) -> LanguageTag {
    LanguageTag {
        code: code.to_string(),
        confidence: (confidence * 100.0).round() / 100.0,
        rtl: is_rtl(code),
        source: LanguageSource::Detected,
    }
}

/// Best guess for `text`. Falls back to the default tag when the text is too
/// short or carries no recognizable signal.
pub fn detect(text: &str) -> LanguageTag {
    let mut counts: Vec<(Script, usize)> = Vec::new();
    let mut letters = 0;
    for script in text.chars().filter_map(Script::of) {
        letters += 1;
        match counts.iter_mut().find(|(s, _)| *s == script) {
            Some((_, n)) => *n += 1,
            None => counts.push((script, 1)),
        }
    }
    if letters < MIN_LETTERS {
        return LanguageTag::default();
    }

    counts.sort_by(|a, b| b.1.cmp(&a.1));
    let (dominant, dominant_count) = counts[0];
    let script_share = dominant_count as f64 / letters as f64;

    if let Some((code, _)) = dominant.language() {
        // Japanese text mixes kana with Han characters.
        let code = if dominant == Script::Han && counts.iter().any(|(s, _)| *s == Script::Kana) {
            "ja"
        } else {
            code
        };
        return detected(code, script_share);
    }

    detect_latin(text, script_share)
}

fn detect_latin(text: &str, script_share: f64) -> LanguageTag {
    let words: Vec<String> = text
        .split(|c: char| !c.is_alphabetic())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect();
    if words.is_empty() {
        return LanguageTag::default();
    }

    let mut scored: Vec<(&str, usize)> = LATIN_PROFILES
        .iter()
        .map(|(code, profile)| {
            let hits = words.iter().filter(|w| profile.contains(&w.as_str())).count();
            (*code, hits)
        })
        .collect();
    scored.sort_by(|a, b| b.1.cmp(&a.1));

    let (best, best_hits) = scored[0];
    if best_hits == 0 {
        return LanguageTag::default();
    }
    let runner_up = scored.get(1).map(|(_, h)| *h).unwrap_or(0);
    let margin = (best_hits - runner_up) as f64 / best_hits as f64;
    let coverage = (best_hits as f64 / words.len() as f64 * 4.0).min(1.0);
    detected(best, script_share * (0.5 + 0.25 * margin + 0.25 * coverage))
}

/// The tag to store for a document. A user-set tag always wins; otherwise the
/// text is re-detected.
pub fn resolve(current: &LanguageTag, text: &str) -> LanguageTag {
    if current.source == LanguageSource::User {
        return current.clone();
    }
    detect(text)
}
