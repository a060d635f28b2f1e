//! Axum route handlers for the ATS API.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ats::types::{AtsScoreOutput, ScoreDelta};
use crate::errors::AppError;
use crate::language;
use crate::models::resume::{LanguageTag, ResumeDocument};
use crate::rate_limit::{self, endpoints};
use crate::state::AppState;

/// A resume given either as raw text or as a structured document.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ScoreInput {
    Text(String),
    Document(Box<ResumeDocument>),
}

impl ScoreInput {
    fn to_text(&self) -> String {
        match self {
            ScoreInput::Text(text) => text.clone(),
            ScoreInput::Document(doc) => doc.to_plain_text(),
        }
    }

    fn language(&self, text: &str) -> LanguageTag {
        match self {
            ScoreInput::Text(_) => language::detect(text),
            ScoreInput::Document(doc) => language::resolve(&doc.language, text),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ScoreRequest {
    pub user_id: Uuid,
    pub before: ScoreInput,
    /// Scored against `before` when omitted.
    #[serde(default)]
    pub after: Option<ScoreInput>,
    #[serde(default)]
    pub job_description: Option<String>,
    #[serde(default)]
    pub baseline_score: Option<u8>,
}

#[derive(Debug, Serialize)]
pub struct ScoreResponse {
    pub ats: AtsScoreOutput,
    pub score: ScoreDelta,
    pub language: LanguageTag,
}

/// POST /api/v1/ats/score
///
/// Scores without committing anything to history.
pub async fn handle_score(
    State(state): State<AppState>,
    Json(request): Json<ScoreRequest>,
) -> Result<Json<ScoreResponse>, AppError> {
    let before = request.before.to_text();
    if before.trim().is_empty() {
        return Err(AppError::Validation("before cannot be empty".to_string()));
    }

    rate_limit::enforce(
        &state.rate_guard,
        request.user_id,
        endpoints::ATS_SCORE,
        &state.config.rate_policy(),
    )
    .await?;

    let after_input = request.after.as_ref().unwrap_or(&request.before);
    let after = after_input.to_text();
    let language = after_input.language(&after);

    let ats = state
        .engine
        .score_with_timeout(before, after, request.job_description, state.scoring_timeout())
        .await;
    let score = ScoreDelta::from_output(&ats, request.baseline_score);

    Ok(Json(ScoreResponse {
        ats,
        score,
        language,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_input_accepts_text_or_document() {
        let request: ScoreRequest = serde_json::from_value(serde_json::json!({
            "user_id": Uuid::nil(),
            "before": "Backend engineer",
            "after": { "summary": "Senior backend engineer" },
        }))
        .unwrap();

        assert!(matches!(request.before, ScoreInput::Text(_)));
        let after = request.after.unwrap();
        assert!(matches!(after, ScoreInput::Document(_)));
        assert!(after.to_text().contains("SUMMARY\nSenior backend engineer"));
    }
}
