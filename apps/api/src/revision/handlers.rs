//! Axum route handlers for the Revision API.

use axum::{extract::State, Json};

use crate::errors::AppError;
use crate::rate_limit::{self, endpoints};
use crate::revision::pipeline::{RevisionRequest, RevisionResponse};
use crate::state::AppState;

/// POST /api/v1/revisions
///
/// Applies a change batch, scores the result and commits it as the user's
/// newest version. Any redo branch is discarded.
pub async fn handle_revise(
    State(state): State<AppState>,
    Json(request): Json<RevisionRequest>,
) -> Result<Json<RevisionResponse>, AppError> {
    if request.changes.is_empty() {
        return Err(AppError::Validation("changes cannot be empty".to_string()));
    }
    if request.baseline_score.is_some_and(|b| b > 100) {
        return Err(AppError::Validation(
            "baseline_score must be between 0 and 100".to_string(),
        ));
    }

    rate_limit::enforce(
        &state.rate_guard,
        request.user_id,
        endpoints::REVISIONS,
        &state.config.rate_policy(),
    )
    .await?;

    let response = state.pipeline.run(request).await?;
    Ok(Json(response))
}
