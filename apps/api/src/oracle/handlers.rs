//! Axum route handler for change proposals.

use axum::{extract::State, Json};
use serde::Deserialize;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::resume::ResumeDocument;
use crate::oracle::Proposal;
use crate::rate_limit::{self, endpoints};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ProposeRequest {
    pub user_id: Uuid,
    pub document: ResumeDocument,
    #[serde(default)]
    pub job_description: Option<String>,
}

/// POST /api/v1/changes/propose
///
/// Asks the oracle for a change batch. The batch is only returned, never
/// applied; clients submit the accepted subset to `/api/v1/revisions`.
pub async fn handle_propose(
    State(state): State<AppState>,
    Json(request): Json<ProposeRequest>,
) -> Result<Json<Proposal>, AppError> {
    if request.document.to_plain_text().trim().is_empty() {
        return Err(AppError::Validation("document cannot be empty".to_string()));
    }

    rate_limit::enforce(
        &state.rate_guard,
        request.user_id,
        endpoints::PROPOSE,
        &state.config.propose_policy(),
    )
    .await?;

    let proposal = state
        .proposals
        .propose(
            request.user_id,
            &request.document,
            request.job_description.as_deref(),
        )
        .await?;
    Ok(Json(proposal))
}
