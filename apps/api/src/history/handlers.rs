//! Axum route handlers for the History API.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::errors::AppError;
use crate::history::service::{HistoryListing, Navigation};
use crate::models::history::VersionEntry;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct UserQuery {
    pub user_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct NavigateRequest {
    pub user_id: Uuid,
}

/// GET /api/v1/history?user_id=
pub async fn handle_list(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> Result<Json<HistoryListing>, AppError> {
    Ok(Json(state.history.list(query.user_id).await?))
}

/// GET /api/v1/history/current?user_id=
pub async fn handle_current(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> Result<Json<VersionEntry>, AppError> {
    state
        .history
        .current(query.user_id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("No versions recorded for this user".to_string()))
}

/// GET /api/v1/history/:id?user_id=
pub async fn handle_get_version(
    State(state): State<AppState>,
    Path(version_id): Path<Uuid>,
    Query(query): Query<UserQuery>,
) -> Result<Json<VersionEntry>, AppError> {
    state
        .history
        .get(query.user_id, version_id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Version {version_id} not found")))
}

/// POST /api/v1/history/undo
///
/// At the start of the timeline this returns the unchanged cursor with
/// `boundary: "nothing_to_undo"` instead of an error.
pub async fn handle_undo(
    State(state): State<AppState>,
    Json(request): Json<NavigateRequest>,
) -> Result<Json<Navigation>, AppError> {
    Ok(Json(state.history.undo(request.user_id).await?))
}

/// POST /api/v1/history/redo
pub async fn handle_redo(
    State(state): State<AppState>,
    Json(request): Json<NavigateRequest>,
) -> Result<Json<Navigation>, AppError> {
    Ok(Json(state.history.redo(request.user_id).await?))
}
