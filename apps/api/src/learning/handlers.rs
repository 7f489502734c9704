use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use super::patterns::{list_preferences, sync_patterns, update_status};
use super::swipes::record_swipe;
use crate::errors::AppError;
use crate::models::preference::LearnedPreferenceRow;
use crate::models::swipe::SwipeEventRow;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SwipeRequest {
    pub action: String,
}

/// POST /api/v1/matches/:id/swipe
pub async fn handle_swipe(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<SwipeRequest>,
) -> Result<Json<SwipeEventRow>, AppError> {
    let event = record_swipe(&state.db, &state.redis, id, &req.action).await?;
    Ok(Json(event))
}

#[derive(Debug, Deserialize)]
pub struct ListPreferencesQuery {
    pub user_id: Uuid,
    pub status: Option<String>,
}

/// GET /api/v1/preferences/learned
pub async fn handle_list_learned(
    State(state): State<AppState>,
    Query(params): Query<ListPreferencesQuery>,
) -> Result<Json<Vec<LearnedPreferenceRow>>, AppError> {
    let rows = list_preferences(&state.db, params.user_id, params.status.as_deref())
        .await
        .map_err(AppError::Internal)?;
    Ok(Json(rows))
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdateRequest {
    pub status: String,
}

/// PATCH /api/v1/preferences/learned/:id
pub async fn handle_update_learned_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<StatusUpdateRequest>,
) -> Result<Json<LearnedPreferenceRow>, AppError> {
    if !matches!(req.status.as_str(), "acknowledged" | "rejected" | "pending") {
        return Err(AppError::Validation(format!(
            "Status must be 'acknowledged', 'rejected', or 'pending', got '{}'",
            req.status
        )));
    }

    let row = update_status(&state.db, id, &req.status)
        .await
        .map_err(AppError::Internal)?
        .ok_or_else(|| AppError::NotFound(format!("Learned preference {id}")))?;
    Ok(Json(row))
}

#[derive(Debug, Deserialize)]
pub struct DetectRequest {
    pub user_id: Uuid,
}

/// POST /api/v1/preferences/learned/detect — explicit on-demand re-detection,
/// the synchronous sibling of the Redis-triggered background pass.
pub async fn handle_detect_patterns(
    State(state): State<AppState>,
    Json(req): Json<DetectRequest>,
) -> Result<Json<Vec<LearnedPreferenceRow>>, AppError> {
    let rows = sync_patterns(&state.db, req.user_id)
        .await
        .map_err(AppError::Internal)?;
    Ok(Json(rows))
}
