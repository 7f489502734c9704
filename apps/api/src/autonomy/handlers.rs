use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::gate::{checkpoint, MATCHING_RUN};
use super::queue::{claim, list_pending, ApprovalRow};
use crate::errors::AppError;
use crate::matching::handlers::dispatch_run;
use crate::matching::pipeline::{MatchingKnobs, RunMode, RunOutcome, RunSummary};
use crate::providers::SearchQuery;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct UserIdQuery {
    pub user_id: Uuid,
}

/// GET /api/v1/approvals
pub async fn handle_list_pending(
    State(state): State<AppState>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<Vec<ApprovalRow>>, AppError> {
    let rows = list_pending(&state.db, params.user_id)
        .await
        .map_err(AppError::Internal)?;
    Ok(Json(rows))
}

#[derive(Debug, Deserialize)]
pub struct ResolveRequest {
    pub approve: bool,
}

#[derive(Debug, Serialize)]
pub struct ResolveResponse {
    pub id: Uuid,
    pub status: String,
    /// Terminal state of the released action, when one was executed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<RunSummary>,
}

/// POST /api/v1/approvals/:id/resolve
///
/// Claims the queue row transactionally; an already-resolved row is a
/// conflict, never a second execution. Approval releases the queued action,
/// which still passes a fresh brake check before running.
pub async fn handle_resolve(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<ResolveRequest>,
) -> Result<Json<ResolveResponse>, AppError> {
    let row = match claim(&state.db, id, req.approve)
        .await
        .map_err(AppError::Internal)?
    {
        Some(row) => row,
        None => {
            let status: Option<(String,)> =
                sqlx::query_as("SELECT status FROM approval_queue WHERE id = $1")
                    .bind(id)
                    .fetch_optional(&state.db)
                    .await?;
            return match status {
                None => Err(AppError::NotFound(format!("Approval {id}"))),
                Some((status,)) => Err(AppError::Conflict(format!(
                    "Approval {id} is already {status}"
                ))),
            };
        }
    };

    if !req.approve {
        return Ok(Json(ResolveResponse {
            id: row.id,
            status: row.status,
            outcome: None,
            summary: None,
        }));
    }

    if row.action_type != MATCHING_RUN.name {
        return Err(AppError::Validation(format!(
            "Unknown queued action type '{}'",
            row.action_type
        )));
    }

    // The approval may be granted long after enqueueing — the brake state
    // at release time is the one that counts.
    if let Some(_refusal) = checkpoint(state.autonomy.as_ref(), row.user_id).await? {
        return Ok(Json(ResolveResponse {
            id: row.id,
            status: row.status,
            outcome: Some("brake_blocked".to_string()),
            summary: None,
        }));
    }

    let query: SearchQuery = serde_json::from_value(
        row.payload
            .get("query")
            .cloned()
            .unwrap_or(serde_json::Value::Null),
    )
    .map_err(|e| AppError::Validation(format!("Malformed queued payload: {e}")))?;

    let knobs = MatchingKnobs {
        refine_enabled: state.config.enable_llm_refinement,
        threshold: state.config.match_threshold,
    };

    let response = match dispatch_run(&state, &knobs, row.user_id, &query, RunMode::Execute).await? {
        RunOutcome::Refused(_) => ResolveResponse {
            id: row.id,
            status: row.status,
            outcome: Some("brake_blocked".to_string()),
            summary: None,
        },
        RunOutcome::Completed { summary, .. } => ResolveResponse {
            id: row.id,
            status: row.status,
            outcome: Some("executed".to_string()),
            summary: Some(summary),
        },
    };
    Ok(Json(response))
}
