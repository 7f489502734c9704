use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::autonomy::gate::{route_action, ActionRoute, GateDecision, GateRefusal, MATCHING_RUN};
use crate::autonomy::queue;
use crate::errors::AppError;
use crate::matching::pipeline::{
    run_matching, MatchingKnobs, RunMode, RunOutcome, RunSummary, Suggestion,
};
use crate::models::job::MatchRow;
use crate::providers::SearchQuery;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RunRequest {
    pub user_id: Uuid,
    pub keywords: String,
    pub location: Option<String>,
    #[serde(default)]
    pub remote_only: bool,
}

/// Typed outcome of a gate-routed run request. Exactly one terminal state
/// per request: executed, suggested, drafted, queued_for_approval,
/// brake_blocked, or tier_denied.
#[derive(Debug, Serialize)]
pub struct RunResponse {
    pub outcome: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<RunSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestions: Option<Vec<Suggestion>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub draft_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approval_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refusal: Option<GateRefusal>,
}

impl RunResponse {
    fn bare(outcome: &str) -> Self {
        Self {
            outcome: outcome.to_string(),
            summary: None,
            suggestions: None,
            draft_id: None,
            approval_id: None,
            refusal: None,
        }
    }

    pub fn refused(refusal: GateRefusal) -> Self {
        let outcome = match &refusal {
            GateRefusal::BrakeEngaged => "brake_blocked",
            GateRefusal::TierDenied { .. } => "tier_denied",
        };
        Self {
            refusal: Some(refusal),
            ..Self::bare(outcome)
        }
    }
}

/// POST /api/v1/matching/run
pub async fn handle_run_matching(
    State(state): State<AppState>,
    Json(req): Json<RunRequest>,
) -> Result<Json<RunResponse>, AppError> {
    if req.keywords.trim().is_empty() {
        return Err(AppError::Validation("keywords must not be empty".to_string()));
    }

    let query = SearchQuery {
        keywords: req.keywords,
        location: req.location,
        remote_only: req.remote_only,
        limit: 50,
    };

    let decision = route_action(state.autonomy.as_ref(), req.user_id, &MATCHING_RUN).await?;
    let route = match decision {
        GateDecision::Refused(refusal) => return Ok(Json(RunResponse::refused(refusal))),
        GateDecision::Proceed(route) => route,
    };

    let knobs = MatchingKnobs {
        refine_enabled: state.config.enable_llm_refinement,
        threshold: state.config.match_threshold,
    };

    let response = match route {
        ActionRoute::Execute => {
            match dispatch_run(&state, &knobs, req.user_id, &query, RunMode::Execute).await? {
                RunOutcome::Refused(refusal) => RunResponse::refused(refusal),
                RunOutcome::Completed { summary, .. } => RunResponse {
                    summary: Some(summary),
                    ..RunResponse::bare("executed")
                },
            }
        }
        ActionRoute::Suggest => {
            match dispatch_run(&state, &knobs, req.user_id, &query, RunMode::Suggest).await? {
                RunOutcome::Refused(refusal) => RunResponse::refused(refusal),
                RunOutcome::Completed {
                    summary,
                    suggestions,
                } => RunResponse {
                    summary: Some(summary),
                    suggestions: Some(suggestions),
                    ..RunResponse::bare("suggested")
                },
            }
        }
        ActionRoute::Draft => {
            match dispatch_run(&state, &knobs, req.user_id, &query, RunMode::Suggest).await? {
                RunOutcome::Refused(refusal) => RunResponse::refused(refusal),
                RunOutcome::Completed {
                    summary,
                    suggestions,
                } => {
                    let payload = json!({
                        "query": query,
                        "summary": summary,
                        "suggestions": suggestions,
                    });
                    let draft =
                        queue::save_draft(&state.db, req.user_id, MATCHING_RUN.name, payload)
                            .await
                            .map_err(AppError::Internal)?;
                    RunResponse {
                        summary: Some(summary),
                        draft_id: Some(draft.id),
                        ..RunResponse::bare("drafted")
                    }
                }
            }
        }
        ActionRoute::Queue => {
            let payload = json!({ "query": query });
            let row = queue::enqueue(&state.db, req.user_id, MATCHING_RUN.name, payload)
                .await
                .map_err(AppError::Internal)?;
            RunResponse {
                approval_id: Some(row.id),
                ..RunResponse::bare("queued_for_approval")
            }
        }
    };

    Ok(Json(response))
}

pub(crate) async fn dispatch_run(
    state: &AppState,
    knobs: &MatchingKnobs,
    user_id: Uuid,
    query: &SearchQuery,
    mode: RunMode,
) -> Result<RunOutcome, AppError> {
    run_matching(
        &state.db,
        &state.providers,
        &state.llm,
        state.cost.as_ref(),
        state.autonomy.as_ref(),
        knobs,
        user_id,
        query,
        mode,
    )
    .await
}

#[derive(Debug, Serialize)]
pub struct RationaleResponse {
    pub match_id: Uuid,
    pub job_id: Uuid,
    pub score: i32,
    pub status: String,
    pub rationale: String,
    pub breakdown: serde_json::Value,
}

/// GET /api/v1/matches/:id/rationale
pub async fn handle_get_rationale(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<RationaleResponse>, AppError> {
    let row: Option<MatchRow> = sqlx::query_as("SELECT * FROM matches WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.db)
        .await?;
    let row = row.ok_or_else(|| AppError::NotFound(format!("Match {id}")))?;

    Ok(Json(RationaleResponse {
        match_id: row.id,
        job_id: row.job_id,
        score: row.score,
        status: row.status,
        rationale: row.rationale,
        breakdown: row.breakdown,
    }))
}
