//! Matching pipeline — aggregate → dedup → score → refine → threshold.
//!
//! Runs under an at-least-once scheduling contract: every stage is
//! idempotent by construction (dedup keys, recompute upserts,
//! `ON CONFLICT DO NOTHING` match creation), so a crashed run re-executes
//! from the start without duplicating effects. The brake is re-checked at
//! every stage boundary and before each job so an engaged brake halts
//! in-flight work within its latency bound.

use serde::Serialize;
use sqlx::PgPool;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::autonomy::gate::{checkpoint, GateRefusal};
use crate::autonomy::AutonomyStateProvider;
use crate::cost::CostTracker;
use crate::errors::AppError;
use crate::llm_client::LlmClient;
use crate::matching::dedup::upsert_batch;
use crate::matching::refine::{refine_score, Refinement};
use crate::matching::scoring::{evaluate, ScoreDecision, ScoreOutcome};
use crate::models::job::JobRow;
use crate::models::preference::UserPreferencesRow;
use crate::providers::{aggregate, JobProvider, SearchQuery};

/// Suggest computes the full artifact without creating Match rows — the
/// L0/L1 gate routes. Execute persists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Execute,
    Suggest,
}

/// Tunables threaded in from config.
#[derive(Debug, Clone)]
pub struct MatchingKnobs {
    pub refine_enabled: bool,
    pub threshold: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub matches_created: u32,
    pub providers_failed: u32,
}

/// One above-threshold pairing, as surfaced in suggest-mode artifacts.
#[derive(Debug, Clone, Serialize)]
pub struct Suggestion {
    pub job_id: Uuid,
    pub title: String,
    pub company: String,
    pub score: i64,
    pub rationale: String,
}

/// A run always completes with a summary — or a typed brake refusal; never
/// a partial silent failure.
#[derive(Debug)]
pub enum RunOutcome {
    Completed {
        summary: RunSummary,
        suggestions: Vec<Suggestion>,
    },
    Refused(GateRefusal),
}

/// `runMatching(user_id) -> RunSummary`. The caller has already routed the
/// action through the gate; this re-checks the brake at each step boundary.
#[allow(clippy::too_many_arguments)]
pub async fn run_matching(
    pool: &PgPool,
    providers: &[Arc<dyn JobProvider>],
    llm: &LlmClient,
    cost: &dyn CostTracker,
    autonomy: &dyn AutonomyStateProvider,
    knobs: &MatchingKnobs,
    user_id: Uuid,
    query: &SearchQuery,
    mode: RunMode,
) -> Result<RunOutcome, AppError> {
    if let Some(refusal) = checkpoint(autonomy, user_id).await? {
        return Ok(RunOutcome::Refused(refusal));
    }

    info!("Matching run started for user {user_id} ({mode:?})");
    let outcome = aggregate(providers, query).await;
    let providers_failed = outcome.failures.len() as u32;
    info!(
        "Aggregated {} candidates ({} provider failures)",
        outcome.candidates.len(),
        providers_failed
    );

    if let Some(refusal) = checkpoint(autonomy, user_id).await? {
        return Ok(RunOutcome::Refused(refusal));
    }

    let rows = upsert_batch(pool, outcome.candidates)
        .await
        .map_err(AppError::Internal)?;
    let jobs = unique_jobs(rows);

    let prefs = load_preferences(pool, user_id).await?;
    let learned = crate::learning::patterns::apply_learned_preferences(
        crate::learning::patterns::list_preferences(pool, user_id, None)
            .await
            .map_err(AppError::Internal)?,
    );
    let already_matched = existing_match_job_ids(pool, user_id, &jobs).await?;

    let mut matches_created = 0u32;
    let mut suggestions = Vec::new();

    for job in &jobs {
        // Per-job re-check: the refinement call alone can take the full
        // latency bound, so once per stage is not granular enough.
        if let Some(refusal) = checkpoint(autonomy, user_id).await? {
            info!("Matching run halted mid-flight for user {user_id}");
            return Ok(RunOutcome::Refused(refusal));
        }

        if already_matched.contains(&job.id) {
            continue;
        }

        let scored = match evaluate(&prefs, &learned, job) {
            ScoreDecision::Reject(breaker) => {
                debug!("Job {} rejected: {:?}", job.id, breaker);
                continue;
            }
            ScoreDecision::Scored(outcome) => outcome,
        };

        let refinement =
            refine_score(llm, cost, knobs.refine_enabled, user_id, job, &prefs, scored).await;
        if let Refinement::Fallback { reason, .. } = &refinement {
            debug!("Job {} scored heuristically: {reason}", job.id);
        }
        let final_outcome = refinement.into_outcome();

        if final_outcome.score < knobs.threshold {
            continue;
        }

        match mode {
            RunMode::Execute => match create_match(pool, user_id, job, &final_outcome).await {
                Ok(true) => matches_created += 1,
                Ok(false) => {} // row already existed — at-most-once per (user, job)
                Err(e) => {
                    // Skip the job, keep the run (stage-local recovery).
                    error!("Failed to create match for job {}: {e}", job.id);
                }
            },
            RunMode::Suggest => suggestions.push(Suggestion {
                job_id: job.id,
                title: job.title.clone(),
                company: job.company.clone(),
                score: final_outcome.score,
                rationale: final_outcome.rationale.clone(),
            }),
        }
    }

    let summary = RunSummary {
        matches_created,
        providers_failed,
    };
    info!(
        "Matching run finished for user {user_id}: {} matches created",
        summary.matches_created
    );
    Ok(RunOutcome::Completed {
        summary,
        suggestions,
    })
}

/// The dedup engine returns one canonical row per input candidate; collapse
/// to unique jobs, batch order preserved.
fn unique_jobs(rows: Vec<JobRow>) -> Vec<JobRow> {
    let mut seen = HashSet::new();
    rows.into_iter()
        .filter(|row| seen.insert(row.id))
        .collect()
}

async fn load_preferences(pool: &PgPool, user_id: Uuid) -> Result<UserPreferencesRow, AppError> {
    let row: Option<UserPreferencesRow> =
        sqlx::query_as("SELECT * FROM user_preferences WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(pool)
            .await?;
    Ok(row.unwrap_or_else(|| UserPreferencesRow::empty(user_id)))
}

async fn existing_match_job_ids(
    pool: &PgPool,
    user_id: Uuid,
    jobs: &[JobRow],
) -> Result<HashSet<Uuid>, AppError> {
    let ids: Vec<Uuid> = jobs.iter().map(|j| j.id).collect();
    let rows: Vec<(Uuid,)> =
        sqlx::query_as("SELECT job_id FROM matches WHERE user_id = $1 AND job_id = ANY($2)")
            .bind(user_id)
            .bind(&ids)
            .fetch_all(pool)
            .await?;
    Ok(rows.into_iter().map(|(id,)| id).collect())
}

/// At-most-once Match creation per (user, job). The conflict target also
/// covers dismissed matches — a dismissed pairing is never resurrected.
async fn create_match(
    pool: &PgPool,
    user_id: Uuid,
    job: &JobRow,
    outcome: &ScoreOutcome,
) -> Result<bool, AppError> {
    let breakdown = serde_json::to_value(&outcome.breakdown)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("breakdown serialization: {e}")))?;

    let result = sqlx::query(
        r#"
        INSERT INTO matches (id, user_id, job_id, score, rationale, breakdown, status, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, 'new', now())
        ON CONFLICT (user_id, job_id) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(job.id)
    .bind(outcome.score as i32)
    .bind(&outcome.rationale)
    .bind(breakdown)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn make_row(id: Uuid) -> JobRow {
        JobRow {
            id,
            dedup_key: id.to_string(),
            source: "test".to_string(),
            title: "Rust Engineer".to_string(),
            company: "Acme".to_string(),
            industry: None,
            location: None,
            salary_min: None,
            salary_max: None,
            employment_type: None,
            remote: false,
            company_size: None,
            description: None,
            url: None,
            first_seen_at: Utc::now(),
            last_seen_at: Utc::now(),
        }
    }

    #[test]
    fn test_unique_jobs_collapses_repeats_in_order() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let rows = vec![make_row(a), make_row(b), make_row(a)];
        let unique = unique_jobs(rows);
        assert_eq!(unique.len(), 2);
        assert_eq!(unique[0].id, a);
        assert_eq!(unique[1].id, b);
    }
}
