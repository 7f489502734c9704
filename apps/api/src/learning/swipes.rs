//! Swipe recording — the append-only feed the learning service mines.

use redis::AsyncCommands;
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use super::LEARNING_QUEUE_KEY;
use crate::errors::AppError;
use crate::models::job::{JobRow, MatchRow};
use crate::models::swipe::SwipeEventRow;

/// `recordSwipe(match_id, action)`: transitions the match status, appends an
/// immutable SwipeEvent with the job attributes denormalized at swipe time,
/// and queues the user for eventual pattern re-detection (never synchronous).
pub async fn record_swipe(
    pool: &PgPool,
    redis: &redis::Client,
    match_id: Uuid,
    action: &str,
) -> Result<SwipeEventRow, AppError> {
    if action != "saved" && action != "dismissed" {
        return Err(AppError::Validation(format!(
            "Swipe action must be 'saved' or 'dismissed', got '{action}'"
        )));
    }

    let match_row: Option<MatchRow> = sqlx::query_as("SELECT * FROM matches WHERE id = $1")
        .bind(match_id)
        .fetch_optional(pool)
        .await?;
    let match_row = match_row.ok_or_else(|| AppError::NotFound(format!("Match {match_id}")))?;

    let job: Option<JobRow> = sqlx::query_as("SELECT * FROM jobs WHERE id = $1")
        .bind(match_row.job_id)
        .fetch_optional(pool)
        .await?;
    let job = job.ok_or_else(|| AppError::NotFound(format!("Job {}", match_row.job_id)))?;

    sqlx::query("UPDATE matches SET status = $2 WHERE id = $1")
        .bind(match_id)
        .bind(action)
        .execute(pool)
        .await?;

    let event = sqlx::query_as::<_, SwipeEventRow>(
        r#"
        INSERT INTO swipe_events
            (id, user_id, match_id, job_id, action, company, location,
             remote, salary_min, salary_max, employment_type, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, now())
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(match_row.user_id)
    .bind(match_id)
    .bind(job.id)
    .bind(action)
    .bind(&job.company)
    .bind(&job.location)
    .bind(job.remote)
    .bind(job.salary_min)
    .bind(job.salary_max)
    .bind(&job.employment_type)
    .fetch_one(pool)
    .await?;

    info!(
        "Recorded {} swipe on match {} (user {})",
        action, match_id, match_row.user_id
    );

    // Best-effort trigger; detection also runs on demand, so a Redis
    // hiccup only delays re-mining.
    if let Err(e) = push_detection_trigger(redis, match_row.user_id).await {
        warn!("Failed to queue pattern re-detection: {e}");
    }

    Ok(event)
}

async fn push_detection_trigger(redis: &redis::Client, user_id: Uuid) -> redis::RedisResult<()> {
    let mut conn = redis.get_multiplexed_async_connection().await?;
    conn.lpush(LEARNING_QUEUE_KEY, user_id.to_string()).await
}
