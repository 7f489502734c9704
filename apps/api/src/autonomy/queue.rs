//! Supervised-approval queue and L1 draft storage.
//!
//! The queue is a shared, multi-writer resource: the gate enqueues, the
//! user-facing flow resolves. Resolution claims the row with a status-guarded
//! UPDATE so double-resolution is impossible — zero affected rows means the
//! row was already resolved (or never existed).

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{FromRow, PgPool};
use tracing::info;
use uuid::Uuid;

/// Table `approval_queue`: one row per L2-gated action awaiting an explicit
/// approve/reject.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ApprovalRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub action_type: String,
    pub payload: Value,
    /// "pending", "approved", or "rejected".
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

/// Table `action_drafts`: one row per L1-gated action artifact awaiting
/// explicit user activation (activation is owned by the review flow).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DraftRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub action_type: String,
    pub payload: Value,
    pub created_at: DateTime<Utc>,
}

pub async fn enqueue(
    pool: &PgPool,
    user_id: Uuid,
    action_type: &str,
    payload: Value,
) -> Result<ApprovalRow> {
    let row = sqlx::query_as::<_, ApprovalRow>(
        r#"
        INSERT INTO approval_queue (id, user_id, action_type, payload, status, created_at)
        VALUES ($1, $2, $3, $4, 'pending', now())
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(action_type)
    .bind(payload)
    .fetch_one(pool)
    .await?;

    info!(
        "Enqueued {} for approval: {} (user {})",
        action_type, row.id, user_id
    );
    Ok(row)
}

pub async fn list_pending(pool: &PgPool, user_id: Uuid) -> Result<Vec<ApprovalRow>> {
    Ok(sqlx::query_as::<_, ApprovalRow>(
        "SELECT * FROM approval_queue WHERE user_id = $1 AND status = 'pending' ORDER BY created_at ASC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?)
}

/// Claims a pending row, flipping it to approved/rejected. Returns None when
/// the row is not pending — the caller surfaces that as a conflict, the
/// resolution is never applied twice.
pub async fn claim(pool: &PgPool, id: Uuid, approve: bool) -> Result<Option<ApprovalRow>> {
    let status = if approve { "approved" } else { "rejected" };
    let row = sqlx::query_as::<_, ApprovalRow>(
        r#"
        UPDATE approval_queue
        SET status = $2, resolved_at = now()
        WHERE id = $1 AND status = 'pending'
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(status)
    .fetch_optional(pool)
    .await?;

    if let Some(row) = &row {
        info!("Approval {} resolved: {}", row.id, row.status);
    }
    Ok(row)
}

pub async fn save_draft(
    pool: &PgPool,
    user_id: Uuid,
    action_type: &str,
    payload: Value,
) -> Result<DraftRow> {
    let row = sqlx::query_as::<_, DraftRow>(
        r#"
        INSERT INTO action_drafts (id, user_id, action_type, payload, created_at)
        VALUES ($1, $2, $3, $4, now())
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(action_type)
    .bind(payload)
    .fetch_one(pool)
    .await?;

    info!("Saved draft {} for user {}", row.id, user_id);
    Ok(row)
}
