use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Immutable record of a save/dismiss action.
///
/// Table `swipe_events`: append-only. Job attributes relevant to pattern
/// mining are denormalized at swipe time so detection never needs a join.
/// Never updated or deleted — this is the audit trail the learning service
/// reads.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SwipeEventRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub match_id: Uuid,
    pub job_id: Uuid,
    /// "saved" or "dismissed".
    pub action: String,
    pub company: String,
    pub location: Option<String>,
    pub remote: bool,
    pub salary_min: Option<i64>,
    pub salary_max: Option<i64>,
    pub employment_type: Option<String>,
    pub created_at: DateTime<Utc>,
}
