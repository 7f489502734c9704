use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A user's stated job preferences.
///
/// Table `user_preferences`: one row per user, owned by the profile flow.
/// This subsystem only reads it. A user with no row scores with an empty
/// (all-neutral) preference set.
#[derive(Debug, Clone, Default, Serialize, Deserialize, FromRow)]
pub struct UserPreferencesRow {
    pub user_id: Uuid,
    pub titles: Vec<String>,
    pub locations: Vec<String>,
    pub remote_ok: bool,
    pub min_salary: Option<i64>,
    pub skills: Vec<String>,
    pub seniority: Option<String>,
    pub company_sizes: Vec<String>,
    pub excluded_companies: Vec<String>,
    pub excluded_industries: Vec<String>,
}

impl UserPreferencesRow {
    pub fn empty(user_id: Uuid) -> Self {
        Self {
            user_id,
            ..Default::default()
        }
    }
}

/// A behaviorally-mined preference rule.
///
/// Table `learned_preferences`: UNIQUE (user_id, pattern_type, value,
/// direction). Confidence is stored with 2 decimal places and capped at
/// 0.95. Rejection is a status flip (soft delete) — rows are never removed.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct LearnedPreferenceRow {
    pub id: Uuid,
    pub user_id: Uuid,
    /// Dimension the pattern was mined over: "company", "location",
    /// "remote", or "employment_type".
    pub pattern_type: String,
    pub value: String,
    /// "dismissed" (negative signal) or "saved" (positive signal).
    pub direction: String,
    pub confidence: f64,
    pub occurrences: i32,
    /// "pending", "acknowledged", or "rejected". Only acknowledged rows
    /// ever affect live scoring.
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
