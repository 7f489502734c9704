use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

/// A posting as returned by one provider, normalized to the canonical shape
/// but not yet deduplicated. Transient — never persisted as-is.
///
/// `payload` retains the provider's raw JSON for debugging and re-normalization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawJob {
    pub source: String,
    pub title: String,
    pub company: String,
    pub industry: Option<String>,
    pub location: Option<String>,
    pub salary_min: Option<i64>,
    pub salary_max: Option<i64>,
    pub employment_type: Option<String>,
    pub remote: bool,
    pub company_size: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
    pub payload: Value,
}

/// Canonical posting, keyed by `dedup_key`.
///
/// Table `jobs`: created once per key, updated in place when a newer RawJob
/// carries fresh non-null fields, never deleted by this subsystem.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct JobRow {
    pub id: Uuid,
    pub dedup_key: String,
    pub source: String,
    pub title: String,
    pub company: String,
    pub industry: Option<String>,
    pub location: Option<String>,
    pub salary_min: Option<i64>,
    pub salary_max: Option<i64>,
    pub employment_type: Option<String>,
    pub remote: bool,
    pub company_size: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
}

/// One (user, job) pairing produced by the scoring pipeline.
///
/// Table `matches`: UNIQUE (user_id, job_id). The pipeline only ever creates
/// rows (`ON CONFLICT DO NOTHING`); status transitions belong to the review
/// flow. `breakdown` holds the per-category point breakdown as JSON.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MatchRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub job_id: Uuid,
    pub score: i32,
    pub rationale: String,
    pub breakdown: Value,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl JobRow {
    /// Salary figure used for comparisons: the top of the range when known.
    pub fn known_salary(&self) -> Option<i64> {
        self.salary_max.or(self.salary_min)
    }
}
