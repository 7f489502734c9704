//! Preference Learning — mines the append-only swipe log into
//! confidence-scored behavioral patterns.
//!
//! Detection is a recompute over the full event history, never an
//! increment: re-running cannot create duplicate rows or inflate
//! confidence. Only user-acknowledged patterns ever reach live scoring.

use anyhow::Result;
use serde::Serialize;
use sqlx::PgPool;
use std::collections::HashMap;
use tracing::info;
use uuid::Uuid;

use crate::matching::dedup::normalize_text;
use crate::models::preference::LearnedPreferenceRow;
use crate::models::swipe::SwipeEventRow;

/// A value must appear in at least this many swipes before it can become a
/// pattern — two data points are noise.
pub const MIN_OCCURRENCES: usize = 3;
/// Share of swipes on a value that must agree before a pattern is emitted.
pub const RATE_THRESHOLD: f64 = 0.60;
/// Confidence ceiling. A finite, possibly noisy sample must never justify
/// absolute exclusion.
pub const CONFIDENCE_CAP: f64 = 0.95;

/// A pattern mined from the swipe log, not yet persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MinedPattern {
    pub pattern_type: String,
    pub value: String,
    pub direction: String,
    pub confidence: f64,
    pub occurrences: i32,
}

/// `detectPatterns` core: groups the user's swipes by each denormalized
/// attribute dimension and emits a pattern for every value that clears the
/// occurrence floor and the rate threshold, in either direction.
/// Output order is deterministic.
pub fn detect_patterns(events: &[SwipeEventRow]) -> Vec<MinedPattern> {
    let mut groups: HashMap<(String, String), (usize, usize)> = HashMap::new();

    for event in events {
        for (dimension, value) in dimensions_of(event) {
            let entry = groups.entry((dimension, value)).or_insert((0, 0));
            entry.0 += 1;
            if event.action == "dismissed" {
                entry.1 += 1;
            }
        }
    }

    let mut patterns = Vec::new();
    for ((dimension, value), (total, dismissed)) in groups {
        if total < MIN_OCCURRENCES {
            continue;
        }
        let dismiss_rate = dismissed as f64 / total as f64;
        let save_rate = 1.0 - dismiss_rate;

        let (direction, rate) = if dismiss_rate >= RATE_THRESHOLD {
            ("dismissed", dismiss_rate)
        } else if save_rate >= RATE_THRESHOLD {
            ("saved", save_rate)
        } else {
            continue;
        };

        patterns.push(MinedPattern {
            pattern_type: dimension,
            value,
            direction: direction.to_string(),
            confidence: round2(rate.min(CONFIDENCE_CAP)),
            occurrences: total as i32,
        });
    }

    patterns.sort_by(|a, b| {
        (&a.pattern_type, &a.value, &a.direction).cmp(&(&b.pattern_type, &b.value, &b.direction))
    });
    patterns
}

/// The denormalized dimensions a single swipe contributes to.
fn dimensions_of(event: &SwipeEventRow) -> Vec<(String, String)> {
    let mut dims = Vec::new();
    let company = normalize_text(&event.company);
    if !company.is_empty() {
        dims.push(("company".to_string(), company));
    }
    if let Some(location) = event.location.as_deref() {
        let location = normalize_text(location);
        if !location.is_empty() {
            dims.push(("location".to_string(), location));
        }
    }
    dims.push((
        "remote".to_string(),
        if event.remote { "remote" } else { "onsite" }.to_string(),
    ));
    if let Some(employment_type) = event.employment_type.as_deref() {
        let employment_type = normalize_text(employment_type);
        if !employment_type.is_empty() {
            dims.push(("employment_type".to_string(), employment_type));
        }
    }
    dims
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Recomputes the user's patterns from the full swipe log and upserts them.
/// Confidence and occurrences are overwritten with the recomputed values;
/// status is preserved, so an acknowledged or rejected row keeps its state
/// across re-detection. Idempotent and safe to invoke repeatedly.
pub async fn sync_patterns(pool: &PgPool, user_id: Uuid) -> Result<Vec<LearnedPreferenceRow>> {
    let events = sqlx::query_as::<_, SwipeEventRow>(
        "SELECT * FROM swipe_events WHERE user_id = $1 ORDER BY created_at ASC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    let mined = detect_patterns(&events);
    info!(
        "Pattern detection for {}: {} events, {} patterns",
        user_id,
        events.len(),
        mined.len()
    );

    let mut rows = Vec::with_capacity(mined.len());
    for pattern in mined {
        let row = sqlx::query_as::<_, LearnedPreferenceRow>(
            r#"
            INSERT INTO learned_preferences
                (id, user_id, pattern_type, value, direction, confidence,
                 occurrences, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, 'pending', now(), now())
            ON CONFLICT (user_id, pattern_type, value, direction) DO UPDATE SET
                confidence  = EXCLUDED.confidence,
                occurrences = EXCLUDED.occurrences,
                updated_at  = now()
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(&pattern.pattern_type)
        .bind(&pattern.value)
        .bind(&pattern.direction)
        .bind(pattern.confidence)
        .bind(pattern.occurrences)
        .fetch_one(pool)
        .await?;
        rows.push(row);
    }
    Ok(rows)
}

/// `applyLearnedPreferences`: the filter between stored patterns and the
/// scorer's input. Only acknowledged patterns are live — pending and
/// rejected rows never affect scoring.
pub fn apply_learned_preferences(patterns: Vec<LearnedPreferenceRow>) -> Vec<LearnedPreferenceRow> {
    patterns
        .into_iter()
        .filter(|p| p.status == "acknowledged")
        .collect()
}

pub async fn list_preferences(
    pool: &PgPool,
    user_id: Uuid,
    status: Option<&str>,
) -> Result<Vec<LearnedPreferenceRow>> {
    let rows = match status {
        Some(status) => {
            sqlx::query_as::<_, LearnedPreferenceRow>(
                "SELECT * FROM learned_preferences WHERE user_id = $1 AND status = $2 ORDER BY confidence DESC",
            )
            .bind(user_id)
            .bind(status)
            .fetch_all(pool)
            .await?
        }
        None => {
            sqlx::query_as::<_, LearnedPreferenceRow>(
                "SELECT * FROM learned_preferences WHERE user_id = $1 ORDER BY confidence DESC",
            )
            .bind(user_id)
            .fetch_all(pool)
            .await?
        }
    };
    Ok(rows)
}

/// Flips a pattern's status. Rejection is the soft delete — the row stays
/// for auditability.
pub async fn update_status(
    pool: &PgPool,
    id: Uuid,
    status: &str,
) -> Result<Option<LearnedPreferenceRow>> {
    Ok(sqlx::query_as::<_, LearnedPreferenceRow>(
        "UPDATE learned_preferences SET status = $2, updated_at = now() WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(status)
    .fetch_optional(pool)
    .await?)
}
