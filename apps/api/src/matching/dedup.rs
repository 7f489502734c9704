//! Dedup Engine — canonicalizes and content-addresses provider candidates,
//! then merges them against previously stored postings.
//!
//! The dedup key is a SHA-256 fingerprint of the normalized posting URL,
//! falling back to normalized (title, company, location) when no URL exists.
//! Keys are never regenerated once assigned.

use anyhow::Result;
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::job::{JobRow, RawJob};

/// Lowercase, trim, collapse internal whitespace. Applied to every text
/// field before hashing or comparing.
pub fn normalize_text(text: &str) -> String {
    text.trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Normalizes a posting URL for fingerprinting: lowercased, query string and
/// fragment dropped, trailing slash dropped. Tracking parameters appended by
/// providers must not split identical postings into distinct keys.
fn normalize_url(url: &str) -> String {
    let url = url.trim().to_lowercase();
    let url = url.split(['?', '#']).next().unwrap_or(&url);
    url.trim_end_matches('/').to_string()
}

/// Deterministic content fingerprint for a candidate.
pub fn dedup_key(raw: &RawJob) -> String {
    let mut hasher = Sha256::new();
    match raw.url.as_deref().filter(|u| !u.trim().is_empty()) {
        Some(url) => hasher.update(normalize_url(url).as_bytes()),
        None => {
            let fallback = format!(
                "{}|{}|{}",
                normalize_text(&raw.title),
                normalize_text(&raw.company),
                normalize_text(raw.location.as_deref().unwrap_or("")),
            );
            hasher.update(fallback.as_bytes());
        }
    }
    hex::encode(hasher.finalize())
}

/// Collapses same-batch duplicates before storage is consulted.
/// Last-writer-wins for conflicting fields: a later candidate's populated
/// field overwrites, a later null never clobbers an earlier value.
/// Returns (key, merged candidate) pairs in first-seen key order.
pub fn merge_batch(candidates: Vec<RawJob>) -> Vec<(String, RawJob)> {
    let mut order: Vec<String> = Vec::new();
    let mut merged: std::collections::HashMap<String, RawJob> = std::collections::HashMap::new();

    for candidate in candidates {
        let key = dedup_key(&candidate);
        match merged.get_mut(&key) {
            None => {
                order.push(key.clone());
                merged.insert(key, candidate);
            }
            Some(existing) => merge_fields(existing, candidate),
        }
    }

    order
        .into_iter()
        .map(|key| {
            let raw = merged.remove(&key).expect("merged entry exists for key");
            (key, raw)
        })
        .collect()
}

fn merge_fields(existing: &mut RawJob, later: RawJob) {
    if !later.title.trim().is_empty() {
        existing.title = later.title;
    }
    if !later.company.trim().is_empty() {
        existing.company = later.company;
    }
    existing.industry = later.industry.or(existing.industry.take());
    existing.location = later.location.or(existing.location.take());
    existing.salary_min = later.salary_min.or(existing.salary_min);
    existing.salary_max = later.salary_max.or(existing.salary_max);
    existing.employment_type = later.employment_type.or(existing.employment_type.take());
    existing.remote = later.remote;
    existing.company_size = later.company_size.or(existing.company_size.take());
    existing.description = later.description.or(existing.description.take());
    existing.url = later.url.or(existing.url.take());
    existing.source = later.source;
    existing.payload = later.payload;
}

/// `upsert(candidates) -> [Job]`: merges the batch, then upserts each
/// canonical candidate keyed by its fingerprint. Existing rows are updated
/// in place — new non-null data overwrites, null never overwrites a
/// populated field. Returns the canonical Job for every input candidate,
/// batch-order preserved.
pub async fn upsert_batch(pool: &PgPool, candidates: Vec<RawJob>) -> Result<Vec<JobRow>> {
    let keys: Vec<String> = candidates.iter().map(dedup_key).collect();
    let canonical = merge_batch(candidates);

    let mut by_key: std::collections::HashMap<String, JobRow> = std::collections::HashMap::new();
    for (key, raw) in canonical {
        let row = upsert_one(pool, &key, &raw).await?;
        by_key.insert(key, row);
    }

    Ok(keys
        .into_iter()
        .map(|key| {
            by_key
                .get(&key)
                .cloned()
                .expect("every batch key was upserted")
        })
        .collect())
}

async fn upsert_one(pool: &PgPool, key: &str, raw: &RawJob) -> Result<JobRow> {
    let row = sqlx::query_as::<_, JobRow>(
        r#"
        INSERT INTO jobs
            (id, dedup_key, source, title, company, industry, location,
             salary_min, salary_max, employment_type, remote, company_size,
             description, url, first_seen_at, last_seen_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, now(), now())
        ON CONFLICT (dedup_key) DO UPDATE SET
            title           = COALESCE(NULLIF(EXCLUDED.title, ''), jobs.title),
            company         = COALESCE(NULLIF(EXCLUDED.company, ''), jobs.company),
            industry        = COALESCE(EXCLUDED.industry, jobs.industry),
            location        = COALESCE(EXCLUDED.location, jobs.location),
            salary_min      = COALESCE(EXCLUDED.salary_min, jobs.salary_min),
            salary_max      = COALESCE(EXCLUDED.salary_max, jobs.salary_max),
            employment_type = COALESCE(EXCLUDED.employment_type, jobs.employment_type),
            remote          = EXCLUDED.remote,
            company_size    = COALESCE(EXCLUDED.company_size, jobs.company_size),
            description     = COALESCE(EXCLUDED.description, jobs.description),
            url             = COALESCE(EXCLUDED.url, jobs.url),
            source          = EXCLUDED.source,
            last_seen_at    = now()
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(key)
    .bind(&raw.source)
    .bind(&raw.title)
    .bind(&raw.company)
    .bind(&raw.industry)
    .bind(&raw.location)
    .bind(raw.salary_min)
    .bind(raw.salary_max)
    .bind(&raw.employment_type)
    .bind(raw.remote)
    .bind(&raw.company_size)
    .bind(&raw.description)
    .bind(&raw.url)
    .fetch_one(pool)
    .await?;

    Ok(row)
}
