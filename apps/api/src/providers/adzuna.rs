//! Adzuna provider — credentialed search API with structured salary fields.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use super::{JobProvider, ProviderError, SearchQuery};
use crate::models::job::RawJob;

const API_URL: &str = "https://api.adzuna.com/v1/api/jobs/us/search/1";

pub struct AdzunaProvider {
    client: Client,
    base_url: String,
    app_id: String,
    app_key: String,
}

impl AdzunaProvider {
    pub fn new(app_id: String, app_key: String) -> Self {
        Self {
            client: Client::new(),
            base_url: API_URL.to_string(),
            app_id,
            app_key,
        }
    }
}

#[async_trait]
impl JobProvider for AdzunaProvider {
    fn name(&self) -> &str {
        "adzuna"
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<RawJob>, ProviderError> {
        let mut params = vec![
            ("app_id", self.app_id.clone()),
            ("app_key", self.app_key.clone()),
            ("what", query.keywords.clone()),
            ("results_per_page", query.limit.to_string()),
            ("content-type", "application/json".to_string()),
        ];
        if let Some(location) = &query.location {
            params.push(("where", location.clone()));
        }

        let response = self
            .client
            .get(&self.base_url)
            .query(&params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        let body: Value = response.json().await?;
        let results = body
            .get("results")
            .and_then(|v| v.as_array())
            .ok_or_else(|| ProviderError::Malformed("missing 'results' array".to_string()))?;

        let mut jobs: Vec<RawJob> = results.iter().map(normalize).collect();
        if query.remote_only {
            jobs.retain(|j| j.remote);
        }
        Ok(jobs)
    }
}

/// Converts one Adzuna result into the canonical RawJob shape.
fn normalize(payload: &Value) -> RawJob {
    let text = |key: &str| {
        payload
            .get(key)
            .and_then(|v| v.as_str())
            .filter(|s| !s.trim().is_empty())
            .map(|s| s.trim().to_string())
    };
    let nested = |outer: &str, inner: &str| {
        payload
            .get(outer)
            .and_then(|v| v.get(inner))
            .and_then(|v| v.as_str())
            .filter(|s| !s.trim().is_empty())
            .map(|s| s.trim().to_string())
    };
    let salary = |key: &str| payload.get(key).and_then(|v| v.as_f64()).map(|n| n as i64);

    let title = text("title").unwrap_or_default();
    let description = text("description");

    // Adzuna has no remote flag; infer from the posting text.
    let remote = title.to_lowercase().contains("remote")
        || description
            .as_deref()
            .map(|d| d.to_lowercase().contains("remote"))
            .unwrap_or(false);

    RawJob {
        source: "adzuna".to_string(),
        title,
        company: nested("company", "display_name").unwrap_or_default(),
        industry: nested("category", "label"),
        location: nested("location", "display_name"),
        salary_min: salary("salary_min"),
        salary_max: salary("salary_max"),
        employment_type: text("contract_time"),
        remote,
        company_size: None,
        description,
        url: text("redirect_url"),
        payload: payload.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_maps_adzuna_fields() {
        let payload = json!({
            "title": "Senior Rust Engineer",
            "company": {"display_name": "Acme"},
            "category": {"label": "IT Jobs"},
            "location": {"display_name": "Austin, TX"},
            "salary_min": 140000.0,
            "salary_max": 180000.0,
            "contract_time": "full_time",
            "redirect_url": "https://adzuna.com/land/ad/123",
            "description": "On-site role in Austin."
        });

        let raw = normalize(&payload);
        assert_eq!(raw.source, "adzuna");
        assert_eq!(raw.company, "Acme");
        assert_eq!(raw.industry.as_deref(), Some("IT Jobs"));
        assert_eq!(raw.salary_min, Some(140_000));
        assert_eq!(raw.salary_max, Some(180_000));
        assert!(!raw.remote);
    }

    #[test]
    fn test_normalize_infers_remote_from_title() {
        let payload = json!({
            "title": "Rust Engineer (Remote)",
            "company": {"display_name": "Acme"}
        });
        assert!(normalize(&payload).remote);
    }

    #[test]
    fn test_normalize_missing_fields_stay_none() {
        let payload = json!({"title": "Rust Engineer"});
        let raw = normalize(&payload);
        assert_eq!(raw.company, "");
        assert_eq!(raw.salary_min, None);
        assert_eq!(raw.location, None);
    }
}
