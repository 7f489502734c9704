//! Remotive provider — public remote-jobs API, no credentials required.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use super::{JobProvider, ProviderError, SearchQuery};
use crate::models::job::RawJob;

const API_URL: &str = "https://remotive.com/api/remote-jobs";

pub struct RemotiveProvider {
    client: Client,
    base_url: String,
}

impl RemotiveProvider {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            base_url: API_URL.to_string(),
        }
    }
}

impl Default for RemotiveProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobProvider for RemotiveProvider {
    fn name(&self) -> &str {
        "remotive"
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<RawJob>, ProviderError> {
        let limit = query.limit.to_string();
        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("search", query.keywords.as_str()),
                ("limit", limit.as_str()),
            ])
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
        let jobs = body
            .get("jobs")
            .and_then(|v| v.as_array())
            .ok_or_else(|| ProviderError::Malformed("missing 'jobs' array".to_string()))?;

        Ok(jobs.iter().map(normalize).collect())
    }
}

/// Converts one Remotive payload entry into the canonical RawJob shape.
/// Every Remotive posting is remote by definition.
fn normalize(payload: &Value) -> RawJob {
    let text = |key: &str| {
        payload
            .get(key)
            .and_then(|v| v.as_str())
            .filter(|s| !s.trim().is_empty())
            .map(|s| s.trim().to_string())
    };

    let (salary_min, salary_max) = text("salary")
        .map(|s| parse_salary_text(&s))
        .unwrap_or((None, None));

    RawJob {
        source: "remotive".to_string(),
        title: text("title").unwrap_or_default(),
        company: text("company_name").unwrap_or_default(),
        industry: text("category"),
        location: text("candidate_required_location"),
        salary_min,
        salary_max,
        employment_type: text("job_type"),
        remote: true,
        company_size: None,
        description: text("description"),
        url: text("url"),
        payload: payload.clone(),
    }
}

/// Best-effort parse of Remotive's free-text salary field
/// (e.g. "$100,000 - $130,000" or "120k USD"). Unparseable text yields None —
/// an unknown salary, never a zero.
fn parse_salary_text(text: &str) -> (Option<i64>, Option<i64>) {
    let mut figures = Vec::new();
    let mut current = String::new();
    for c in text.chars() {
        if c.is_ascii_digit() {
            current.push(c);
        } else if c == ',' && !current.is_empty() {
            // thousands separator inside a figure
        } else {
            if !current.is_empty() {
                if let Ok(mut n) = current.parse::<i64>() {
                    if c == 'k' || c == 'K' {
                        n *= 1000;
                    }
                    figures.push(n);
                }
                current.clear();
            }
        }
    }
    if !current.is_empty() {
        if let Ok(n) = current.parse::<i64>() {
            figures.push(n);
        }
    }

    // Annual salaries only — tiny figures are hourly rates or noise.
    figures.retain(|n| *n >= 10_000);
    match figures.as_slice() {
        [] => (None, None),
        [one] => (Some(*one), Some(*one)),
        [first, .., last] => (Some(*first.min(last)), Some(*first.max(last))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_maps_remotive_fields() {
        let payload = json!({
            "url": "https://remotive.com/remote-jobs/software-dev/rust-engineer-123",
            "title": "Rust Engineer",
            "company_name": "Acme",
            "category": "Software Development",
            "job_type": "full_time",
            "candidate_required_location": "Worldwide",
            "salary": "$100,000 - $130,000",
            "description": "Build things."
        });

        let raw = normalize(&payload);
        assert_eq!(raw.source, "remotive");
        assert_eq!(raw.title, "Rust Engineer");
        assert_eq!(raw.company, "Acme");
        assert_eq!(raw.industry.as_deref(), Some("Software Development"));
        assert!(raw.remote);
        assert_eq!(raw.salary_min, Some(100_000));
        assert_eq!(raw.salary_max, Some(130_000));
    }

    #[test]
    fn test_normalize_missing_salary_is_unknown() {
        let payload = json!({
            "title": "Rust Engineer",
            "company_name": "Acme"
        });
        let raw = normalize(&payload);
        assert_eq!(raw.salary_min, None);
        assert_eq!(raw.salary_max, None);
        assert_eq!(raw.url, None);
    }

    #[test]
    fn test_parse_salary_range() {
        assert_eq!(
            parse_salary_text("$100,000 - $130,000"),
            (Some(100_000), Some(130_000))
        );
    }

    #[test]
    fn test_parse_salary_single_figure_with_k() {
        assert_eq!(parse_salary_text("120k USD"), (Some(120_000), Some(120_000)));
    }

    #[test]
    fn test_parse_salary_noise_is_unknown() {
        assert_eq!(parse_salary_text("competitive"), (None, None));
        assert_eq!(parse_salary_text("$45/hour"), (None, None));
    }
}
