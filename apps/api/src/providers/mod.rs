//! Source Aggregator — fans a normalized query out to every configured job
//! provider concurrently and joins with exception isolation: one slow or
//! failing provider never blocks or fails the others.

use async_trait::async_trait;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

use crate::models::job::RawJob;

pub mod adzuna;
pub mod remotive;

/// Independent timeout per provider call. Expiry is a soft failure: the
/// provider contributes zero candidates and one failure entry.
pub const PROVIDER_TIMEOUT: Duration = Duration::from_secs(30);

/// A normalized search query dispatched identically to every provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchQuery {
    pub keywords: String,
    pub location: Option<String>,
    #[serde(default)]
    pub remote_only: bool,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_limit() -> u32 {
    50
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Malformed payload: {0}")]
    Malformed(String),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),
}

/// One upstream job-posting source. Each implementation owns the
/// normalization of its provider-specific payload into `RawJob`.
#[async_trait]
pub trait JobProvider: Send + Sync {
    fn name(&self) -> &str;
    async fn search(&self, query: &SearchQuery) -> Result<Vec<RawJob>, ProviderError>;
}

/// Per-provider error summary kept for observability — a failed provider is
/// reported, never fatal.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderFailure {
    pub provider: String,
    pub reason: String,
}

/// Union of all successful provider results plus the failure summary.
#[derive(Debug)]
pub struct AggregateOutcome {
    pub candidates: Vec<RawJob>,
    pub failures: Vec<ProviderFailure>,
}

/// Dispatches one request per provider concurrently, each under its own
/// timeout, and joins with gather-with-errors semantics. Pure fan-out/fan-in:
/// no side effects beyond the outbound calls.
pub async fn aggregate(
    providers: &[Arc<dyn JobProvider>],
    query: &SearchQuery,
) -> AggregateOutcome {
    aggregate_with_timeout(providers, query, PROVIDER_TIMEOUT).await
}

async fn aggregate_with_timeout(
    providers: &[Arc<dyn JobProvider>],
    query: &SearchQuery,
    timeout: Duration,
) -> AggregateOutcome {
    let calls = providers.iter().map(|provider| {
        let provider = Arc::clone(provider);
        async move {
            let name = provider.name().to_string();
            match tokio::time::timeout(timeout, provider.search(query)).await {
                Ok(Ok(jobs)) => (name, Ok(jobs)),
                Ok(Err(e)) => (name, Err(e)),
                Err(_) => (name, Err(ProviderError::Timeout(timeout))),
            }
        }
    });

    let mut candidates = Vec::new();
    let mut failures = Vec::new();

    for (name, result) in join_all(calls).await {
        match result {
            Ok(jobs) => {
                info!("Provider {name} returned {} candidates", jobs.len());
                candidates.extend(jobs);
            }
            Err(e) => {
                warn!("Provider {name} failed: {e}");
                failures.push(ProviderFailure {
                    provider: name,
                    reason: e.to_string(),
                });
            }
        }
    }

    AggregateOutcome {
        candidates,
        failures,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn make_raw(title: &str) -> RawJob {
        RawJob {
            source: "test".to_string(),
            title: title.to_string(),
            company: "Acme".to_string(),
            industry: None,
            location: Some("Berlin".to_string()),
            salary_min: None,
            salary_max: None,
            employment_type: Some("full_time".to_string()),
            remote: false,
            company_size: None,
            description: None,
            url: Some(format!("https://example.com/{title}")),
            payload: json!({}),
        }
    }

    struct FixedProvider {
        name: String,
        count: usize,
    }

    #[async_trait]
    impl JobProvider for FixedProvider {
        fn name(&self) -> &str {
            &self.name
        }

        async fn search(&self, _query: &SearchQuery) -> Result<Vec<RawJob>, ProviderError> {
            Ok((0..self.count)
                .map(|i| make_raw(&format!("{}-{}", self.name, i)))
                .collect())
        }
    }

    struct FailingProvider;

    #[async_trait]
    impl JobProvider for FailingProvider {
        fn name(&self) -> &str {
            "failing"
        }

        async fn search(&self, _query: &SearchQuery) -> Result<Vec<RawJob>, ProviderError> {
            Err(ProviderError::Api {
                status: 503,
                message: "unavailable".to_string(),
            })
        }
    }

    struct HangingProvider;

    #[async_trait]
    impl JobProvider for HangingProvider {
        fn name(&self) -> &str {
            "hanging"
        }

        async fn search(&self, _query: &SearchQuery) -> Result<Vec<RawJob>, ProviderError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(vec![])
        }
    }

    fn query() -> SearchQuery {
        SearchQuery {
            keywords: "rust".to_string(),
            location: None,
            remote_only: false,
            limit: 50,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_timeout_two_successes_yields_union_and_one_failure() {
        let providers: Vec<Arc<dyn JobProvider>> = vec![
            Arc::new(FixedProvider {
                name: "a".to_string(),
                count: 5,
            }),
            Arc::new(FixedProvider {
                name: "b".to_string(),
                count: 7,
            }),
            Arc::new(HangingProvider),
        ];

        let outcome = aggregate(&providers, &query()).await;
        assert_eq!(outcome.candidates.len(), 12);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].provider, "hanging");
    }

    #[tokio::test]
    async fn test_provider_error_is_isolated() {
        let providers: Vec<Arc<dyn JobProvider>> = vec![
            Arc::new(FailingProvider),
            Arc::new(FixedProvider {
                name: "ok".to_string(),
                count: 3,
            }),
        ];

        let outcome = aggregate(&providers, &query()).await;
        assert_eq!(outcome.candidates.len(), 3);
        assert_eq!(outcome.failures.len(), 1);
        assert!(outcome.failures[0].reason.contains("503"));
    }

    #[tokio::test]
    async fn test_no_providers_yields_empty_outcome() {
        let outcome = aggregate(&[], &query()).await;
        assert!(outcome.candidates.is_empty());
        assert!(outcome.failures.is_empty());
    }

    #[tokio::test]
    async fn test_all_failures_still_complete() {
        let providers: Vec<Arc<dyn JobProvider>> =
            vec![Arc::new(FailingProvider), Arc::new(FailingProvider)];
        let outcome = aggregate(&providers, &query()).await;
        assert!(outcome.candidates.is_empty());
        assert_eq!(outcome.failures.len(), 2);
    }
}
