use async_trait::async_trait;
use tracing::info;
use uuid::Uuid;

/// Seam to the external cost-tracking collaborator. Fire-and-forget: callers
/// never wait on delivery guarantees and failures never surface into the
/// pipeline.
#[async_trait]
pub trait CostTracker: Send + Sync {
    async fn track(&self, user_id: Uuid, tokens_estimate: u32, task_name: &str);
}

/// Default implementation: emits a structured log line for the external
/// collector to scrape. Persistence of the ledger is owned elsewhere.
pub struct LoggingCostTracker;

#[async_trait]
impl CostTracker for LoggingCostTracker {
    async fn track(&self, user_id: Uuid, tokens_estimate: u32, task_name: &str) {
        info!(
            user_id = %user_id,
            tokens_estimate,
            task_name,
            "llm cost recorded"
        );
    }
}
