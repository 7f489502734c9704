use std::sync::Arc;

use redis::Client as RedisClient;
use sqlx::PgPool;

use crate::autonomy::AutonomyStateProvider;
use crate::config::Config;
use crate::cost::CostTracker;
use crate::llm_client::LlmClient;
use crate::providers::JobProvider;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    /// Redis carries the swipe → pattern-re-detection trigger queue.
    pub redis: RedisClient,
    pub llm: LlmClient,
    pub config: Config,
    /// Configured job providers, fanned out per matching run.
    pub providers: Arc<Vec<Arc<dyn JobProvider>>>,
    /// Read-only window onto externally-owned tier/brake state.
    pub autonomy: Arc<dyn AutonomyStateProvider>,
    /// Fire-and-forget seam to the external cost collector.
    pub cost: Arc<dyn CostTracker>,
}
