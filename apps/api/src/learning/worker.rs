//! Background pattern-detection worker.
//!
//! Drains the Redis trigger list and re-mines patterns per user. Detection
//! is batch/on-demand by design — never inline on a swipe — and the worker
//! honors the brake: an engaged user is skipped, the trigger simply fires
//! again on their next swipe.

use redis::AsyncCommands;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

use super::patterns::sync_patterns;
use super::LEARNING_QUEUE_KEY;
use crate::autonomy::AutonomyStateProvider;

const POP_TIMEOUT_SECS: f64 = 5.0;
const RETRY_BACKOFF: Duration = Duration::from_secs(5);

pub async fn run_learning_worker(
    pool: PgPool,
    redis: redis::Client,
    autonomy: Arc<dyn AutonomyStateProvider>,
) {
    info!("Learning worker started");
    loop {
        if let Err(e) = poll_once(&pool, &redis, autonomy.as_ref()).await {
            warn!("Learning worker iteration failed: {e}");
            tokio::time::sleep(RETRY_BACKOFF).await;
        }
    }
}

async fn poll_once(
    pool: &PgPool,
    redis: &redis::Client,
    autonomy: &dyn AutonomyStateProvider,
) -> anyhow::Result<()> {
    let mut conn = redis.get_multiplexed_async_connection().await?;
    let popped: Option<(String, String)> = conn.brpop(LEARNING_QUEUE_KEY, POP_TIMEOUT_SECS).await?;

    let Some((_, raw_user_id)) = popped else {
        return Ok(());
    };
    let user_id: Uuid = raw_user_id.parse()?;

    if autonomy.brake_engaged(user_id).await? {
        warn!("Skipping pattern detection for {user_id}: brake engaged");
        return Ok(());
    }

    let patterns = sync_patterns(pool, user_id).await?;
    info!(
        "Re-detected patterns for {}: {} rows upserted",
        user_id,
        patterns.len()
    );
    Ok(())
}
