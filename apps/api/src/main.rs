mod autonomy;
mod config;
mod cost;
mod db;
mod errors;
mod learning;
mod llm_client;
mod matching;
mod models;
mod providers;
mod routes;
mod state;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::autonomy::PgAutonomyProvider;
use crate::config::Config;
use crate::cost::LoggingCostTracker;
use crate::db::create_pool;
use crate::learning::worker::run_learning_worker;
use crate::llm_client::LlmClient;
use crate::providers::{adzuna::AdzunaProvider, remotive::RemotiveProvider, JobProvider};
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (panics on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Matching API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL
    let db = create_pool(&config.database_url).await?;

    // Initialize Redis (pattern re-detection trigger queue)
    let redis = redis::Client::open(config.redis_url.clone())?;
    info!("Redis client initialized");

    // Initialize LLM client
    let llm = LlmClient::new(config.anthropic_api_key.clone());
    info!("LLM client initialized (model: {})", llm_client::MODEL);

    // Register job providers. Remotive needs no credentials; Adzuna only
    // joins the fan-out when keys are configured.
    let mut providers: Vec<Arc<dyn JobProvider>> = vec![Arc::new(RemotiveProvider::new())];
    if let (Some(app_id), Some(app_key)) =
        (config.adzuna_app_id.clone(), config.adzuna_app_key.clone())
    {
        providers.push(Arc::new(AdzunaProvider::new(app_id, app_key)));
    }
    info!("{} job providers registered", providers.len());

    // Autonomy state is externally owned; we only read it.
    let autonomy = Arc::new(PgAutonomyProvider::new(db.clone()));

    // Build app state
    let state = AppState {
        db: db.clone(),
        redis: redis.clone(),
        llm,
        config: config.clone(),
        providers: Arc::new(providers),
        autonomy: autonomy.clone(),
        cost: Arc::new(LoggingCostTracker),
    };

    // Background pattern-detection worker
    tokio::spawn(run_learning_worker(db, redis, autonomy));

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: tighten CORS in production

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
