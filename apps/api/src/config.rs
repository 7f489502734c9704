use anyhow::{Context, Result};

/// Application configuration loaded from environment variables.
/// Panics at startup if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub anthropic_api_key: String,
    pub port: u16,
    pub rust_log: String,
    /// Gates the LLM refinement pass. Off = heuristic scores pass through unchanged.
    pub enable_llm_refinement: bool,
    /// Minimum final score for a Match row to be created.
    pub match_threshold: i64,
    /// Adzuna credentials. The Adzuna provider is only registered when both are set.
    pub adzuna_app_id: Option<String>,
    pub adzuna_app_key: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            redis_url: require_env("REDIS_URL")?,
            anthropic_api_key: require_env("ANTHROPIC_API_KEY")?,
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            enable_llm_refinement: std::env::var("ENABLE_LLM_REFINEMENT")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            match_threshold: std::env::var("MATCH_THRESHOLD")
                .unwrap_or_else(|_| "40".to_string())
                .parse::<i64>()
                .context("MATCH_THRESHOLD must be an integer")?,
            adzuna_app_id: std::env::var("ADZUNA_APP_ID").ok(),
            adzuna_app_key: std::env::var("ADZUNA_APP_KEY").ok(),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}
