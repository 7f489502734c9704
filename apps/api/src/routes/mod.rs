pub mod health;

use axum::{
    routing::{get, patch, post},
    Router,
};

use crate::autonomy::handlers as autonomy_handlers;
use crate::learning::handlers as learning_handlers;
use crate::matching::handlers as matching_handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Matching pipeline
        .route(
            "/api/v1/matching/run",
            post(matching_handlers::handle_run_matching),
        )
        .route(
            "/api/v1/matches/:id/rationale",
            get(matching_handlers::handle_get_rationale),
        )
        .route(
            "/api/v1/matches/:id/swipe",
            post(learning_handlers::handle_swipe),
        )
        // Learned preferences
        .route(
            "/api/v1/preferences/learned",
            get(learning_handlers::handle_list_learned),
        )
        .route(
            "/api/v1/preferences/learned/detect",
            post(learning_handlers::handle_detect_patterns),
        )
        .route(
            "/api/v1/preferences/learned/:id",
            patch(learning_handlers::handle_update_learned_status),
        )
        // Approval queue
        .route(
            "/api/v1/approvals",
            get(autonomy_handlers::handle_list_pending),
        )
        .route(
            "/api/v1/approvals/:id/resolve",
            post(autonomy_handlers::handle_resolve),
        )
        .with_state(state)
}
