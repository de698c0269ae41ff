use super::handlers;
use super::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        .route("/modes", get(handlers::list_modes))
        // Speaking (Live audio)
        .route("/speaking/start", post(handlers::start_speaking))
        .route("/speaking/stop", post(handlers::stop_speaking))
        .route("/speaking/status", get(handlers::speaking_status))
        // Generated content
        .route("/reading/flashcard", post(handlers::generate_flashcard))
        .route("/reading/illustration", post(handlers::generate_illustration))
        .route("/listening/story", post(handlers::generate_story))
        .route("/writing/check", post(handlers::check_handwriting))
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
