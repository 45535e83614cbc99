use super::handlers;
use super::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Voice control
        .route("/voice/start", post(handlers::start_voice))
        .route("/voice/stop", post(handlers::stop_voice))
        // Voice queries
        .route("/voice/status", get(handlers::voice_status))
        .route("/voice/stats", get(handlers::voice_stats))
        // Request logging, and CORS for a browser UI
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
