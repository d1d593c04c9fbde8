//! Router configuration for the HTTP API.
//!
//! This module sets up all routes, middleware (CORS, compression, tracing),
//! and creates the axum router ready for serving.

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post, put},
    Router,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers;
use super::state::AppState;

/// Create the main application router with all routes and middleware.
pub fn create_router(state: AppState) -> Router {
    // CORS configuration - permissive for development, should be restricted in production
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_v1 = Router::new()
        // Import validation
        .route("/jobs/validate", post(handlers::validate_jobs))
        .route("/staff/validate", post(handlers::validate_staff))
        // Optimization runs
        .route("/optimize", post(handlers::optimize))
        .route("/runs/{run_id}", get(handlers::get_run_status))
        .route("/runs/{run_id}/logs", get(handlers::stream_run_logs))
        // Manual overrides
        .route("/assignments/commands", post(handlers::apply_command))
        // Settings
        .route("/settings/drive-time-token", put(handlers::set_drive_time_token));

    Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/v1", api_v1)
        // Day snapshots with a few thousand jobs fit comfortably.
        .layer(DefaultBodyLimit::max(10 * 1024 * 1024))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
