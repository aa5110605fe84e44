//! HTTP routes

pub mod ask;
pub mod health;
pub mod predict;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::SharedState;

/// Build the application router
pub fn router(state: SharedState) -> Router {
    let body_limit = state.config.max_upload_bytes();

    Router::new()
        // Health check
        .route("/health", get(health::health_check))

        // Classification
        .route("/predict", post(predict::predict))

        // Question echo
        .route("/ask", post(ask::ask))

        // Add state
        .with_state(state)

        // Add middleware
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}
