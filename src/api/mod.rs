// src/api/mod.rs

pub mod error;
pub mod handlers;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::app::AppState;

/// Builds the HTTP router for the scan service.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/scan", post(handlers::scan_handler))
        .route("/progress/{scan_id}", get(handlers::progress_handler))
        .route("/health", get(handlers::health_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
