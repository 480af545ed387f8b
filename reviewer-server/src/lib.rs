pub mod api;
pub mod config;
pub mod sqlite;

use axum::{http::StatusCode, response::Json, routing::get, Router};
use serde_json::json;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use reviewer_core::ReviewService;

pub use sqlite::SqliteRepository;

pub fn get_service_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Shared state handed to every handler.
pub struct AppState {
    pub service: Arc<ReviewService>,
}

async fn health_check() -> Result<Json<serde_json::Value>, StatusCode> {
    Ok(Json(json!({
        "status": "healthy",
        "service": "reviewer",
        "version": get_service_version(),
    })))
}

/// Build the full application router: health check, API routes and request
/// tracing.
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .merge(api::api_router())
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}
