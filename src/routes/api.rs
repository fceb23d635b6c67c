use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::handlers::{api, personas};
use crate::state::AppState;
use std::sync::Arc;

/// Create the HTTP API router
pub fn create_api_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(api::root))
        .route("/health", get(api::health_check))
        .route("/api/personas", get(personas::list_personas))
        .route("/api/personas/active", get(personas::active_persona))
        .route("/api/personas/{id}/preview", post(personas::preview_persona))
        .layer(TraceLayer::new_for_http())
}
