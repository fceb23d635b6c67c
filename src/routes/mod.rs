pub mod api;
pub mod telephony;

use axum::Router;
use std::sync::Arc;

use crate::state::AppState;

/// Full application router with state applied.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(api::create_api_router())
        .merge(telephony::create_telephony_router())
        .with_state(state)
}
