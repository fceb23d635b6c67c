use axum::{Json, extract::State};
use serde::Serialize;
use std::sync::Arc;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct RootResponse {
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub uptime_seconds: f64,
}

pub async fn root() -> Json<RootResponse> {
    Json(RootResponse {
        message: "Media stream bridge is running",
    })
}

/// Liveness probe
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: true,
        uptime_seconds: state.uptime().as_secs_f64(),
    })
}
