//! Persona listing and voice preview.

use axum::{
    Json,
    extract::{Path, State},
};
use std::sync::Arc;
use tracing::{info, warn};

use crate::core::persona::PersonaConfig;
use crate::core::realtime::{PreviewAudio, create_preview_audio};
use crate::errors::{AppError, AppResult};
use crate::state::AppState;

/// Handle `GET /api/personas`
pub async fn list_personas(State(state): State<Arc<AppState>>) -> Json<Vec<PersonaConfig>> {
    Json(state.personas.list().await)
}

/// Handle `GET /api/personas/active`
pub async fn active_persona(State(state): State<Arc<AppState>>) -> AppResult<Json<PersonaConfig>> {
    state
        .personas
        .active()
        .await
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Active persona".to_string()))
}

/// Handle `POST /api/personas/{id}/preview`
///
/// Speaks the persona's greeting (else its instructions, else a fixed
/// prompt) with the persona voice and returns the audio as base64 WAV.
///
/// # Errors
/// - 404 if the persona does not exist
/// - 503 if no provider API key is configured
/// - 504 if the provider does not finish within the preview timeout
/// - 502 for other provider failures
pub async fn preview_persona(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> AppResult<Json<PreviewAudio>> {
    let persona = state
        .personas
        .get(&id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("Persona {id}")))?;

    if state.config.openai_api_key().is_none() {
        return Err(AppError::ServiceUnavailable(
            "OpenAI API key not configured".to_string(),
        ));
    }

    let realtime_config = state.config.realtime_config(&persona);
    info!(
        persona = %persona.id,
        voice = ?realtime_config.voice,
        "Generating voice preview"
    );

    let audio = create_preview_audio(
        realtime_config,
        persona.preview_prompt(),
        state.config.preview_timeout(),
    )
    .await
    .map_err(|e| {
        warn!(persona = %persona.id, "Voice preview failed: {}", e);
        AppError::from(e)
    })?;

    Ok(Json(audio))
}
