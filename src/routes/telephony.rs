//! Telephony route configuration
//!
//! # Endpoints
//!
//! - `GET|POST /incoming-call` - TwiML that connects the call to the media stream
//! - `GET /media-stream` - WebSocket upgrade carrying the call audio
//!
//! # Protocol
//!
//! The telephony provider sends `connected`, `start`, `media`, `mark` and
//! `stop` events as JSON text frames. The bridge replies with `media`,
//! `mark` and `clear` messages for the same `streamSid`.

use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use crate::handlers::{incoming_call_handler, media_stream_handler};
use crate::state::AppState;
use std::sync::Arc;

pub fn create_telephony_router() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/incoming-call",
            get(incoming_call_handler).post(incoming_call_handler),
        )
        .route("/media-stream", get(media_stream_handler))
        .layer(TraceLayer::new_for_http())
}
