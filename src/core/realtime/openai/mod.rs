//! OpenAI Realtime API module.
//!
//! Wire types, session configuration and the WebSocket handshake for the
//! upstream speech-to-speech session, plus the one-shot voice preview.
//!
//! # Audio Format
//!
//! Calls use either `audio/pcm` (PCM 16-bit signed little-endian at 24kHz)
//! or `audio/pcmu` (G.711 u-law at 8kHz). Previews always request PCM and
//! wrap it in a WAV container.

mod client;
mod config;
mod messages;
mod preview;

pub use client::{OpenAIRealtime, UpstreamSink, UpstreamSocket, UpstreamStream};
pub use config::{
    DEFAULT_REALTIME_MODEL, OPENAI_REALTIME_SAMPLE_RATE, OPENAI_REALTIME_URL, OpenAIRealtimeVoice,
};
pub use messages::{
    ApiError, AudioConfig, AudioFormatSpec, ClientEvent, ContentPart, ConversationItem,
    ServerEvent, SessionConfig, TurnDetection,
};
pub use preview::{
    PREVIEW_CONTENT_TYPE, PreviewAudio, PreviewCollector, create_preview_audio, pcm16_to_wav,
};
