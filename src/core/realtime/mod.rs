//! Upstream speech-to-speech session.
//!
//! This module holds the provider-neutral error and configuration types and
//! the OpenAI Realtime implementation used for live calls and voice previews.
//!
//! # Audio Format
//!
//! - `pcm16`: PCM 16-bit signed little-endian at 24kHz (default)
//! - `g711_ulaw`: G.711 u-law at 8kHz, passed through from the telephony leg

mod base;
pub mod openai;

pub use base::{
    RealtimeConfig, RealtimeError, RealtimeResult, TurnDetectionConfig, UpstreamAudioFormat,
};
pub use openai::{
    ClientEvent, OPENAI_REALTIME_SAMPLE_RATE, OPENAI_REALTIME_URL, OpenAIRealtime,
    OpenAIRealtimeVoice, PreviewAudio, ServerEvent, create_preview_audio,
};
