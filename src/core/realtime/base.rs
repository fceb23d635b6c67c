//! Base types for the upstream speech-to-speech session.
//!
//! The bridge talks to one provider (the OpenAI Realtime API) but keeps the
//! error and configuration types provider-neutral so the call core never
//! depends on wire details.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::core::codec::TELEPHONY_SAMPLE_RATE;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur while talking to the upstream session.
#[derive(Debug, Error)]
pub enum RealtimeError {
    /// Connection to the provider failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// WebSocket error
    #[error("WebSocket error: {0}")]
    WebSocketError(String),

    /// Provider reported an error event
    #[error("Provider error: {0}")]
    ProviderError(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Operation timeout
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Not connected
    #[error("Not connected")]
    NotConnected,
}

/// Result type for realtime operations.
pub type RealtimeResult<T> = Result<T, RealtimeError>;

impl From<serde_json::Error> for RealtimeError {
    fn from(err: serde_json::Error) -> Self {
        RealtimeError::SerializationError(err.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for RealtimeError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        RealtimeError::WebSocketError(err.to_string())
    }
}

// =============================================================================
// Audio Format
// =============================================================================

/// Audio encoding used on the upstream leg.
///
/// `Pcm16` is 16-bit little-endian PCM at 24 kHz, so telephony audio is
/// expanded and resampled in both directions. `G711Ulaw` is passed through
/// untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpstreamAudioFormat {
    #[default]
    Pcm16,
    G711Ulaw,
}

impl UpstreamAudioFormat {
    /// Format type string used in the session configuration.
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pcm16 => "audio/pcm",
            Self::G711Ulaw => "audio/pcmu",
        }
    }

    /// Sample rate of audio on the upstream leg.
    #[inline]
    pub fn sample_rate(&self) -> u32 {
        match self {
            Self::Pcm16 => 24000,
            Self::G711Ulaw => TELEPHONY_SAMPLE_RATE,
        }
    }

    /// Parse from a config value, with fallback to default.
    pub fn from_str_or_default(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "g711_ulaw" | "ulaw" | "mulaw" | "pcmu" | "audio/pcmu" => Self::G711Ulaw,
            _ => Self::Pcm16,
        }
    }
}

impl fmt::Display for UpstreamAudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pcm16 => write!(f, "pcm16"),
            Self::G711Ulaw => write!(f, "g711_ulaw"),
        }
    }
}

// =============================================================================
// Configuration Types
// =============================================================================

/// Configuration for one upstream session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RealtimeConfig {
    /// API key for authentication
    pub api_key: String,

    /// WebSocket endpoint, without query parameters
    #[serde(default)]
    pub url: String,

    /// Model to use (e.g., "gpt-realtime")
    #[serde(default)]
    pub model: String,

    /// Voice for spoken output
    #[serde(default)]
    pub voice: Option<String>,

    /// System instructions for the assistant
    #[serde(default)]
    pub instructions: Option<String>,

    /// Sampling temperature
    #[serde(default)]
    pub temperature: Option<f32>,

    /// Audio encoding on the upstream leg, both directions
    #[serde(default)]
    pub audio_format: UpstreamAudioFormat,

    /// Turn detection configuration
    #[serde(default)]
    pub turn_detection: TurnDetectionConfig,
}

/// Configuration for turn detection (VAD).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TurnDetectionConfig {
    /// Server-side VAD
    #[serde(rename = "server_vad")]
    ServerVad {
        /// Activation threshold (0.0 to 1.0)
        #[serde(default, skip_serializing_if = "Option::is_none")]
        threshold: Option<f32>,
        /// Amount of audio to include before voice detection (ms)
        #[serde(default, skip_serializing_if = "Option::is_none")]
        prefix_padding_ms: Option<u32>,
        /// Silence duration before end of turn (ms)
        #[serde(default, skip_serializing_if = "Option::is_none")]
        silence_duration_ms: Option<u32>,
    },
    /// Semantic-aware turn detection
    #[serde(rename = "semantic_vad")]
    SemanticVad {
        /// Eagerness level (low, medium, high, auto)
        #[serde(default, skip_serializing_if = "Option::is_none")]
        eagerness: Option<String>,
    },
}

impl Default for TurnDetectionConfig {
    fn default() -> Self {
        TurnDetectionConfig::ServerVad {
            threshold: None,
            prefix_padding_ms: None,
            silence_duration_ms: None,
        }
    }
}
