//! Configuration module for the call bridge
//!
//! This module handles server configuration from various sources: .env files, YAML files,
//! and environment variables. Priority: YAML > ENV vars > .env values > defaults.
//!
//! # Modules
//! - `yaml`: YAML configuration file loading
//! - `env`: Environment variable loading
//! - `merge`: Merging YAML and environment configurations
//! - `validation`: Configuration validation logic
//!
//! # Example
//! ```rust,no_run
//! use call_bridge::config::ServerConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from environment variables only
//! let config = ServerConfig::from_env()?;
//!
//! // Load from YAML file with environment variable overrides
//! let config_path = PathBuf::from("config.yaml");
//! let config = ServerConfig::from_file(&config_path)?;
//!
//! println!("Server listening on {}", config.address());
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::core::persona::PersonaConfig;
use crate::core::realtime::openai::{DEFAULT_REALTIME_MODEL, OPENAI_REALTIME_URL};
use crate::core::realtime::{RealtimeConfig, TurnDetectionConfig, UpstreamAudioFormat};

mod env;
mod merge;
mod validation;
mod yaml;

pub use validation::TEMPERATURE_RANGE;

/// Default instructions when neither config nor persona provide any.
pub const DEFAULT_SYSTEM_MESSAGE: &str = "You are a friendly, upbeat voice assistant on a phone call. \
Keep answers short and conversational, and ask a clarifying question when the caller is unclear.";

/// Greeting spoken when the persona has none.
pub const DEFAULT_GREETING: &str = "Hello there! How can I help you today?";

/// `<Say>` voice used in the call-control response.
pub const DEFAULT_SAY_VOICE: &str = "Google.en-US-Chirp3-HD-Aoede";

/// Upstream event types logged with their payload by default.
pub const DEFAULT_LOG_EVENT_TYPES: &[&str] = &[
    "error",
    "response.content.done",
    "rate_limits.updated",
    "response.done",
    "input_audio_buffer.committed",
    "input_audio_buffer.speech_stopped",
    "input_audio_buffer.speech_started",
    "session.created",
    "session.updated",
];

/// Id of the persona built from server defaults.
pub const DEFAULT_PERSONA_ID: &str = "default";

/// TLS configuration for HTTPS and WSS
#[derive(Debug, Clone)]
pub struct TlsConfig {
    /// Path to the TLS certificate file (PEM format)
    pub cert_path: PathBuf,
    /// Path to the TLS private key file (PEM format)
    pub key_path: PathBuf,
}

/// Provider API key, wiped from memory on drop and redacted in `Debug`.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

/// Server configuration
///
/// Contains all configuration needed to run the bridge:
/// - Server settings (host, port, TLS, public host for TwiML)
/// - Upstream provider settings (API key, model, endpoint)
/// - Assistant defaults (voice, temperature, instructions, audio format)
/// - Debug logging controls and preview settings
#[derive(Debug, Clone)]
pub struct ServerConfig {
    // Server settings
    pub host: String,
    pub port: u16,
    /// Host advertised in the media-stream URL; the request `Host` header is
    /// used when unset
    pub public_host: Option<String>,

    // TLS configuration (optional)
    pub tls: Option<TlsConfig>,

    // Upstream provider
    pub openai_api_key: Option<ApiKey>,
    pub realtime_model: String,
    pub realtime_url: String,

    // Assistant defaults
    pub voice: String,
    pub temperature: f32,
    pub system_message: String,
    pub upstream_audio_format: UpstreamAudioFormat,
    pub greet_on_connect: bool,

    // Debug logging
    pub show_timing_math: bool,
    pub log_event_types: Vec<String>,

    // Preview
    pub preview_timeout_ms: u64,

    // Personas
    pub personas_path: Option<PathBuf>,

    // Call control
    pub say_voice: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5050,
            public_host: None,
            tls: None,
            openai_api_key: None,
            realtime_model: DEFAULT_REALTIME_MODEL.to_string(),
            realtime_url: OPENAI_REALTIME_URL.to_string(),
            voice: "alloy".to_string(),
            temperature: 0.8,
            system_message: DEFAULT_SYSTEM_MESSAGE.to_string(),
            upstream_audio_format: UpstreamAudioFormat::default(),
            greet_on_connect: false,
            show_timing_math: false,
            log_event_types: DEFAULT_LOG_EVENT_TYPES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            preview_timeout_ms: 15_000,
            personas_path: None,
            say_voice: DEFAULT_SAY_VOICE.to_string(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables only
    ///
    /// Priority order (highest to lowest):
    /// 1. Environment variables (actual ENV vars override .env values)
    /// 2. .env file values (loaded in main.rs)
    /// 3. Default values
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        let config = merge::merge_config(None)?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a YAML file with environment variable base
    ///
    /// Priority order (highest to lowest):
    /// 1. YAML file values
    /// 2. Environment variables (actual ENV vars override .env values)
    /// 3. .env file values
    /// 4. Default values
    ///
    /// # Errors
    /// Returns an error if:
    /// - The YAML file cannot be read or is malformed
    /// - Environment variables have invalid formats
    /// - Configuration validation fails
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        // .env is loaded in main.rs; YAML overrides everything it provides
        let yaml_config = yaml::YamlConfig::from_file(path)?;
        let config = merge::merge_config(Some(yaml_config))?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Get the server address as a string
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check if TLS is enabled
    pub fn is_tls_enabled(&self) -> bool {
        self.tls.is_some()
    }

    pub fn openai_api_key(&self) -> Option<&str> {
        self.openai_api_key
            .as_ref()
            .map(ApiKey::expose)
            .filter(|k| !k.is_empty())
    }

    pub fn preview_timeout(&self) -> Duration {
        Duration::from_millis(self.preview_timeout_ms)
    }

    pub fn should_log_event(&self, event_type: &str) -> bool {
        self.log_event_types.iter().any(|t| t == event_type)
    }

    /// Persona used when no persona source is configured.
    pub fn default_persona(&self) -> PersonaConfig {
        PersonaConfig {
            id: DEFAULT_PERSONA_ID.to_string(),
            name: Some("Default assistant".to_string()),
            voice: Some(self.voice.clone()),
            system_message: Some(self.system_message.clone()),
            initial_greeting: None,
            is_active: true,
        }
    }

    /// Upstream session settings for a call or preview with `persona`.
    pub fn realtime_config(&self, persona: &PersonaConfig) -> RealtimeConfig {
        RealtimeConfig {
            api_key: self.openai_api_key().unwrap_or_default().to_string(),
            url: self.realtime_url.clone(),
            model: self.realtime_model.clone(),
            voice: Some(persona.voice_or(&self.voice).to_string()),
            instructions: Some(persona.instructions_or(&self.system_message).to_string()),
            temperature: Some(self.temperature),
            audio_format: self.upstream_audio_format,
            turn_detection: TurnDetectionConfig::default(),
        }
    }
}
