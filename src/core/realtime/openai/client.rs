//! OpenAI Realtime API client.
//!
//! The client owns the per-call [`RealtimeConfig`], builds the session
//! configuration the bridge sends once the socket is open, and performs the
//! authenticated WebSocket handshake. The socket itself is handed back to the
//! caller, which drives reads and writes from its own event loop.
//!
//! # API Reference
//!
//! - Endpoint: `wss://api.openai.com/v1/realtime?model=<model>`
//! - Protocol: WebSocket with JSON events
//! - Audio: `audio/pcm` (24kHz PCM16) or `audio/pcmu` (8kHz G.711 u-law), base64 encoded

use futures_util::stream::{SplitSink, SplitStream};
use http::HeaderValue;
use http::header::AUTHORIZATION;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::info;
use url::Url;

use super::config::{DEFAULT_REALTIME_MODEL, OPENAI_REALTIME_URL, OpenAIRealtimeVoice};
use super::messages::{
    AudioConfig, AudioFormatSpec, AudioInputConfig, AudioOutputConfig, ClientEvent,
    ConversationItem, SessionConfig, TurnDetection,
};
use crate::core::realtime::base::{
    RealtimeConfig, RealtimeError, RealtimeResult, TurnDetectionConfig, UpstreamAudioFormat,
};

/// WebSocket connection to the upstream session.
pub type UpstreamSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;
/// Write half of [`UpstreamSocket`].
pub type UpstreamSink = SplitSink<UpstreamSocket, Message>;
/// Read half of [`UpstreamSocket`].
pub type UpstreamStream = SplitStream<UpstreamSocket>;

// =============================================================================
// OpenAI Realtime Client
// =============================================================================

/// OpenAI Realtime API client for one upstream session.
#[derive(Debug, Clone)]
pub struct OpenAIRealtime {
    config: RealtimeConfig,
    voice: OpenAIRealtimeVoice,
}

impl OpenAIRealtime {
    /// Validate the configuration and create a client.
    pub fn new(config: RealtimeConfig) -> RealtimeResult<Self> {
        if config.api_key.is_empty() {
            return Err(RealtimeError::InvalidConfiguration(
                "API key is required".to_string(),
            ));
        }

        let voice = config
            .voice
            .as_deref()
            .map(OpenAIRealtimeVoice::from_str_or_default)
            .unwrap_or_default();

        Ok(Self { config, voice })
    }

    /// Get the configuration.
    pub fn config(&self) -> &RealtimeConfig {
        &self.config
    }

    /// Get the configured voice.
    pub fn voice(&self) -> OpenAIRealtimeVoice {
        self.voice
    }

    /// Get the configured upstream audio format.
    pub fn audio_format(&self) -> UpstreamAudioFormat {
        self.config.audio_format
    }

    fn model(&self) -> &str {
        if self.config.model.is_empty() {
            DEFAULT_REALTIME_MODEL
        } else {
            &self.config.model
        }
    }

    /// Build the WebSocket URL with model and temperature parameters.
    pub fn ws_url(&self) -> RealtimeResult<Url> {
        let base = if self.config.url.is_empty() {
            OPENAI_REALTIME_URL
        } else {
            &self.config.url
        };
        let mut url = Url::parse(base)
            .map_err(|e| RealtimeError::InvalidConfiguration(format!("realtime url: {e}")))?;

        {
            let mut query = url.query_pairs_mut();
            query.append_pair("model", self.model());
            if let Some(temperature) = self.config.temperature {
                query.append_pair("temperature", &temperature.to_string());
            }
        }

        Ok(url)
    }

    /// Build the session configuration for this call.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            session_type: "realtime".to_string(),
            model: Some(self.model().to_string()),
            output_modalities: Some(vec!["audio".to_string()]),
            audio: AudioConfig {
                input: AudioInputConfig {
                    format: format_spec(self.config.audio_format),
                    turn_detection: Some(turn_detection(&self.config.turn_detection)),
                },
                output: AudioOutputConfig {
                    format: format_spec(self.config.audio_format),
                    voice: Some(self.voice.as_str().to_string()),
                },
            },
            instructions: self.config.instructions.clone(),
        }
    }

    /// The `session.update` event sent when the upstream session opens.
    pub fn session_update(&self) -> ClientEvent {
        ClientEvent::SessionUpdate {
            session: self.session_config(),
        }
    }

    /// Events that make the assistant speak first with `greeting`.
    pub fn greeting_events(greeting: &str) -> Vec<ClientEvent> {
        vec![
            ClientEvent::ConversationItemCreate {
                item: ConversationItem::user_text(format!(
                    "Greet the caller with \"{greeting}\""
                )),
            },
            ClientEvent::ResponseCreate,
        ]
    }

    /// Open the authenticated WebSocket to the provider.
    pub async fn connect(&self) -> RealtimeResult<UpstreamSocket> {
        let url = self.ws_url()?;

        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|e| RealtimeError::ConnectionFailed(e.to_string()))?;
        let bearer = HeaderValue::from_str(&format!("Bearer {}", self.config.api_key))
            .map_err(|e| RealtimeError::InvalidConfiguration(e.to_string()))?;
        request.headers_mut().insert(AUTHORIZATION, bearer);

        let (ws_stream, _response) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(|e| RealtimeError::ConnectionFailed(e.to_string()))?;

        info!(model = %self.model(), "Connected to OpenAI Realtime API");
        Ok(ws_stream)
    }
}

fn format_spec(format: UpstreamAudioFormat) -> AudioFormatSpec {
    AudioFormatSpec {
        format_type: format.as_str().to_string(),
        rate: match format {
            UpstreamAudioFormat::Pcm16 => Some(format.sample_rate()),
            UpstreamAudioFormat::G711Ulaw => None,
        },
    }
}

fn turn_detection(config: &TurnDetectionConfig) -> TurnDetection {
    match config {
        TurnDetectionConfig::ServerVad {
            threshold,
            prefix_padding_ms,
            silence_duration_ms,
        } => TurnDetection::ServerVad {
            threshold: *threshold,
            prefix_padding_ms: *prefix_padding_ms,
            silence_duration_ms: *silence_duration_ms,
        },
        TurnDetectionConfig::SemanticVad { eagerness } => TurnDetection::SemanticVad {
            eagerness: eagerness.clone(),
        },
    }
}
