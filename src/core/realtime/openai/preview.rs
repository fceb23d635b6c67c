//! One-shot voice preview.
//!
//! Opens a short-lived upstream session, asks the assistant to speak a single
//! prompt, collects the audio until the response completes and returns it as
//! a base64 WAV file. The whole exchange is bounded by a timeout; the socket
//! is dropped on every exit path.

use std::io::Cursor;
use std::time::Duration;

use base64::prelude::*;
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};

use super::client::OpenAIRealtime;
use super::config::OPENAI_REALTIME_SAMPLE_RATE;
use super::messages::{ClientEvent, ConversationItem, ServerEvent};
use crate::core::realtime::base::{
    RealtimeConfig, RealtimeError, RealtimeResult, UpstreamAudioFormat,
};

/// Content type of every preview.
pub const PREVIEW_CONTENT_TYPE: &str = "audio/wav";

/// Preview audio returned to API callers.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PreviewAudio {
    pub audio_base64: String,
    pub content_type: String,
}

/// Accumulates audio deltas for a single response.
#[derive(Debug, Default)]
pub struct PreviewCollector {
    pcm: Vec<u8>,
}

impl PreviewCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one server event. Returns `Ok(true)` once the response is complete.
    pub fn push(&mut self, event: ServerEvent) -> RealtimeResult<bool> {
        match event {
            ServerEvent::AudioDelta { delta, .. } => {
                let chunk = BASE64_STANDARD.decode(delta.as_bytes()).map_err(|e| {
                    RealtimeError::SerializationError(format!("audio delta: {e}"))
                })?;
                self.pcm.extend_from_slice(&chunk);
                Ok(false)
            }
            ServerEvent::ContentDone { .. } | ServerEvent::ResponseDone { .. } => Ok(true),
            ServerEvent::Error { error } => Err(RealtimeError::ProviderError(error.message)),
            _ => Ok(false),
        }
    }

    /// Bytes of PCM collected so far.
    pub fn len(&self) -> usize {
        self.pcm.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pcm.is_empty()
    }

    /// Wrap the collected PCM in a WAV container.
    pub fn finish(self) -> RealtimeResult<PreviewAudio> {
        let wav = pcm16_to_wav(&self.pcm, OPENAI_REALTIME_SAMPLE_RATE)?;
        Ok(PreviewAudio {
            audio_base64: BASE64_STANDARD.encode(wav),
            content_type: PREVIEW_CONTENT_TYPE.to_string(),
        })
    }
}

/// Encode mono 16-bit little-endian PCM as a WAV file.
pub fn pcm16_to_wav(pcm: &[u8], sample_rate: u32) -> RealtimeResult<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)
            .map_err(|e| RealtimeError::SerializationError(e.to_string()))?;
        for pair in pcm.chunks_exact(2) {
            writer
                .write_sample(i16::from_le_bytes([pair[0], pair[1]]))
                .map_err(|e| RealtimeError::SerializationError(e.to_string()))?;
        }
        writer
            .finalize()
            .map_err(|e| RealtimeError::SerializationError(e.to_string()))?;
    }

    Ok(cursor.into_inner())
}

/// Speak `prompt` with the configured voice and return the audio.
pub async fn create_preview_audio(
    config: RealtimeConfig,
    prompt: &str,
    timeout: Duration,
) -> RealtimeResult<PreviewAudio> {
    let config = RealtimeConfig {
        audio_format: UpstreamAudioFormat::Pcm16,
        ..config
    };
    let client = OpenAIRealtime::new(config)?;

    match tokio::time::timeout(timeout, run_preview(&client, prompt)).await {
        Ok(result) => result,
        Err(_) => Err(RealtimeError::Timeout(format!(
            "preview did not complete within {}ms",
            timeout.as_millis()
        ))),
    }
}

async fn run_preview(client: &OpenAIRealtime, prompt: &str) -> RealtimeResult<PreviewAudio> {
    let socket = client.connect().await?;
    let (mut sink, mut stream) = socket.split();

    let events = [
        client.session_update(),
        ClientEvent::ConversationItemCreate {
            item: ConversationItem::user_text(prompt),
        },
        ClientEvent::ResponseCreate,
    ];
    for event in &events {
        let json = serde_json::to_string(event)?;
        sink.send(Message::Text(json.into())).await?;
    }

    let mut collector = PreviewCollector::new();
    while let Some(message) = stream.next().await {
        match message? {
            Message::Text(text) => {
                let event = match serde_json::from_str::<ServerEvent>(&text) {
                    Ok(event) => event,
                    Err(e) => {
                        warn!("Dropping unparseable preview event: {}", e);
                        continue;
                    }
                };
                if collector.push(event)? {
                    debug!(bytes = collector.len(), "Preview response complete");
                    let _ = sink.send(Message::Close(None)).await;
                    return collector.finish();
                }
            }
            Message::Ping(payload) => {
                sink.send(Message::Pong(payload)).await?;
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    Err(RealtimeError::ConnectionFailed(
        "upstream closed before the preview completed".to_string(),
    ))
}
