//! Caller audio towards the upstream session.

use std::collections::VecDeque;

use base64::prelude::*;
use thiserror::Error;
use tracing::{debug, warn};

use super::session::CallSession;
use super::telephony::MediaPayload;
use crate::core::codec::{self, TELEPHONY_SAMPLE_RATE};
use crate::core::realtime::{ClientEvent, UpstreamAudioFormat};

/// Errors raised while relaying a single audio frame.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("invalid base64 audio: {0}")]
    InvalidAudio(#[from] base64::DecodeError),
}

/// Audio that arrived before the upstream session was ready.
///
/// Drained exactly once; pushes after the drain are refused.
#[derive(Debug, Default)]
pub struct PendingAudioQueue {
    chunks: VecDeque<Vec<u8>>,
    drained: bool,
}

impl PendingAudioQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk. Returns `false` if the queue was already drained.
    pub fn push(&mut self, chunk: Vec<u8>) -> bool {
        if self.drained {
            warn!("Refusing to buffer audio after the pending queue was drained");
            return false;
        }
        self.chunks.push_back(chunk);
        true
    }

    /// Take every buffered chunk in arrival order. Later calls return nothing.
    pub fn drain(&mut self) -> Vec<Vec<u8>> {
        if self.drained {
            return Vec::new();
        }
        self.drained = true;
        self.chunks.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn is_drained(&self) -> bool {
        self.drained
    }
}

/// Forwards telephony frames upstream, buffering until the upstream is ready.
#[derive(Debug)]
pub struct InboundRelay {
    format: UpstreamAudioFormat,
    pending: PendingAudioQueue,
    ready: bool,
}

impl InboundRelay {
    pub fn new(format: UpstreamAudioFormat) -> Self {
        Self {
            format,
            pending: PendingAudioQueue::new(),
            ready: false,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Relay one telephony frame.
    ///
    /// The frame's timestamp always advances the session's media clock.
    /// Returns the append event to send now, or `None` if the frame was
    /// buffered.
    pub fn on_media(
        &mut self,
        session: &mut CallSession,
        media: &MediaPayload,
    ) -> Result<Option<ClientEvent>, RelayError> {
        session.record_media_timestamp(media.timestamp);

        let mulaw = BASE64_STANDARD.decode(media.payload.as_bytes())?;
        let audio = to_upstream_audio(self.format, &mulaw);

        if self.ready {
            return Ok(Some(ClientEvent::audio_append(&audio)));
        }

        self.pending.push(audio);
        debug!(
            pending = self.pending.len(),
            timestamp = media.timestamp,
            "Buffered caller audio until upstream is ready"
        );
        Ok(None)
    }

    /// Mark the upstream ready and flush buffered audio. Only the first call
    /// returns events.
    pub fn on_upstream_ready(&mut self) -> Vec<ClientEvent> {
        if self.ready {
            return Vec::new();
        }
        self.ready = true;

        let flushed: Vec<ClientEvent> = self
            .pending
            .drain()
            .iter()
            .map(|chunk| ClientEvent::audio_append(chunk))
            .collect();
        if !flushed.is_empty() {
            debug!(frames = flushed.len(), "Flushing buffered caller audio");
        }
        flushed
    }
}

/// Convert telephony mu-law to the upstream input encoding.
pub fn to_upstream_audio(format: UpstreamAudioFormat, mulaw: &[u8]) -> Vec<u8> {
    match format {
        UpstreamAudioFormat::G711Ulaw => mulaw.to_vec(),
        UpstreamAudioFormat::Pcm16 => {
            let samples = codec::decode(mulaw);
            let resampled =
                codec::resample_linear(&samples, TELEPHONY_SAMPLE_RATE, format.sample_rate());
            codec::samples_to_pcm16_le(&resampled)
        }
    }
}
