//! Assistant audio towards the telephony leg.

use base64::prelude::*;
use tracing::debug;

use super::inbound::RelayError;
use super::session::CallSession;
use super::telephony::TelephonyMessage;
use crate::core::codec::{self, TELEPHONY_SAMPLE_RATE};
use crate::core::realtime::UpstreamAudioFormat;

/// Forwards upstream audio fragments as telephony media frames, each followed
/// by a playback mark.
#[derive(Debug)]
pub struct OutboundRelay {
    format: UpstreamAudioFormat,
}

impl OutboundRelay {
    pub fn new(format: UpstreamAudioFormat) -> Self {
        Self { format }
    }

    /// Relay one audio fragment.
    ///
    /// Returns the `media` frame and its `mark`, or nothing when the call has
    /// not started yet (no stream id to address) or the fragment is empty.
    pub fn on_audio_delta(
        &mut self,
        session: &mut CallSession,
        delta: &str,
        item_id: Option<&str>,
    ) -> Result<Vec<TelephonyMessage>, RelayError> {
        let Some(stream_sid) = session.stream_sid().map(str::to_owned) else {
            debug!("Dropping assistant audio received before call start");
            return Ok(Vec::new());
        };

        let payload = match self.format {
            UpstreamAudioFormat::G711Ulaw => {
                if BASE64_STANDARD.decode(delta.as_bytes())?.is_empty() {
                    return Ok(Vec::new());
                }
                delta.to_string()
            }
            UpstreamAudioFormat::Pcm16 => {
                let pcm = BASE64_STANDARD.decode(delta.as_bytes())?;
                let samples = codec::pcm16_le_samples(&pcm);
                let resampled = codec::resample_linear(
                    &samples,
                    self.format.sample_rate(),
                    TELEPHONY_SAMPLE_RATE,
                );
                if resampled.is_empty() {
                    return Ok(Vec::new());
                }
                BASE64_STANDARD.encode(codec::encode(&resampled))
            }
        };

        if let Some(item_id) = item_id {
            // A new item once the previous one has fully played starts a fresh anchor.
            if session.current_utterance().is_some_and(|current| current != item_id)
                && session.pending_marks() == 0
            {
                session.end_utterance();
            }
            if session.current_utterance().is_none() {
                debug!(
                    item_id = %item_id,
                    media_clock_ms = session.media_clock(),
                    "Assistant utterance started"
                );
            }
            session.begin_utterance(item_id);
        }

        let mark = session.enqueue_mark();
        Ok(vec![
            TelephonyMessage::media(&stream_sid, payload),
            TelephonyMessage::mark(&stream_sid, mark),
        ])
    }
}
