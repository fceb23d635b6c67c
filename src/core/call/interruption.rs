//! Barge-in handling.
//!
//! When the caller starts speaking over the assistant, the utterance in
//! flight is truncated upstream at the point the caller actually heard, and
//! the telephony leg drops whatever audio it still has queued.

use tracing::debug;

use super::session::CallSession;
use super::telephony::TelephonyMessage;
use crate::core::realtime::ClientEvent;

/// Whether the assistant is audibly speaking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    Idle,
    Speaking,
}

impl TurnState {
    /// Speaking while an utterance is in flight and playback is unacknowledged.
    pub fn of(session: &CallSession) -> Self {
        if session.current_utterance().is_some() && session.pending_marks() > 0 {
            TurnState::Speaking
        } else {
            TurnState::Idle
        }
    }
}

/// Outcome of a barge-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interruption {
    pub item_id: String,
    pub elapsed_ms: u64,
    pub stream_sid: String,
}

impl Interruption {
    pub fn truncate_event(&self) -> ClientEvent {
        ClientEvent::truncate(self.item_id.clone(), self.elapsed_ms)
    }

    pub fn clear_message(&self) -> TelephonyMessage {
        TelephonyMessage::clear(&self.stream_sid)
    }
}

#[derive(Debug, Default)]
pub struct InterruptionController {
    show_timing_math: bool,
}

impl InterruptionController {
    pub fn new(show_timing_math: bool) -> Self {
        Self { show_timing_math }
    }

    /// React to caller speech. Returns `None` when nothing is playing.
    pub fn on_speech_started(&self, session: &mut CallSession) -> Option<Interruption> {
        if TurnState::of(session) == TurnState::Idle {
            return None;
        }

        let item_id = session.current_utterance()?.to_string();
        let stream_sid = session.stream_sid()?.to_string();
        let started_at = session.utterance_started_at()?;
        let elapsed_ms = session.media_clock().saturating_sub(started_at);

        if self.show_timing_math {
            debug!(
                media_clock_ms = session.media_clock(),
                started_at_ms = started_at,
                elapsed_ms,
                "Truncation elapsed = media clock - utterance start"
            );
        }

        session.reset();

        Some(Interruption {
            item_id,
            elapsed_ms,
            stream_sid,
        })
    }
}
