//! Per-call session state.
//!
//! A [`CallSession`] is owned by exactly one connection handler and is never
//! shared. It tracks the telephony stream id, the media clock reported by the
//! telephony leg, the assistant utterance currently being played and the
//! outstanding playback acknowledgements.

use std::collections::VecDeque;

use tracing::{debug, warn};

/// Prefix of generated mark names.
pub const MARK_PREFIX: &str = "part";

/// FIFO of outstanding playback acknowledgements.
///
/// Each enqueued mark gets a unique name so echoes that arrive after a
/// [`clear`](MarkQueue::clear) can be told apart from live ones.
#[derive(Debug, Default)]
pub struct MarkQueue {
    marks: VecDeque<String>,
    next_seq: u64,
}

impl MarkQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a new mark and return its name.
    pub fn enqueue(&mut self) -> String {
        let name = format!("{}-{}", MARK_PREFIX, self.next_seq);
        self.next_seq += 1;
        self.marks.push_back(name.clone());
        name
    }

    /// Pop the oldest mark.
    pub fn dequeue(&mut self) -> Option<String> {
        self.marks.pop_front()
    }

    pub fn front(&self) -> Option<&str> {
        self.marks.front().map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.marks.iter().any(|m| m == name)
    }

    pub fn len(&self) -> usize {
        self.marks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.marks.is_empty()
    }

    /// Drop all outstanding marks. Name sequence keeps counting.
    pub fn clear(&mut self) {
        self.marks.clear();
    }
}

/// Mutable state of one call.
#[derive(Debug, Default)]
pub struct CallSession {
    stream_sid: Option<String>,
    media_clock_ms: u64,
    last_assistant_item: Option<String>,
    response_start_ms: Option<u64>,
    marks: MarkQueue,
}

impl CallSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Capture the stream id at call start and zero the per-stream fields.
    pub fn start(&mut self, stream_sid: impl Into<String>) {
        self.stream_sid = Some(stream_sid.into());
        self.media_clock_ms = 0;
        self.reset();
    }

    pub fn stream_sid(&self) -> Option<&str> {
        self.stream_sid.as_deref()
    }

    /// Advance the media clock. Returns `false` when `ms` is behind the clock
    /// and was ignored.
    pub fn record_media_timestamp(&mut self, ms: u64) -> bool {
        if ms < self.media_clock_ms {
            debug!(
                timestamp = ms,
                media_clock_ms = self.media_clock_ms,
                "Ignoring out-of-order media timestamp"
            );
            return false;
        }
        self.media_clock_ms = ms;
        true
    }

    pub fn media_clock(&self) -> u64 {
        self.media_clock_ms
    }

    /// Record `item_id` as the utterance in flight, anchoring its playback
    /// start to the media clock if no anchor is set.
    pub fn begin_utterance(&mut self, item_id: &str) {
        if self.response_start_ms.is_none() {
            self.response_start_ms = Some(self.media_clock_ms);
        }
        if self.last_assistant_item.as_deref() != Some(item_id) {
            self.last_assistant_item = Some(item_id.to_string());
        }
    }

    /// Forget the utterance in flight without touching the mark queue.
    pub fn end_utterance(&mut self) {
        self.last_assistant_item = None;
        self.response_start_ms = None;
    }

    pub fn current_utterance(&self) -> Option<&str> {
        self.last_assistant_item.as_deref()
    }

    pub fn utterance_started_at(&self) -> Option<u64> {
        self.response_start_ms
    }

    pub fn enqueue_mark(&mut self) -> String {
        self.marks.enqueue()
    }

    pub fn dequeue_mark(&mut self) -> Option<String> {
        self.marks.dequeue()
    }

    pub fn pending_marks(&self) -> usize {
        self.marks.len()
    }

    /// Handle a mark echo from the telephony leg.
    ///
    /// Echoes arrive in the order marks were sent, so a matching echo pops
    /// the head. Names no longer queued belong to audio flushed by an earlier
    /// interruption and are ignored.
    pub fn acknowledge_mark(&mut self, name: &str) -> bool {
        if self.marks.front() == Some(name) {
            self.marks.dequeue();
            return true;
        }

        if !self.marks.contains(name) {
            debug!(mark = %name, "Ignoring stale mark echo");
            return false;
        }

        warn!(mark = %name, head = ?self.marks.front(), "Mark echo out of order");
        while let Some(head) = self.marks.dequeue() {
            if head == name {
                break;
            }
        }
        true
    }

    /// Clear the utterance in flight and all outstanding marks.
    pub fn reset(&mut self) {
        self.last_assistant_item = None;
        self.response_start_ms = None;
        self.marks.clear();
    }
}
