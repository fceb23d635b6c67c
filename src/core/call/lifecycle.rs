//! Call lifecycle state machine.
//!
//! [`CallBridge`] owns all per-call state and performs no I/O. The connection
//! handler feeds it events from both legs and executes the
//! [`BridgeAction`]s it returns, in order.
//!
//! ```text
//! Connecting --upstream ready--> Active --stop--> Closing --upstream closed--> Closed
//!      \                            \
//!       +--------- either leg closed or failed ---------------------------> Closed
//! ```

use std::fmt;

use tracing::{debug, error, info, warn};

use super::inbound::InboundRelay;
use super::interruption::InterruptionController;
use super::outbound::OutboundRelay;
use super::session::CallSession;
use super::telephony::{TelephonyEvent, TelephonyMessage};
use crate::core::realtime::{ClientEvent, ServerEvent, UpstreamAudioFormat};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Telephony leg connected, upstream handshake pending
    Connecting,
    /// Both legs up
    Active,
    /// Call stopped, upstream close requested
    Closing,
    /// Both legs done
    Closed,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleState::Connecting => write!(f, "connecting"),
            LifecycleState::Active => write!(f, "active"),
            LifecycleState::Closing => write!(f, "closing"),
            LifecycleState::Closed => write!(f, "closed"),
        }
    }
}

/// Side effect requested by the bridge.
#[derive(Debug, Clone, PartialEq)]
pub enum BridgeAction {
    ToTelephony(TelephonyMessage),
    ToUpstream(ClientEvent),
    CloseUpstream,
    CloseTelephony,
}

/// Per-call settings fixed at connection time.
#[derive(Debug, Clone)]
pub struct BridgeOptions {
    pub audio_format: UpstreamAudioFormat,
    /// `session.update` sent first once the upstream is ready
    pub session_update: ClientEvent,
    /// Sent after the session update and any buffered audio
    pub greeting: Vec<ClientEvent>,
    pub show_timing_math: bool,
}

pub struct CallBridge {
    state: LifecycleState,
    session: CallSession,
    inbound: InboundRelay,
    outbound: OutboundRelay,
    interruption: InterruptionController,
    session_update: Option<ClientEvent>,
    greeting: Vec<ClientEvent>,
}

impl CallBridge {
    pub fn new(options: BridgeOptions) -> Self {
        Self {
            state: LifecycleState::Connecting,
            session: CallSession::new(),
            inbound: InboundRelay::new(options.audio_format),
            outbound: OutboundRelay::new(options.audio_format),
            interruption: InterruptionController::new(options.show_timing_math),
            session_update: Some(options.session_update),
            greeting: options.greeting,
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn is_closed(&self) -> bool {
        self.state == LifecycleState::Closed
    }

    pub fn session(&self) -> &CallSession {
        &self.session
    }

    pub fn pending_audio(&self) -> usize {
        self.inbound.pending_len()
    }

    /// Upstream handshake completed.
    pub fn on_upstream_ready(&mut self) -> Vec<BridgeAction> {
        match self.state {
            LifecycleState::Connecting => {}
            LifecycleState::Closing => {
                // Call ended while the handshake was in flight
                self.state = LifecycleState::Closed;
                return vec![BridgeAction::CloseUpstream];
            }
            _ => return Vec::new(),
        }

        self.state = LifecycleState::Active;
        info!(
            stream_sid = ?self.session.stream_sid(),
            buffered = self.inbound.pending_len(),
            "Upstream session ready"
        );

        let mut actions = Vec::new();
        if let Some(update) = self.session_update.take() {
            actions.push(BridgeAction::ToUpstream(update));
        }
        actions.extend(
            self.inbound
                .on_upstream_ready()
                .into_iter()
                .map(BridgeAction::ToUpstream),
        );
        actions.extend(
            std::mem::take(&mut self.greeting)
                .into_iter()
                .map(BridgeAction::ToUpstream),
        );
        actions
    }

    /// Upstream handshake failed; the call cannot proceed.
    pub fn on_upstream_failed(&mut self, reason: &str) -> Vec<BridgeAction> {
        if self.is_closed() {
            return Vec::new();
        }
        error!(stream_sid = ?self.session.stream_sid(), "Upstream connection failed: {}", reason);
        self.state = LifecycleState::Closed;
        vec![BridgeAction::CloseTelephony]
    }

    pub fn on_telephony(&mut self, event: TelephonyEvent) -> Vec<BridgeAction> {
        if matches!(self.state, LifecycleState::Closing | LifecycleState::Closed) {
            debug!(state = %self.state, "Dropping telephony event after call stop");
            return Vec::new();
        }

        match event {
            TelephonyEvent::Connected { protocol } => {
                debug!(?protocol, "Telephony stream connected");
                Vec::new()
            }
            TelephonyEvent::Start { start } => {
                info!(
                    stream_sid = %start.stream_sid,
                    call_sid = ?start.call_sid,
                    "Incoming stream has started"
                );
                self.session.start(start.stream_sid);
                Vec::new()
            }
            TelephonyEvent::Media { media } => {
                match self.inbound.on_media(&mut self.session, &media) {
                    Ok(Some(event)) => vec![BridgeAction::ToUpstream(event)],
                    Ok(None) => Vec::new(),
                    Err(e) => {
                        warn!(timestamp = media.timestamp, "Dropping media frame: {}", e);
                        Vec::new()
                    }
                }
            }
            TelephonyEvent::Mark { mark } => {
                self.session.acknowledge_mark(&mark.name);
                Vec::new()
            }
            TelephonyEvent::Stop => {
                info!(stream_sid = ?self.session.stream_sid(), "Telephony stream stopped");
                self.session.reset();
                self.state = LifecycleState::Closing;
                vec![BridgeAction::CloseUpstream]
            }
            TelephonyEvent::Other => {
                debug!("Ignoring unhandled telephony event");
                Vec::new()
            }
        }
    }

    /// Telephony socket closed or errored.
    pub fn on_telephony_closed(&mut self) -> Vec<BridgeAction> {
        if self.is_closed() {
            return Vec::new();
        }
        info!(stream_sid = ?self.session.stream_sid(), "Telephony leg closed");
        self.session.reset();
        self.state = LifecycleState::Closed;
        vec![BridgeAction::CloseUpstream]
    }

    pub fn on_upstream(&mut self, event: ServerEvent) -> Vec<BridgeAction> {
        if matches!(self.state, LifecycleState::Closing | LifecycleState::Closed) {
            debug!(state = %self.state, "Dropping upstream event after call stop");
            return Vec::new();
        }

        match event {
            ServerEvent::AudioDelta { delta, item_id, .. } => {
                match self
                    .outbound
                    .on_audio_delta(&mut self.session, &delta, item_id.as_deref())
                {
                    Ok(messages) => messages.into_iter().map(BridgeAction::ToTelephony).collect(),
                    Err(e) => {
                        warn!(item_id = ?item_id, "Dropping audio delta: {}", e);
                        Vec::new()
                    }
                }
            }
            ServerEvent::SpeechStarted { .. } => {
                match self.interruption.on_speech_started(&mut self.session) {
                    Some(interruption) => {
                        info!(
                            item_id = %interruption.item_id,
                            elapsed_ms = interruption.elapsed_ms,
                            "Caller interrupted assistant"
                        );
                        vec![
                            BridgeAction::ToUpstream(interruption.truncate_event()),
                            BridgeAction::ToTelephony(interruption.clear_message()),
                        ]
                    }
                    None => Vec::new(),
                }
            }
            ServerEvent::Error { error } => {
                error!(
                    error_type = %error.error_type,
                    code = ?error.code,
                    param = ?error.param,
                    event_id = ?error.event_id,
                    "Upstream error: {}",
                    error.message
                );
                Vec::new()
            }
            ServerEvent::SessionCreated { .. } => {
                debug!("Upstream session created");
                Vec::new()
            }
            ServerEvent::SessionUpdated { .. } => {
                debug!("Upstream session updated");
                Vec::new()
            }
            ServerEvent::ResponseDone { .. } => {
                debug!(item_id = ?self.session.current_utterance(), "Upstream response done");
                Vec::new()
            }
            _ => Vec::new(),
        }
    }

    /// Upstream socket closed or errored.
    pub fn on_upstream_closed(&mut self) -> Vec<BridgeAction> {
        match self.state {
            LifecycleState::Closed => Vec::new(),
            LifecycleState::Closing => {
                self.state = LifecycleState::Closed;
                vec![BridgeAction::CloseTelephony]
            }
            _ => {
                warn!(stream_sid = ?self.session.stream_sid(), "Upstream session closed unexpectedly");
                self.session.reset();
                self.state = LifecycleState::Closed;
                vec![BridgeAction::CloseTelephony]
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::call::telephony::{MarkPayload, MediaPayload, StartPayload};
    use base64::prelude::*;

    fn options() -> BridgeOptions {
        BridgeOptions {
            audio_format: UpstreamAudioFormat::G711Ulaw,
            session_update: ClientEvent::ResponseCreate,
            greeting: Vec::new(),
            show_timing_math: false,
        }
    }

    fn start(sid: &str) -> TelephonyEvent {
        TelephonyEvent::Start {
            start: StartPayload {
                stream_sid: sid.to_string(),
                call_sid: None,
                custom_parameters: Default::default(),
            },
        }
    }

    fn media(ts: u64) -> TelephonyEvent {
        TelephonyEvent::Media {
            media: MediaPayload {
                payload: BASE64_STANDARD.encode([0xFFu8; 4]),
                timestamp: ts,
                track: None,
            },
        }
    }

    #[test]
    fn test_session_update_precedes_flushed_audio_and_greeting() {
        let mut bridge = CallBridge::new(BridgeOptions {
            greeting: vec![ClientEvent::ResponseCreate],
            session_update: ClientEvent::truncate("marker", 0),
            ..options()
        });
        bridge.on_telephony(start("MZ1"));
        bridge.on_telephony(media(0));

        let actions = bridge.on_upstream_ready();
        assert_eq!(bridge.state(), LifecycleState::Active);
        assert_eq!(actions.len(), 3);
        assert_eq!(actions[0], BridgeAction::ToUpstream(ClientEvent::truncate("marker", 0)));
        assert!(matches!(
            &actions[1],
            BridgeAction::ToUpstream(ClientEvent::InputAudioBufferAppend { .. })
        ));
        assert_eq!(actions[2], BridgeAction::ToUpstream(ClientEvent::ResponseCreate));

        assert!(bridge.on_upstream_ready().is_empty());
    }

    #[test]
    fn test_stop_closes_upstream_then_telephony() {
        let mut bridge = CallBridge::new(options());
        bridge.on_telephony(start("MZ1"));
        bridge.on_upstream_ready();

        assert_eq!(bridge.on_telephony(TelephonyEvent::Stop), vec![BridgeAction::CloseUpstream]);
        assert_eq!(bridge.state(), LifecycleState::Closing);

        // Frames after stop are dropped
        assert!(bridge.on_telephony(media(100)).is_empty());

        assert_eq!(bridge.on_upstream_closed(), vec![BridgeAction::CloseTelephony]);
        assert!(bridge.is_closed());
        assert!(bridge.on_telephony_closed().is_empty());
    }

    #[test]
    fn test_stop_before_upstream_ready() {
        let mut bridge = CallBridge::new(options());
        bridge.on_telephony(start("MZ1"));
        bridge.on_telephony(TelephonyEvent::Stop);
        assert_eq!(bridge.on_upstream_ready(), vec![BridgeAction::CloseUpstream]);
        assert!(bridge.is_closed());
    }

    #[test]
    fn test_upstream_closed_closes_telephony() {
        let mut bridge = CallBridge::new(options());
        bridge.on_telephony(start("MZ1"));
        bridge.on_upstream_ready();
        assert_eq!(bridge.on_upstream_closed(), vec![BridgeAction::CloseTelephony]);
        assert!(bridge.is_closed());
    }

    #[test]
    fn test_telephony_closed_closes_upstream() {
        let mut bridge = CallBridge::new(options());
        assert_eq!(bridge.on_telephony_closed(), vec![BridgeAction::CloseUpstream]);
        assert!(bridge.is_closed());
        assert!(bridge.on_upstream_ready().is_empty());
    }

    #[test]
    fn test_upstream_failure_closes_telephony() {
        let mut bridge = CallBridge::new(options());
        assert_eq!(
            bridge.on_upstream_failed("refused"),
            vec![BridgeAction::CloseTelephony]
        );
        assert!(bridge.is_closed());
    }

    #[test]
    fn test_error_event_keeps_session_open() {
        let mut bridge = CallBridge::new(options());
        bridge.on_upstream_ready();
        let actions = bridge.on_upstream(ServerEvent::Error {
            error: Default::default(),
        });
        assert!(actions.is_empty());
        assert_eq!(bridge.state(), LifecycleState::Active);
    }

    #[test]
    fn test_mark_echo_dequeues() {
        let mut bridge = CallBridge::new(options());
        bridge.on_telephony(start("MZ1"));
        bridge.on_upstream_ready();
        bridge.on_upstream(ServerEvent::AudioDelta {
            delta: BASE64_STANDARD.encode([0xFFu8; 8]),
            item_id: Some("item-1".to_string()),
            response_id: None,
        });
        assert_eq!(bridge.session().pending_marks(), 1);

        bridge.on_telephony(TelephonyEvent::Mark {
            mark: MarkPayload {
                name: "part-0".to_string(),
            },
        });
        assert_eq!(bridge.session().pending_marks(), 0);
    }

    #[test]
    fn test_bad_media_is_dropped_not_fatal() {
        let mut bridge = CallBridge::new(options());
        bridge.on_telephony(start("MZ1"));
        let actions = bridge.on_telephony(TelephonyEvent::Media {
            media: MediaPayload {
                payload: "***".to_string(),
                timestamp: 20,
                track: None,
            },
        });
        assert!(actions.is_empty());
        assert_eq!(bridge.state(), LifecycleState::Connecting);
        assert_eq!(bridge.pending_audio(), 0);
    }
}
