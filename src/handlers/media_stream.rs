//! Telephony media-stream WebSocket handler
//!
//! Each accepted socket is one call. The handler opens the upstream realtime
//! session in the background and runs a single event loop that feeds both
//! legs into a [`CallBridge`] and executes the actions it returns. All
//! per-call state lives in the bridge; this module only does I/O.

use std::collections::VecDeque;
use std::sync::Arc;

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::select;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message as UpstreamMessage;
use tracing::{Instrument, debug, error, info, info_span, warn};
use uuid::Uuid;

use crate::config::{DEFAULT_GREETING, ServerConfig};
use crate::core::call::{BridgeAction, BridgeOptions, CallBridge, TelephonyEvent, TelephonyMessage};
use crate::core::realtime::openai::{UpstreamSink, UpstreamSocket, UpstreamStream};
use crate::core::realtime::{ClientEvent, OpenAIRealtime, RealtimeResult, ServerEvent};
use crate::state::AppState;

/// Outbound telephony queue depth
const CHANNEL_BUFFER_SIZE: usize = 1024;

/// Maximum WebSocket frame size (1 MB)
const MAX_WS_FRAME_SIZE: usize = 1024 * 1024;

/// Maximum WebSocket message size (1 MB)
const MAX_WS_MESSAGE_SIZE: usize = 1024 * 1024;

/// Routing for the telephony sender task
#[derive(Debug)]
enum TelephonyRoute {
    Message(TelephonyMessage),
    Close,
}

/// Handle `GET /media-stream`
pub async fn media_stream_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> Response {
    info!("Media stream WebSocket upgrade requested");

    ws.max_frame_size(MAX_WS_FRAME_SIZE)
        .max_message_size(MAX_WS_MESSAGE_SIZE)
        .on_upgrade(move |socket| {
            let call_id = Uuid::new_v4();
            handle_media_stream(socket, state).instrument(info_span!("call", %call_id))
        })
}

async fn handle_media_stream(mut socket: WebSocket, state: Arc<AppState>) {
    info!("Telephony client connected");

    let persona = state.persona_for_call().await;
    let client = match OpenAIRealtime::new(state.config.realtime_config(&persona)) {
        Ok(client) => client,
        Err(e) => {
            error!("Cannot start upstream session: {}", e);
            let _ = socket.send(Message::Close(None)).await;
            return;
        }
    };

    let greeting = if state.config.greet_on_connect {
        OpenAIRealtime::greeting_events(persona.greeting().unwrap_or(DEFAULT_GREETING))
    } else {
        Vec::new()
    };

    let mut bridge = CallBridge::new(BridgeOptions {
        audio_format: client.audio_format(),
        session_update: client.session_update(),
        greeting,
        show_timing_math: state.config.show_timing_math,
    });

    info!(
        persona = %persona.id,
        voice = %client.voice(),
        audio_format = %client.audio_format(),
        "Call bridge created"
    );

    let (tel_sink, mut tel_stream) = socket.split();
    let (tel_tx, tel_rx) = mpsc::channel::<TelephonyRoute>(CHANNEL_BUFFER_SIZE);
    let sender_task = tokio::spawn(run_telephony_sender(tel_sink, tel_rx));

    // Telephony frames keep flowing while the handshake is in flight; the
    // bridge buffers them until the upstream is ready.
    let (ready_tx, mut ready_rx) = oneshot::channel::<RealtimeResult<UpstreamSocket>>();
    let connect_task = tokio::spawn(async move {
        let _ = ready_tx.send(client.connect().await);
    });

    let mut connecting = true;
    let mut upstream_sink: Option<UpstreamSink> = None;
    let mut upstream_stream: Option<UpstreamStream> = None;

    while !bridge.is_closed() {
        let actions = select! {
            result = &mut ready_rx, if connecting => {
                connecting = false;
                match result {
                    Ok(Ok(socket)) => {
                        let (sink, stream) = socket.split();
                        upstream_sink = Some(sink);
                        upstream_stream = Some(stream);
                        bridge.on_upstream_ready()
                    }
                    Ok(Err(e)) => bridge.on_upstream_failed(&e.to_string()),
                    Err(_) => bridge.on_upstream_failed("connect task dropped"),
                }
            }
            msg = tel_stream.next() => match msg {
                Some(Ok(Message::Text(text))) => match serde_json::from_str::<TelephonyEvent>(&text) {
                    Ok(event) => bridge.on_telephony(event),
                    Err(e) => {
                        warn!("Dropping malformed telephony message: {}", e);
                        Vec::new()
                    }
                },
                Some(Ok(Message::Close(_))) | None => bridge.on_telephony_closed(),
                Some(Ok(_)) => Vec::new(),
                Some(Err(e)) => {
                    warn!("Telephony WebSocket error: {}", e);
                    bridge.on_telephony_closed()
                }
            },
            msg = next_upstream(&mut upstream_stream) => match msg {
                Some(Ok(UpstreamMessage::Text(text))) => match parse_upstream(&state.config, &text) {
                    Some(event) => bridge.on_upstream(event),
                    None => Vec::new(),
                },
                Some(Ok(UpstreamMessage::Close(frame))) => {
                    debug!(?frame, "Upstream sent close");
                    upstream_stream = None;
                    bridge.on_upstream_closed()
                }
                Some(Ok(_)) => Vec::new(),
                Some(Err(e)) => {
                    warn!("Upstream WebSocket error: {}", e);
                    upstream_stream = None;
                    bridge.on_upstream_closed()
                }
                None => {
                    upstream_stream = None;
                    bridge.on_upstream_closed()
                }
            },
        };

        let mut queue = VecDeque::from(actions);
        while let Some(action) = queue.pop_front() {
            match action {
                BridgeAction::ToTelephony(message) => {
                    if tel_tx.send(TelephonyRoute::Message(message)).await.is_err() {
                        warn!("Telephony sender stopped");
                        queue.extend(bridge.on_telephony_closed());
                    }
                }
                BridgeAction::ToUpstream(event) => match upstream_sink.as_mut() {
                    Some(sink) => {
                        if let Err(e) = send_upstream(sink, &event).await {
                            warn!(event = event.event_type(), "Failed to send upstream: {}", e);
                            upstream_sink = None;
                            upstream_stream = None;
                            queue.extend(bridge.on_upstream_closed());
                        }
                    }
                    None => debug!(event = event.event_type(), "Upstream not connected, dropping"),
                },
                BridgeAction::CloseUpstream => {
                    if let Some(mut sink) = upstream_sink.take() {
                        debug!("Closing upstream session");
                        let _ = sink.send(UpstreamMessage::Close(None)).await;
                    }
                }
                BridgeAction::CloseTelephony => {
                    let _ = tel_tx.send(TelephonyRoute::Close).await;
                }
            }
        }
    }

    // Cleanup
    connect_task.abort();
    if let Some(mut sink) = upstream_sink.take() {
        let _ = sink.close().await;
    }
    let _ = tel_tx.send(TelephonyRoute::Close).await;
    drop(tel_tx);
    if let Err(e) = sender_task.await {
        debug!("Telephony sender task ended abnormally: {}", e);
    }

    info!(stream_sid = ?bridge.session().stream_sid(), "Call ended");
}

async fn run_telephony_sender(
    mut sender: futures::stream::SplitSink<WebSocket, Message>,
    mut rx: mpsc::Receiver<TelephonyRoute>,
) {
    while let Some(route) = rx.recv().await {
        let result = match route {
            TelephonyRoute::Message(message) => match serde_json::to_string(&message) {
                Ok(json) => sender.send(Message::Text(json.into())).await,
                Err(e) => {
                    error!("Failed to serialize telephony message: {}", e);
                    continue;
                }
            },
            TelephonyRoute::Close => {
                debug!("Closing telephony WebSocket");
                let _ = sender.send(Message::Close(None)).await;
                break;
            }
        };

        if let Err(e) = result {
            warn!("Failed to send telephony message: {}", e);
            break;
        }
    }
}

/// Next message from the upstream socket, or never if there is none.
async fn next_upstream(
    stream: &mut Option<UpstreamStream>,
) -> Option<Result<UpstreamMessage, tokio_tungstenite::tungstenite::Error>> {
    match stream.as_mut() {
        Some(stream) => stream.next().await,
        None => std::future::pending().await,
    }
}

async fn send_upstream(sink: &mut UpstreamSink, event: &ClientEvent) -> RealtimeResult<()> {
    let json = serde_json::to_string(event)?;
    sink.send(UpstreamMessage::Text(json.into())).await?;
    Ok(())
}

/// Parse an upstream frame, logging its payload when its type is in
/// `log_event_types`. Malformed frames are dropped.
fn parse_upstream(config: &ServerConfig, text: &str) -> Option<ServerEvent> {
    let value: Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(e) => {
            warn!("Dropping malformed upstream message: {}", e);
            return None;
        }
    };

    if let Some(event_type) = value.get("type").and_then(Value::as_str)
        && config.should_log_event(event_type)
    {
        debug!(event_type, payload = %value, "Upstream event");
    }

    match serde_json::from_value::<ServerEvent>(value) {
        Ok(event) => Some(event),
        Err(e) => {
            warn!("Dropping unrecognized upstream message: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_upstream_known_and_unknown() {
        let config = ServerConfig::default();

        let event = parse_upstream(
            &config,
            r#"{"type":"input_audio_buffer.speech_started","audio_start_ms":120,"item_id":"i1"}"#,
        );
        assert!(matches!(event, Some(ServerEvent::SpeechStarted { .. })));

        let event = parse_upstream(&config, r#"{"type":"rate_limits.updated","rate_limits":[]}"#);
        assert!(matches!(event, Some(ServerEvent::Other)));
    }

    #[test]
    fn test_parse_upstream_malformed() {
        let config = ServerConfig::default();
        assert!(parse_upstream(&config, "not json").is_none());
        assert!(parse_upstream(&config, r#"{"no_type":true}"#).is_none());
    }
}
