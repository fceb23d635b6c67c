//! Mock OpenAI Realtime server
//!
//! Accepts a single connection. Every JSON event the client sends is
//! forwarded to the test, `session.update` is answered with
//! `session.updated`, and `response.create` is answered with the scripted
//! audio (if any) followed by `response.done`. Tests can push arbitrary
//! server events at any time.

use std::net::SocketAddr;
use std::time::Duration;

use base64::prelude::*;
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::{accept_async, tungstenite::Message};

/// Synthetic event recorded when the client closes the socket.
pub const CLOSED_EVENT: &str = "mock.closed";

const EVENT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Default)]
pub struct MockBehavior {
    /// PCM16 chunks sent as audio deltas in reply to `response.create`
    pub response_audio: Vec<Vec<u8>>,
    /// Never answer `response.create`
    pub silent: bool,
    /// Hold the WebSocket handshake until the gate is released
    pub gated: bool,
}

pub struct MockRealtimeServer {
    pub addr: SocketAddr,
    received: mpsc::UnboundedReceiver<Value>,
    push: mpsc::UnboundedSender<Value>,
    gate: Option<oneshot::Sender<()>>,
    _task: JoinHandle<()>,
}

impl MockRealtimeServer {
    pub async fn start(behavior: MockBehavior) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (received_tx, received) = mpsc::unbounded_channel();
        let (push, push_rx) = mpsc::unbounded_channel();
        let (gate_tx, gate_rx) = oneshot::channel();

        let task = tokio::spawn(async move {
            if let Ok((stream, _)) = listener.accept().await {
                if behavior.gated {
                    let _ = gate_rx.await;
                }
                let _ = handle_connection(stream, behavior, received_tx, push_rx).await;
            }
        });

        Self {
            addr,
            received,
            push,
            gate: Some(gate_tx),
            _task: task,
        }
    }

    /// URL to use as `realtime_url`.
    pub fn url(&self) -> String {
        format!("ws://{}/v1/realtime", self.addr)
    }

    /// Let a gated handshake complete.
    pub fn release(&mut self) {
        if let Some(gate) = self.gate.take() {
            let _ = gate.send(());
        }
    }

    /// Send a server event to the connected client.
    pub fn push(&self, event: Value) {
        self.push.send(event).unwrap();
    }

    /// Next event received from the client.
    pub async fn next_event(&mut self) -> Value {
        tokio::time::timeout(EVENT_TIMEOUT, self.received.recv())
            .await
            .expect("timed out waiting for client event")
            .expect("mock server stopped")
    }

    /// Next event of `event_type`, skipping others.
    pub async fn next_event_of(&mut self, event_type: &str) -> Value {
        loop {
            let event = self.next_event().await;
            if event["type"] == event_type {
                return event;
            }
        }
    }

    /// Nothing further arrives within `wait`.
    pub async fn assert_quiet(&mut self, wait: Duration) {
        if let Ok(Some(event)) = tokio::time::timeout(wait, self.received.recv()).await {
            panic!("unexpected client event: {event}");
        }
    }
}

async fn handle_connection(
    stream: TcpStream,
    behavior: MockBehavior,
    received: mpsc::UnboundedSender<Value>,
    mut push: mpsc::UnboundedReceiver<Value>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let ws_stream = accept_async(stream).await?;
    let (mut write, mut read) = ws_stream.split();

    write
        .send(Message::Text(
            json!({"type": "session.created", "session": {}}).to_string().into(),
        ))
        .await?;

    loop {
        tokio::select! {
            msg = read.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    let event: Value = serde_json::from_str(&text)?;
                    let event_type = event["type"].as_str().unwrap_or_default().to_string();
                    let _ = received.send(event);

                    match event_type.as_str() {
                        "session.update" => {
                            let reply = json!({"type": "session.updated", "session": {}});
                            write.send(Message::Text(reply.to_string().into())).await?;
                        }
                        "response.create" if !behavior.silent => {
                            for chunk in &behavior.response_audio {
                                let delta = json!({
                                    "type": "response.output_audio.delta",
                                    "response_id": "resp-1",
                                    "item_id": "item-preview",
                                    "delta": BASE64_STANDARD.encode(chunk),
                                });
                                write.send(Message::Text(delta.to_string().into())).await?;
                            }
                            let done = json!({"type": "response.done", "response": {"id": "resp-1"}});
                            write.send(Message::Text(done.to_string().into())).await?;
                        }
                        _ => {}
                    }
                }
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => {
                    let _ = received.send(json!({"type": CLOSED_EVENT}));
                    break;
                }
                Some(Ok(_)) => {}
            },
            Some(event) = push.recv() => {
                write.send(Message::Text(event.to_string().into())).await?;
            }
        }
    }

    Ok(())
}
