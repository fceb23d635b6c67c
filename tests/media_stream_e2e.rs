//! End-to-end media stream tests
//!
//! Runs the full server on an ephemeral port, connects a telephony client to
//! `/media-stream` and points the upstream at the mock realtime server.

mod mock_providers;

use std::net::SocketAddr;
use std::time::Duration;

use base64::prelude::*;
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};

use call_bridge::config::DEFAULT_GREETING;
use call_bridge::{AppState, ServerConfig, routes};
use mock_providers::realtime_mock::{CLOSED_EVENT, MockBehavior, MockRealtimeServer};
use mock_providers::test_config;

type TelephonyClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

const READ_TIMEOUT: Duration = Duration::from_secs(5);

async fn spawn_bridge(config: ServerConfig) -> SocketAddr {
    let state = AppState::new(config).await.unwrap();
    let app = routes::create_router(state);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

async fn connect_telephony(addr: SocketAddr) -> TelephonyClient {
    let (client, _) = connect_async(format!("ws://{addr}/media-stream"))
        .await
        .unwrap();
    client
}

async fn send(client: &mut TelephonyClient, event: Value) {
    client
        .send(Message::Text(event.to_string().into()))
        .await
        .unwrap();
}

async fn next_json(client: &mut TelephonyClient) -> Value {
    loop {
        let msg = tokio::time::timeout(READ_TIMEOUT, client.next())
            .await
            .expect("timed out waiting for telephony message")
            .expect("telephony socket closed")
            .expect("telephony socket error");
        if let Message::Text(text) = msg {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

async fn expect_closed(client: &mut TelephonyClient) {
    loop {
        match tokio::time::timeout(READ_TIMEOUT, client.next())
            .await
            .expect("timed out waiting for telephony close")
        {
            None | Some(Err(_)) | Some(Ok(Message::Close(_))) => return,
            Some(Ok(_)) => continue,
        }
    }
}

fn start(stream_sid: &str) -> Value {
    json!({
        "event": "start",
        "sequenceNumber": "1",
        "start": {"streamSid": stream_sid, "callSid": "CA1", "customParameters": {"voice": "alloy"}},
        "streamSid": stream_sid
    })
}

fn media(stream_sid: &str, timestamp: u64, payload: &[u8]) -> Value {
    json!({
        "event": "media",
        "streamSid": stream_sid,
        "media": {
            "track": "inbound",
            "timestamp": timestamp.to_string(),
            "payload": BASE64_STANDARD.encode(payload)
        }
    })
}

#[tokio::test]
async fn test_full_call_flow() {
    let mut mock = MockRealtimeServer::start(MockBehavior {
        gated: true,
        ..MockBehavior::default()
    })
    .await;
    let addr = spawn_bridge(test_config(&mock.url())).await;
    let mut client = connect_telephony(addr).await;

    send(&mut client, json!({"event": "connected", "protocol": "Call", "version": "1.0.0"})).await;
    send(&mut client, start("MZ1")).await;
    for (i, ts) in [0u64, 20, 40].into_iter().enumerate() {
        send(&mut client, media("MZ1", ts, &[0x10 + i as u8; 160])).await;
    }

    // Frames sent before the handshake completes are held back
    tokio::time::sleep(Duration::from_millis(200)).await;
    mock.release();

    let update = mock.next_event().await;
    assert_eq!(update["type"], "session.update");
    assert_eq!(update["session"]["type"], "realtime");
    assert_eq!(update["session"]["audio"]["input"]["format"]["type"], "audio/pcmu");
    assert_eq!(
        update["session"]["audio"]["input"]["turn_detection"]["type"],
        "server_vad"
    );
    assert_eq!(update["session"]["audio"]["output"]["voice"], "alloy");

    for i in 0..3u8 {
        let append = mock.next_event().await;
        assert_eq!(append["type"], "input_audio_buffer.append");
        assert_eq!(append["audio"], BASE64_STANDARD.encode([0x10 + i; 160]));
    }

    // Assistant speaks
    let delta = BASE64_STANDARD.encode([0x55u8; 160]);
    mock.push(json!({
        "type": "response.output_audio.delta",
        "response_id": "resp-1",
        "item_id": "item-1",
        "delta": delta
    }));

    let outbound = next_json(&mut client).await;
    assert_eq!(outbound["event"], "media");
    assert_eq!(outbound["streamSid"], "MZ1");
    assert_eq!(outbound["media"]["payload"], delta);
    let mark = next_json(&mut client).await;
    assert_eq!(mark["event"], "mark");
    assert_eq!(mark["streamSid"], "MZ1");
    assert_eq!(mark["mark"]["name"], "part-0");

    // Caller keeps talking; wait until the frame reached the upstream so the
    // media clock has advanced
    send(&mut client, media("MZ1", 340, &[0x20; 160])).await;
    mock.next_event_of("input_audio_buffer.append").await;

    // Caller barges in
    mock.push(json!({
        "type": "input_audio_buffer.speech_started",
        "audio_start_ms": 330,
        "item_id": "item-user-1"
    }));

    let truncate = mock.next_event().await;
    assert_eq!(truncate["type"], "conversation.item.truncate");
    assert_eq!(truncate["item_id"], "item-1");
    assert_eq!(truncate["content_index"], 0);
    assert_eq!(truncate["audio_end_ms"], 300);

    let clear = next_json(&mut client).await;
    assert_eq!(clear, json!({"event": "clear", "streamSid": "MZ1"}));

    // Call ends
    send(&mut client, json!({"event": "stop", "streamSid": "MZ1", "stop": {"callSid": "CA1"}})).await;
    mock.next_event_of(CLOSED_EVENT).await;
    expect_closed(&mut client).await;
}

#[tokio::test]
async fn test_greeting_on_connect() {
    let mut mock = MockRealtimeServer::start(MockBehavior::default()).await;
    let config = ServerConfig {
        greet_on_connect: true,
        ..test_config(&mock.url())
    };
    let addr = spawn_bridge(config).await;
    let mut client = connect_telephony(addr).await;
    send(&mut client, start("MZ2")).await;

    assert_eq!(mock.next_event().await["type"], "session.update");

    let item = mock.next_event().await;
    assert_eq!(item["type"], "conversation.item.create");
    assert_eq!(item["item"]["role"], "user");
    let text = item["item"]["content"][0]["text"].as_str().unwrap();
    assert!(text.contains(DEFAULT_GREETING));

    assert_eq!(mock.next_event().await["type"], "response.create");
}

#[tokio::test]
async fn test_unparseable_frames_do_not_end_the_call() {
    let mut mock = MockRealtimeServer::start(MockBehavior::default()).await;
    let addr = spawn_bridge(test_config(&mock.url())).await;
    let mut client = connect_telephony(addr).await;

    send(&mut client, start("MZ3")).await;
    assert_eq!(mock.next_event().await["type"], "session.update");

    client
        .send(Message::Text("{not json".into()))
        .await
        .unwrap();
    send(&mut client, json!({"event": "media", "media": {"payload": "%%%", "timestamp": "0"}})).await;
    mock.push(json!({"type": "response.output_audio.delta"}));

    send(&mut client, media("MZ3", 20, &[0x33; 160])).await;
    let append = mock.next_event().await;
    assert_eq!(append["type"], "input_audio_buffer.append");
    assert_eq!(append["audio"], BASE64_STANDARD.encode([0x33u8; 160]));
}

#[tokio::test]
async fn test_telephony_hangup_closes_upstream() {
    let mut mock = MockRealtimeServer::start(MockBehavior::default()).await;
    let addr = spawn_bridge(test_config(&mock.url())).await;
    let mut client = connect_telephony(addr).await;

    send(&mut client, start("MZ4")).await;
    assert_eq!(mock.next_event().await["type"], "session.update");

    client.close(None).await.unwrap();
    mock.next_event_of(CLOSED_EVENT).await;
}

#[tokio::test]
async fn test_upstream_unreachable_closes_telephony() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let addr = spawn_bridge(test_config(&format!("ws://127.0.0.1:{port}/v1/realtime"))).await;
    let mut client = connect_telephony(addr).await;

    send(&mut client, start("MZ5")).await;
    expect_closed(&mut client).await;
}

#[tokio::test]
async fn test_missing_api_key_closes_telephony() {
    let config = ServerConfig {
        openai_api_key: None,
        ..test_config("ws://127.0.0.1:9/v1/realtime")
    };
    let addr = spawn_bridge(config).await;
    let mut client = connect_telephony(addr).await;
    expect_closed(&mut client).await;
}
