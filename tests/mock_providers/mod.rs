//! Mock provider servers for integration tests
//!
//! - `realtime_mock`: an upstream realtime WebSocket server that records what
//!   the bridge sends and replays scripted server events.

// Each test binary uses a different subset of the helpers
#![allow(dead_code)]

pub mod realtime_mock;

use call_bridge::config::{ApiKey, ServerConfig};
use call_bridge::core::realtime::UpstreamAudioFormat;

/// Configuration pointing the bridge at a mock upstream.
pub fn test_config(realtime_url: &str) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        openai_api_key: Some(ApiKey::new("sk-test")),
        realtime_url: realtime_url.to_string(),
        upstream_audio_format: UpstreamAudioFormat::G711Ulaw,
        ..ServerConfig::default()
    }
}
