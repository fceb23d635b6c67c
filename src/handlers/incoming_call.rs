//! Call-control handoff.
//!
//! The telephony provider requests `/incoming-call` when a call arrives and
//! receives TwiML that plays a short introduction and then connects the call
//! audio to `/media-stream` on this host.

use axum::{
    extract::State,
    http::{HeaderMap, header},
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::{info, warn};

use crate::state::AppState;

/// Spoken before the stream connects when the persona has no greeting.
pub const DEFAULT_INTRO: &str = "Please wait while we connect your call to the A. I. voice assistant, \
powered by Twilio and the Open A I Realtime API";

const READY_PROMPT: &str = "O.K. you can start talking!";

/// Inputs for [`build_twiml`].
#[derive(Debug, Clone)]
pub struct TwimlParams<'a> {
    pub host: &'a str,
    pub say_voice: &'a str,
    pub greeting: Option<&'a str>,
    /// Assistant voice forwarded to the media stream as a custom parameter
    pub assistant_voice: &'a str,
}

pub fn build_twiml(params: &TwimlParams<'_>) -> String {
    let intro = params.greeting.unwrap_or(DEFAULT_INTRO);
    let say_voice = escape_xml(params.say_voice);

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<Response>
  <Say voice="{say_voice}">{intro}</Say>
  <Pause length="1"/>
  <Say voice="{say_voice}">{ready}</Say>
  <Connect>
    <Stream url="wss://{host}/media-stream">
      <Parameter name="voice" value="{voice}"/>
    </Stream>
  </Connect>
</Response>"#,
        intro = escape_xml(intro),
        ready = READY_PROMPT,
        host = escape_xml(params.host),
        voice = escape_xml(params.assistant_voice),
    )
}

/// Escape text for use in XML element content and attribute values.
pub fn escape_xml(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

/// Handle `GET|POST /incoming-call`
pub async fn incoming_call_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let persona = state.persona_for_call().await;

    let request_host = headers
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .map(str::to_string);
    let host = match (&state.config.public_host, request_host) {
        (Some(public), _) => public.clone(),
        (None, Some(host)) => host,
        (None, None) => {
            warn!("Incoming call without Host header, falling back to bind address");
            state.config.address()
        }
    };

    info!(persona = %persona.id, host = %host, "Incoming call");

    let twiml = build_twiml(&TwimlParams {
        host: &host,
        say_voice: &state.config.say_voice,
        greeting: persona.greeting(),
        assistant_voice: persona.voice_or(&state.config.voice),
    });

    ([(header::CONTENT_TYPE, "text/xml")], twiml)
}
