//! Environment variable loading.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use super::{ApiKey, ServerConfig, TlsConfig};
use crate::core::realtime::UpstreamAudioFormat;

/// Read a variable, treating unset and blank values alike.
pub(super) fn var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub(super) fn parse_var<T>(name: &str) -> Result<Option<T>, String>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match var(name) {
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|e| format!("Invalid value for {name}: {raw:?} ({e})")),
        None => Ok(None),
    }
}

pub(super) fn parse_bool(name: &str) -> Result<Option<bool>, String> {
    match var(name) {
        Some(raw) => match raw.to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(Some(true)),
            "false" | "0" | "no" | "off" => Ok(Some(false)),
            _ => Err(format!("Invalid boolean for {name}: {raw:?}")),
        },
        None => Ok(None),
    }
}

pub(super) fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Build a configuration from defaults overlaid with environment variables.
pub(super) fn load_from_env() -> Result<ServerConfig, Box<dyn std::error::Error>> {
    let mut config = ServerConfig::default();

    if let Some(host) = var("HOST") {
        config.host = host;
    }
    if let Some(port) = parse_var::<u16>("PORT")? {
        config.port = port;
    }
    config.public_host = var("PUBLIC_HOST");

    config.tls = match (var("TLS_CERT_PATH"), var("TLS_KEY_PATH")) {
        (Some(cert), Some(key)) => Some(TlsConfig {
            cert_path: PathBuf::from(cert),
            key_path: PathBuf::from(key),
        }),
        (None, None) => None,
        _ => {
            return Err("TLS_CERT_PATH and TLS_KEY_PATH must be set together".into());
        }
    };

    config.openai_api_key = var("OPENAI_API_KEY").map(ApiKey::new);
    if let Some(model) = var("OPENAI_REALTIME_MODEL") {
        config.realtime_model = model;
    }
    if let Some(url) = var("OPENAI_REALTIME_URL") {
        config.realtime_url = url;
    }

    if let Some(voice) = var("ASSISTANT_VOICE") {
        config.voice = voice;
    }
    if let Some(temperature) = parse_var::<f32>("ASSISTANT_TEMPERATURE")? {
        config.temperature = temperature;
    }
    if let Some(message) = var("SYSTEM_MESSAGE") {
        config.system_message = message;
    }
    if let Some(format) = var("UPSTREAM_AUDIO_FORMAT") {
        config.upstream_audio_format = UpstreamAudioFormat::from_str_or_default(&format);
    }
    if let Some(greet) = parse_bool("GREET_ON_CONNECT")? {
        config.greet_on_connect = greet;
    }

    if let Some(show) = parse_bool("SHOW_TIMING_MATH")? {
        config.show_timing_math = show;
    }
    if let Some(types) = var("LOG_EVENT_TYPES") {
        config.log_event_types = parse_list(&types);
    }

    if let Some(timeout) = parse_var::<u64>("PREVIEW_TIMEOUT_MS")? {
        config.preview_timeout_ms = timeout;
    }
    config.personas_path = var("PERSONAS_PATH").map(PathBuf::from);
    if let Some(say_voice) = var("TWIML_SAY_VOICE") {
        config.say_voice = say_voice;
    }

    Ok(config)
}
