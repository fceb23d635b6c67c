//! Configuration validation.

use super::{ServerConfig, TlsConfig};

/// Sampling temperatures accepted by the realtime provider.
pub const TEMPERATURE_RANGE: std::ops::RangeInclusive<f32> = 0.6..=1.2;

pub(super) fn validate_temperature(temperature: f32) -> Result<(), String> {
    if !TEMPERATURE_RANGE.contains(&temperature) {
        return Err(format!(
            "Assistant temperature {temperature} is outside {}..={}",
            TEMPERATURE_RANGE.start(),
            TEMPERATURE_RANGE.end()
        ));
    }
    Ok(())
}

pub(super) fn validate_preview_timeout(timeout_ms: u64) -> Result<(), String> {
    if timeout_ms == 0 {
        return Err("Preview timeout must be greater than zero".to_string());
    }
    Ok(())
}

pub(super) fn validate_realtime_url(url: &str) -> Result<(), String> {
    let parsed = url::Url::parse(url).map_err(|e| format!("Invalid realtime URL {url:?}: {e}"))?;
    match parsed.scheme() {
        "ws" | "wss" => Ok(()),
        other => Err(format!(
            "Realtime URL must use ws:// or wss://, got {other}://"
        )),
    }
}

pub(super) fn validate_tls(tls: &Option<TlsConfig>) -> Result<(), String> {
    if let Some(tls) = tls {
        if !tls.cert_path.exists() {
            return Err(format!(
                "TLS certificate not found: {}",
                tls.cert_path.display()
            ));
        }
        if !tls.key_path.exists() {
            return Err(format!("TLS key not found: {}", tls.key_path.display()));
        }
    }
    Ok(())
}

pub(super) fn validate(config: &ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    validate_temperature(config.temperature)?;
    validate_preview_timeout(config.preview_timeout_ms)?;
    validate_realtime_url(&config.realtime_url)?;
    validate_tls(&config.tls)?;
    Ok(())
}
