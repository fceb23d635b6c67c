//! Overlaying YAML values on the environment-derived configuration.

use std::path::PathBuf;

use super::yaml::YamlConfig;
use super::{ApiKey, ServerConfig, TlsConfig, env};
use crate::core::realtime::UpstreamAudioFormat;

/// Load the environment configuration and apply `yaml` on top of it.
pub(super) fn merge_config(
    yaml: Option<YamlConfig>,
) -> Result<ServerConfig, Box<dyn std::error::Error>> {
    let mut config = env::load_from_env()?;
    if let Some(yaml) = yaml {
        apply_yaml(&mut config, yaml)?;
    }
    Ok(config)
}

fn apply_yaml(
    config: &mut ServerConfig,
    yaml: YamlConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(server) = yaml.server {
        if let Some(host) = server.host {
            config.host = host;
        }
        if let Some(port) = server.port {
            config.port = port;
        }
        if let Some(public_host) = server.public_host {
            config.public_host = Some(public_host);
        }
        if let Some(tls) = server.tls {
            match (tls.enabled, tls.cert_path, tls.key_path) {
                (Some(false), _, _) => config.tls = None,
                (_, Some(cert), Some(key)) => {
                    config.tls = Some(TlsConfig {
                        cert_path: PathBuf::from(cert),
                        key_path: PathBuf::from(key),
                    })
                }
                (Some(true), _, _) => {
                    return Err("server.tls requires both cert_path and key_path".into());
                }
                _ => {}
            }
        }
    }

    if let Some(openai) = yaml.openai {
        if let Some(key) = openai.api_key {
            config.openai_api_key = Some(ApiKey::new(key));
        }
        if let Some(model) = openai.model {
            config.realtime_model = model;
        }
        if let Some(url) = openai.url {
            config.realtime_url = url;
        }
    }

    if let Some(assistant) = yaml.assistant {
        if let Some(voice) = assistant.voice {
            config.voice = voice;
        }
        if let Some(temperature) = assistant.temperature {
            config.temperature = temperature;
        }
        if let Some(message) = assistant.system_message {
            config.system_message = message;
        }
        if let Some(format) = assistant.audio_format {
            config.upstream_audio_format = UpstreamAudioFormat::from_str_or_default(&format);
        }
        if let Some(greet) = assistant.greet_on_connect {
            config.greet_on_connect = greet;
        }
    }

    if let Some(telephony) = yaml.telephony
        && let Some(say_voice) = telephony.say_voice
    {
        config.say_voice = say_voice;
    }

    if let Some(logging) = yaml.logging {
        if let Some(show) = logging.show_timing_math {
            config.show_timing_math = show;
        }
        if let Some(types) = logging.log_event_types {
            config.log_event_types = types;
        }
    }

    if let Some(preview) = yaml.preview
        && let Some(timeout) = preview.timeout_ms
    {
        config.preview_timeout_ms = timeout;
    }

    if let Some(personas) = yaml.personas
        && let Some(path) = personas.path
    {
        config.personas_path = Some(PathBuf::from(path));
    }

    Ok(())
}
