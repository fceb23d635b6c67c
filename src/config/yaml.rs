use serde::Deserialize;
use std::path::PathBuf;

/// Complete YAML configuration structure
///
/// All fields are optional to allow partial configuration. Values present
/// here override environment variables.
///
/// # Example YAML structure
/// ```yaml
/// server:
///   host: "0.0.0.0"
///   port: 5050
///   public_host: "bridge.example.com"
///   tls:
///     cert_path: "/etc/bridge/cert.pem"
///     key_path: "/etc/bridge/key.pem"
///
/// openai:
///   api_key: "sk-..."
///   model: "gpt-realtime"
///   url: "wss://api.openai.com/v1/realtime"
///
/// assistant:
///   voice: "alloy"
///   temperature: 0.8
///   system_message: "You are a helpful assistant."
///   audio_format: "pcm16"
///   greet_on_connect: true
///
/// telephony:
///   say_voice: "Google.en-US-Chirp3-HD-Aoede"
///
/// logging:
///   show_timing_math: false
///   log_event_types: ["error", "response.done"]
///
/// preview:
///   timeout_ms: 15000
///
/// personas:
///   path: "/etc/bridge/personas.yaml"
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub server: Option<ServerYaml>,
    pub openai: Option<OpenAIYaml>,
    pub assistant: Option<AssistantYaml>,
    pub telephony: Option<TelephonyYaml>,
    pub logging: Option<LoggingYaml>,
    pub preview: Option<PreviewYaml>,
    pub personas: Option<PersonasYaml>,
}

/// Server configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ServerYaml {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub public_host: Option<String>,
    pub tls: Option<TlsYaml>,
}

/// TLS configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TlsYaml {
    pub enabled: Option<bool>,
    pub cert_path: Option<String>,
    pub key_path: Option<String>,
}

/// Upstream provider settings from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct OpenAIYaml {
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub url: Option<String>,
}

/// Assistant defaults from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AssistantYaml {
    pub voice: Option<String>,
    pub temperature: Option<f32>,
    pub system_message: Option<String>,
    /// "pcm16" or "g711_ulaw"
    pub audio_format: Option<String>,
    pub greet_on_connect: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TelephonyYaml {
    pub say_voice: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct LoggingYaml {
    pub show_timing_math: Option<bool>,
    pub log_event_types: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct PreviewYaml {
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct PersonasYaml {
    pub path: Option<String>,
}

impl YamlConfig {
    /// Load configuration from a YAML file
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or the YAML is malformed.
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file {}: {e}", path.display()))?;

        let config: YamlConfig = serde_yaml::from_str(&contents)
            .map_err(|e| format!("Failed to parse YAML config: {e}"))?;

        Ok(config)
    }
}
