//! Assistant personas.
//!
//! A persona supplies the voice, instructions and greeting for a call. The
//! bridge only reads personas; they are managed elsewhere and loaded here
//! from a YAML file or built from server defaults.
//!
//! ```yaml
//! personas:
//!   - id: concierge
//!     name: Hotel Concierge
//!     voice: sage
//!     system_message: You are a concierge at a small hotel.
//!     initial_greeting: Good evening, how can I help?
//!     is_active: true
//! ```

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Prompt used for previews when a persona has neither greeting nor instructions.
pub const DEFAULT_PREVIEW_PROMPT: &str = "Hello!";

#[derive(Debug, Error)]
pub enum PersonaError {
    #[error("failed to read personas file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse personas file: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("duplicate persona id: {0}")]
    DuplicateId(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonaConfig {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub voice: Option<String>,
    #[serde(default)]
    pub system_message: Option<String>,
    #[serde(default)]
    pub initial_greeting: Option<String>,
    #[serde(default)]
    pub is_active: bool,
}

impl PersonaConfig {
    pub fn voice_or<'a>(&'a self, default: &'a str) -> &'a str {
        non_empty(self.voice.as_deref()).unwrap_or(default)
    }

    pub fn instructions_or<'a>(&'a self, default: &'a str) -> &'a str {
        non_empty(self.system_message.as_deref()).unwrap_or(default)
    }

    pub fn greeting(&self) -> Option<&str> {
        non_empty(self.initial_greeting.as_deref())
    }

    /// Text spoken by a preview: greeting, else instructions, else "Hello!".
    pub fn preview_prompt(&self) -> &str {
        self.greeting()
            .or_else(|| non_empty(self.system_message.as_deref()))
            .unwrap_or(DEFAULT_PREVIEW_PROMPT)
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Read-only persona source.
#[async_trait]
pub trait PersonaStore: Send + Sync {
    async fn list(&self) -> Vec<PersonaConfig>;

    async fn get(&self, id: &str) -> Option<PersonaConfig>;

    /// The persona used for incoming calls, if any is marked active.
    async fn active(&self) -> Option<PersonaConfig>;
}

#[derive(Debug, Deserialize)]
struct PersonaFile {
    #[serde(default)]
    personas: Vec<PersonaConfig>,
}

/// In-memory persona store.
#[derive(Debug, Clone, Default)]
pub struct StaticPersonaStore {
    personas: Vec<PersonaConfig>,
}

impl StaticPersonaStore {
    pub fn new(personas: Vec<PersonaConfig>) -> Result<Self, PersonaError> {
        for (index, persona) in personas.iter().enumerate() {
            if personas[..index].iter().any(|p| p.id == persona.id) {
                return Err(PersonaError::DuplicateId(persona.id.clone()));
            }
        }
        Ok(Self { personas })
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, PersonaError> {
        let file: PersonaFile = serde_yaml::from_str(yaml)?;
        Self::new(file.personas)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, PersonaError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }
}

#[async_trait]
impl PersonaStore for StaticPersonaStore {
    async fn list(&self) -> Vec<PersonaConfig> {
        self.personas.clone()
    }

    async fn get(&self, id: &str) -> Option<PersonaConfig> {
        self.personas.iter().find(|p| p.id == id).cloned()
    }

    async fn active(&self) -> Option<PersonaConfig> {
        self.personas.iter().find(|p| p.is_active).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn persona(id: &str) -> PersonaConfig {
        PersonaConfig {
            id: id.to_string(),
            name: None,
            voice: None,
            system_message: None,
            initial_greeting: None,
            is_active: false,
        }
    }

    #[test]
    fn test_fallbacks() {
        let mut p = persona("a");
        assert_eq!(p.voice_or("alloy"), "alloy");
        assert_eq!(p.instructions_or("default"), "default");
        assert_eq!(p.preview_prompt(), "Hello!");

        p.system_message = Some("Be kind.".to_string());
        assert_eq!(p.preview_prompt(), "Be kind.");

        p.initial_greeting = Some("  ".to_string());
        assert_eq!(p.preview_prompt(), "Be kind.");

        p.initial_greeting = Some("Hi!".to_string());
        p.voice = Some("sage".to_string());
        assert_eq!(p.preview_prompt(), "Hi!");
        assert_eq!(p.voice_or("alloy"), "sage");
    }

    #[tokio::test]
    async fn test_store_from_yaml() {
        let yaml = r#"
personas:
  - id: one
    voice: ash
  - id: two
    initial_greeting: Welcome
    is_active: true
"#;
        let store = StaticPersonaStore::from_yaml(yaml).unwrap();
        assert_eq!(store.list().await.len(), 2);
        assert_eq!(store.get("one").await.unwrap().voice.as_deref(), Some("ash"));
        assert!(store.get("three").await.is_none());
        assert_eq!(store.active().await.unwrap().id, "two");
    }

    #[tokio::test]
    async fn test_no_active_persona() {
        let store = StaticPersonaStore::new(vec![persona("a")]).unwrap();
        assert!(store.active().await.is_none());
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let err = StaticPersonaStore::new(vec![persona("a"), persona("a")]).unwrap_err();
        assert!(matches!(err, PersonaError::DuplicateId(id) if id == "a"));
    }

    #[test]
    fn test_missing_file() {
        let err = StaticPersonaStore::from_file("/nonexistent/personas.yaml").unwrap_err();
        assert!(matches!(err, PersonaError::Io(_)));
    }
}
