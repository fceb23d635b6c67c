use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::info;

use crate::config::ServerConfig;
use crate::core::persona::{PersonaConfig, PersonaError, PersonaStore, StaticPersonaStore};

/// Shared application state
pub struct AppState {
    pub config: ServerConfig,
    pub personas: Arc<dyn PersonaStore>,
    started_at: Instant,
}

impl AppState {
    /// Build the state, loading personas from `config.personas_path` when set.
    ///
    /// Without a personas file the store holds a single active persona built
    /// from the server defaults.
    pub async fn new(config: ServerConfig) -> Result<Arc<Self>, PersonaError> {
        let store = match &config.personas_path {
            Some(path) => {
                let store = StaticPersonaStore::from_file(path)?;
                info!(path = %path.display(), "Loaded personas");
                store
            }
            None => StaticPersonaStore::new(vec![config.default_persona()])?,
        };

        Ok(Self::with_persona_store(config, Arc::new(store)))
    }

    pub fn with_persona_store(config: ServerConfig, personas: Arc<dyn PersonaStore>) -> Arc<Self> {
        Arc::new(Self {
            config,
            personas,
            started_at: Instant::now(),
        })
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Persona for a new call: the active one, else the server default.
    pub async fn persona_for_call(&self) -> PersonaConfig {
        match self.personas.active().await {
            Some(persona) => persona,
            None => self.config.default_persona(),
        }
    }
}
