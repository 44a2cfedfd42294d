use std::sync::Arc;

use crate::config::BridgeConfig;
use crate::core::provider_config::{ConfigStore, InMemoryConfigStore};
use crate::core::realtime::SessionRegistry;
use crate::core::session::{InMemorySessionDirectory, SessionDirectory};

/// Shared state behind every route.
pub struct AppState {
    pub config: BridgeConfig,
    pub directory: Arc<InMemorySessionDirectory>,
    pub config_store: Arc<InMemoryConfigStore>,
    pub registry: Arc<SessionRegistry>,
}

impl AppState {
    /// Seeds the in-memory collaborators from `config`.
    pub fn new(config: BridgeConfig) -> Arc<Self> {
        let directory = Arc::new(InMemorySessionDirectory::new(config.devices.iter().cloned()));
        let config_store = Arc::new(InMemoryConfigStore::new(config.providers.clone()));

        let registry = Arc::new(SessionRegistry::new(
            directory.clone() as Arc<dyn SessionDirectory>,
            config_store.clone() as Arc<dyn ConfigStore>,
            config.realtime.clone(),
        ));

        Arc::new(Self {
            config,
            directory,
            config_store,
            registry,
        })
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("address", &self.config.address())
            .field("sessions", &self.directory.session_count())
            .field("active_realtime", &self.registry.active_count())
            .finish()
    }
}
