//! Provider configuration lookup.
//!
//! Persistent storage of provider credentials lives outside the bridge; it is
//! reached through [`ConfigStore`]. The resolver applies the fixed fallback
//! chain used when a realtime session starts.

use std::fmt;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::session::Device;

/// Provider name the realtime bridge looks up.
pub const OPENAI_PROVIDER: &str = "openai";

/// Category of a stored provider configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigKind {
    Realtime,
    Llm,
    Stt,
    Tts,
}

impl ConfigKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Realtime => "realtime",
            Self::Llm => "llm",
            Self::Stt => "stt",
            Self::Tts => "tts",
        }
    }
}

impl fmt::Display for ConfigKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Backend credentials and endpoint for one provider.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub provider: String,
    pub api_key: String,
    /// Full endpoint URL replacing the provider default.
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub model_name: Option<String>,
    pub kind: ConfigKind,
    pub user_id: String,
    /// Language hint for recognition backends.
    #[serde(default)]
    pub language: Option<String>,
    /// Default voice for synthesis backends.
    #[serde(default)]
    pub voice: Option<String>,
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("provider", &self.provider)
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("model_name", &self.model_name)
            .field("kind", &self.kind)
            .field("user_id", &self.user_id)
            .field("language", &self.language)
            .field("voice", &self.voice)
            .finish()
    }
}

impl Drop for ProviderConfig {
    fn drop(&mut self) {
        use zeroize::Zeroize;
        self.api_key.zeroize();
    }
}

/// Lookup conditions for [`ConfigStore::find_config`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigQuery {
    pub user_id: String,
    pub kind: ConfigKind,
    pub provider: String,
}

impl ConfigQuery {
    pub fn new(user_id: impl Into<String>, kind: ConfigKind, provider: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            kind,
            provider: provider.into(),
        }
    }

    pub fn matches(&self, config: &ProviderConfig) -> bool {
        config.user_id == self.user_id
            && config.kind == self.kind
            && config.provider.eq_ignore_ascii_case(&self.provider)
    }
}

/// Read-only access to stored provider configurations.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// First configuration matching every condition, if any.
    async fn find_config(&self, query: &ConfigQuery) -> Option<ProviderConfig>;
}

/// Config store backed by a list held in memory, first match wins.
#[derive(Debug, Default)]
pub struct InMemoryConfigStore {
    configs: RwLock<Vec<ProviderConfig>>,
}

impl InMemoryConfigStore {
    pub fn new(configs: Vec<ProviderConfig>) -> Self {
        Self {
            configs: RwLock::new(configs),
        }
    }

    pub fn insert(&self, config: ProviderConfig) {
        self.configs.write().push(config);
    }

    pub fn len(&self) -> usize {
        self.configs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.configs.read().is_empty()
    }
}

#[async_trait]
impl ConfigStore for InMemoryConfigStore {
    async fn find_config(&self, query: &ConfigQuery) -> Option<ProviderConfig> {
        self.configs
            .read()
            .iter()
            .find(|config| query.matches(config))
            .cloned()
    }
}

/// Picks the backend configuration a device's realtime session uses.
///
/// Order: the owner's `realtime/openai` entry, then `llm/openai`.
pub async fn resolve(store: &dyn ConfigStore, device: &Device) -> Option<ProviderConfig> {
    for kind in [ConfigKind::Realtime, ConfigKind::Llm] {
        let query = ConfigQuery::new(&device.user_id, kind, OPENAI_PROVIDER);
        if let Some(config) = store.find_config(&query).await {
            debug!(
                device_id = %device.device_id,
                kind = %kind,
                "Resolved provider configuration"
            );
            return Some(config);
        }
    }
    None
}

/// Looks up the configuration for a single kind, used by the speech endpoints.
pub async fn resolve_kind(
    store: &dyn ConfigStore,
    user_id: &str,
    kind: ConfigKind,
) -> Option<ProviderConfig> {
    store
        .find_config(&ConfigQuery::new(user_id, kind, OPENAI_PROVIDER))
        .await
}

#[cfg(test)]
pub(crate) fn test_config(user_id: &str, kind: ConfigKind, api_key: &str) -> ProviderConfig {
    ProviderConfig {
        provider: OPENAI_PROVIDER.to_string(),
        api_key: api_key.to_string(),
        base_url: None,
        model_name: None,
        kind,
        user_id: user_id.to_string(),
        language: None,
        voice: None,
    }
}
