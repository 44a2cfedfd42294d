//! Configuration module for the voice bridge
//!
//! This module handles server configuration from various sources: .env files, YAML files,
//! and environment variables. Priority: YAML > ENV vars > .env values > defaults.
//!
//! # Modules
//! - `env`: Environment variable loading
//! - `yaml`: YAML configuration file loading
//!
//! # Example
//! ```rust,no_run
//! use voice_bridge::config::BridgeConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from environment variables only
//! let config = BridgeConfig::from_env()?;
//!
//! // Load from YAML file with environment variable overrides
//! let config = BridgeConfig::from_file(&PathBuf::from("config.yaml"))?;
//!
//! println!("Server listening on {}", config.address());
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

use crate::core::provider_config::ProviderConfig;
use crate::core::realtime::RealtimeSettings;
use crate::core::session::Device;
use crate::core::stt::DEFAULT_STT_LANGUAGE;

mod env;
mod yaml;

pub use yaml::YamlConfig;

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 3001;
pub const DEFAULT_TTS_OUTPUT_DIR: &str = "data/tts";
pub const DEFAULT_STT_WINDOW_SECS: u64 = 3;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {message}")]
    Read { path: PathBuf, message: String },

    #[error("Failed to parse YAML config: {0}")]
    Parse(String),

    #[error("Invalid value for {name}: {value}")]
    InvalidValue { name: String, value: String },

    #[error("Invalid configuration: {0}")]
    Validation(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Server configuration.
///
/// Provider credentials and devices seed the in-memory collaborators the
/// server runs with. Provider API keys are zeroized when the config drops.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    // Server settings
    pub host: String,
    pub port: u16,
    /// CORS allowed origins (comma-separated list or "*" for all)
    pub cors_allowed_origins: Option<String>,

    // Realtime session settings
    pub realtime: RealtimeSettings,

    // Batch speech settings
    pub tts_output_dir: PathBuf,
    /// Language hint for recognition when the stored provider config has none
    pub stt_language: String,
    pub stt_window_secs: u64,

    pub providers: Vec<ProviderConfig>,
    pub devices: Vec<Device>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            cors_allowed_origins: None,
            realtime: RealtimeSettings::default(),
            tts_output_dir: PathBuf::from(DEFAULT_TTS_OUTPUT_DIR),
            stt_language: DEFAULT_STT_LANGUAGE.to_string(),
            stt_window_secs: DEFAULT_STT_WINDOW_SECS,
            providers: Vec::new(),
            devices: Vec::new(),
        }
    }
}

impl BridgeConfig {
    /// Load configuration from environment variables over defaults.
    ///
    /// The .env file is loaded in main.rs before this runs.
    pub fn from_env() -> ConfigResult<Self> {
        let config = env::load()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file with environment variable base.
    ///
    /// Priority order (highest to lowest):
    /// 1. YAML file values
    /// 2. Environment variables (actual ENV vars override .env values)
    /// 3. .env file values
    /// 4. Default values
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let yaml_config = YamlConfig::from_file(path)?;
        let mut config = env::load()?;
        yaml_config.apply(&mut config);
        config.validate()?;
        Ok(config)
    }

    /// Get the server address as "host:port"
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn stt_window(&self) -> Duration {
        Duration::from_secs(self.stt_window_secs)
    }

    fn validate(&self) -> ConfigResult<()> {
        if self.stt_window_secs == 0 {
            return Err(ConfigError::Validation(
                "stt_window_secs must be greater than zero".to_string(),
            ));
        }
        if self.realtime.connect_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "realtime connect timeout must be greater than zero".to_string(),
            ));
        }
        for provider in &self.providers {
            if provider.provider.trim().is_empty() || provider.user_id.trim().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "provider entries need a provider name and user_id (kind: {})",
                    provider.kind
                )));
            }
        }
        for device in &self.devices {
            if device.device_id.trim().is_empty() || device.user_id.trim().is_empty() {
                return Err(ConfigError::Validation(
                    "device entries need a device_id and user_id".to_string(),
                ));
            }
        }
        Ok(())
    }
}
