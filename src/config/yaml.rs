use std::path::{Path, PathBuf};

use serde::Deserialize;

use super::{BridgeConfig, ConfigError, ConfigResult};
use crate::core::provider_config::ProviderConfig;
use crate::core::session::Device;

/// Complete YAML configuration structure
///
/// All fields are optional to allow partial configuration; anything present
/// overrides the environment.
///
/// # Example YAML structure
/// ```yaml
/// server:
///   host: "0.0.0.0"
///   port: 3001
///   cors_allowed_origins: "*"
///
/// realtime:
///   url: "wss://api.openai.com/v1/realtime"
///   model: "gpt-4o-realtime-preview-2024-10-01"
///   voice: "alloy"
///   temperature: 0.8
///
/// speech:
///   tts_output_dir: "/var/lib/voice-bridge/tts"
///   stt_language: "zh"
///   stt_window_secs: 3
///
/// providers:
///   - provider: openai
///     api_key: "sk-..."
///     kind: realtime
///     user_id: "user-1"
///
/// devices:
///   - device_id: "esp32-01"
///     user_id: "user-1"
///     role_id: "assistant"
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub server: Option<ServerYaml>,
    pub realtime: Option<RealtimeYaml>,
    pub speech: Option<SpeechYaml>,
    pub providers: Option<Vec<ProviderConfig>>,
    pub devices: Option<Vec<Device>>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ServerYaml {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub cors_allowed_origins: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RealtimeYaml {
    pub url: Option<String>,
    pub model: Option<String>,
    pub instructions: Option<String>,
    pub voice: Option<String>,
    pub transcription_model: Option<String>,
    pub temperature: Option<f32>,
    pub max_response_output_tokens: Option<u32>,
    pub connect_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SpeechYaml {
    pub tts_output_dir: Option<PathBuf>,
    pub stt_language: Option<String>,
    pub stt_window_secs: Option<u64>,
}

impl YamlConfig {
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Overrides `config` with every value present in the file.
    pub fn apply(self, config: &mut BridgeConfig) {
        if let Some(server) = self.server {
            if let Some(host) = server.host {
                config.host = host;
            }
            if let Some(port) = server.port {
                config.port = port;
            }
            if server.cors_allowed_origins.is_some() {
                config.cors_allowed_origins = server.cors_allowed_origins;
            }
        }

        if let Some(realtime) = self.realtime {
            let settings = &mut config.realtime;
            if let Some(url) = realtime.url {
                settings.url = url;
            }
            if let Some(model) = realtime.model {
                settings.default_model = model;
            }
            if let Some(instructions) = realtime.instructions {
                settings.instructions = instructions;
            }
            if let Some(voice) = realtime.voice {
                settings.voice = voice;
            }
            if let Some(model) = realtime.transcription_model {
                settings.transcription_model = model;
            }
            if let Some(temperature) = realtime.temperature {
                settings.temperature = temperature;
            }
            if let Some(tokens) = realtime.max_response_output_tokens {
                settings.max_response_output_tokens = tokens;
            }
            if let Some(secs) = realtime.connect_timeout_secs {
                settings.connect_timeout_secs = secs;
            }
        }

        if let Some(speech) = self.speech {
            if let Some(dir) = speech.tts_output_dir {
                config.tts_output_dir = dir;
            }
            if let Some(language) = speech.stt_language {
                config.stt_language = language;
            }
            if let Some(window) = speech.stt_window_secs {
                config.stt_window_secs = window;
            }
        }

        if let Some(providers) = self.providers {
            config.providers = providers;
        }
        if let Some(devices) = self.devices {
            config.devices = devices;
        }
    }
}
