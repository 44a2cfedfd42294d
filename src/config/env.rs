//! Environment variable loading.

use std::path::PathBuf;
use std::str::FromStr;

use super::{BridgeConfig, ConfigError, ConfigResult};

fn var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse<T: FromStr>(name: &str) -> ConfigResult<Option<T>> {
    match var(name) {
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                name: name.to_string(),
                value,
            }),
        None => Ok(None),
    }
}

/// Defaults overridden by whatever the environment sets.
pub(super) fn load() -> ConfigResult<BridgeConfig> {
    let mut config = BridgeConfig::default();

    if let Some(host) = var("HOST") {
        config.host = host;
    }
    if let Some(port) = parse("PORT")? {
        config.port = port;
    }
    config.cors_allowed_origins = var("CORS_ALLOWED_ORIGINS");

    if let Some(url) = var("OPENAI_REALTIME_URL") {
        config.realtime.url = url;
    }
    if let Some(model) = var("OPENAI_REALTIME_MODEL") {
        config.realtime.default_model = model;
    }
    if let Some(instructions) = var("REALTIME_INSTRUCTIONS") {
        config.realtime.instructions = instructions;
    }
    if let Some(voice) = var("REALTIME_VOICE") {
        config.realtime.voice = voice;
    }

    if let Some(dir) = var("TTS_OUTPUT_DIR") {
        config.tts_output_dir = PathBuf::from(dir);
    }
    if let Some(language) = var("STT_LANGUAGE") {
        config.stt_language = language;
    }
    if let Some(window) = parse("STT_WINDOW_SECS")? {
        config.stt_window_secs = window;
    }

    Ok(config)
}
