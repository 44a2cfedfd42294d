//! Text-to-speech providers.
//!
//! Backends implement [`SpeechSynthesizer`] and are chosen by
//! [`create_tts_provider`] from the provider name in a stored configuration.

mod base;
pub mod openai;

use std::path::PathBuf;

pub use base::{
    STREAM_CHUNK_INTERVAL, SpeechSynthesizer, StreamOutcome, TTSError, TTSResult, pace_chunks,
};
pub use openai::{OPENAI_TTS_URL, OpenAITTS, OpenAITTSModel, OpenAIVoice, map_voice};

use crate::core::provider_config::ProviderConfig;

/// Synthesis backends the bridge can drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TtsProviderKind {
    OpenAI,
}

impl TtsProviderKind {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "openai" | "open-ai" => Some(Self::OpenAI),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAI => "openai",
        }
    }
}

/// Factory function to create a TTS provider.
///
/// # Supported Providers
///
/// - `"openai"` - OpenAI TTS API (tts-1, tts-1-hd, gpt-4o-mini-tts)
pub fn create_tts_provider(
    config: &ProviderConfig,
    output_dir: impl Into<PathBuf>,
) -> TTSResult<Box<dyn SpeechSynthesizer>> {
    match TtsProviderKind::from_name(&config.provider) {
        Some(TtsProviderKind::OpenAI) => Ok(Box::new(OpenAITTS::new(config, output_dir)?)),
        None => Err(TTSError::InvalidConfiguration(format!(
            "Unsupported TTS provider: {}. Supported providers: openai",
            config.provider
        ))),
    }
}
