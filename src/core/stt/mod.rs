//! Speech-to-text providers.
//!
//! Backends implement [`SpeechRecognizer`]. Batch-only backends get streaming
//! through [`WindowedBatcher`], which cuts the incoming audio into fixed
//! windows and recognizes each one.

mod base;
mod batcher;
pub mod openai;

use std::time::Duration;

pub use base::{DEFAULT_STREAM_WINDOW, STTError, STTResult, SpeechRecognizer};
pub use batcher::WindowedBatcher;
pub use openai::{DEFAULT_STT_LANGUAGE, OPENAI_STT_URL, OpenAISTT, OpenAISTTModel};

use crate::core::provider_config::ProviderConfig;

/// Recognition backends the bridge can drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SttProviderKind {
    OpenAI,
}

impl SttProviderKind {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "openai" | "open-ai" | "whisper" => Some(Self::OpenAI),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAI => "openai",
        }
    }
}

/// Factory function to create an STT provider.
///
/// `default_language` and `window` come from server configuration and are
/// overridden by the stored provider config where it sets them.
pub fn create_stt_provider(
    config: &ProviderConfig,
    default_language: &str,
    window: Duration,
) -> STTResult<Box<dyn SpeechRecognizer>> {
    match SttProviderKind::from_name(&config.provider) {
        Some(SttProviderKind::OpenAI) => {
            Ok(Box::new(OpenAISTT::new(config, default_language, window)?))
        }
        None => Err(STTError::ConfigurationError(format!(
            "Unsupported STT provider: {}. Supported providers: openai",
            config.provider
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::provider_config::{ConfigKind, test_config};

    #[test]
    fn test_create_stt_provider() {
        let config = test_config("u1", ConfigKind::Stt, "sk-test");
        let provider = create_stt_provider(&config, "zh", DEFAULT_STREAM_WINDOW).unwrap();
        assert_eq!(provider.provider_name(), "openai");
        assert_eq!(provider.stream_window(), DEFAULT_STREAM_WINDOW);

        let mut invalid = test_config("u1", ConfigKind::Stt, "sk-test");
        invalid.provider = "deepgram".to_string();
        assert!(create_stt_provider(&invalid, "zh", DEFAULT_STREAM_WINDOW).is_err());
    }

    #[test]
    fn test_provider_kind_names() {
        assert_eq!(SttProviderKind::from_name("Whisper"), Some(SttProviderKind::OpenAI));
        assert_eq!(SttProviderKind::OpenAI.as_str(), "openai");
        assert_eq!(SttProviderKind::from_name("groq"), None);
    }
}
