//! OpenAI transcription client.
//!
//! - Endpoint: `POST https://api.openai.com/v1/audio/transcriptions`
//! - Request: multipart `file`, `model`, `language`, `response_format=json`
//! - Response: `{"text": "..."}`
//!
//! Input is staged in a temporary WAV file which is removed once the request
//! completes, whatever the outcome.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tracing::{debug, info};

use super::config::OpenAISTTModel;
use crate::core::audio;
use crate::core::provider_config::ProviderConfig;
use crate::core::stt::base::{STTError, STTResult, SpeechRecognizer};

/// OpenAI transcription endpoint.
pub const OPENAI_STT_URL: &str = "https://api.openai.com/v1/audio/transcriptions";

/// Language sent when neither the stored config nor the server sets one.
pub const DEFAULT_STT_LANGUAGE: &str = "zh";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

#[derive(Debug, Deserialize)]
struct OpenAIErrorResponse {
    error: OpenAIErrorBody,
}

#[derive(Debug, Deserialize)]
struct OpenAIErrorBody {
    message: String,
}

/// Batch recognizer backed by the OpenAI transcription API.
pub struct OpenAISTT {
    client: Client,
    api_key: String,
    endpoint: String,
    model: String,
    language: String,
    window: Duration,
}

impl std::fmt::Debug for OpenAISTT {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAISTT")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("language", &self.language)
            .field("window", &self.window)
            .finish_non_exhaustive()
    }
}

impl Drop for OpenAISTT {
    fn drop(&mut self) {
        use zeroize::Zeroize;
        self.api_key.zeroize();
    }
}

impl OpenAISTT {
    /// `default_language` applies when the stored config has none.
    pub fn new(config: &ProviderConfig, default_language: &str, window: Duration) -> STTResult<Self> {
        if config.api_key.is_empty() {
            return Err(STTError::ConfigurationError(
                "OpenAI STT requires an API key".to_string(),
            ));
        }

        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| STTError::ConfigurationError(format!("HTTP client: {e}")))?;

        let language = config
            .language
            .clone()
            .filter(|l| !l.is_empty())
            .unwrap_or_else(|| default_language.to_string());

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            endpoint: config
                .base_url
                .clone()
                .filter(|u| !u.is_empty())
                .unwrap_or_else(|| OPENAI_STT_URL.to_string()),
            model: config
                .model_name
                .as_deref()
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| OpenAISTTModel::default().as_str().to_string()),
            language,
            window,
        })
    }

    /// Model name sent upstream, verbatim from the stored config.
    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    fn error_message(status: reqwest::StatusCode, body: &str) -> String {
        match serde_json::from_str::<OpenAIErrorResponse>(body) {
            Ok(parsed) => format!("OpenAI API error ({status}): {}", parsed.error.message),
            Err(_) => format!("OpenAI API error ({status}): {body}"),
        }
    }
}

#[async_trait]
impl SpeechRecognizer for OpenAISTT {
    fn provider_name(&self) -> &'static str {
        "openai"
    }

    fn supports_streaming_recognition(&self) -> bool {
        false
    }

    fn stream_window(&self) -> Duration {
        self.window
    }

    async fn transcribe(&self, audio_data: &[u8]) -> STTResult<String> {
        if audio_data.is_empty() {
            return Err(STTError::InvalidAudioFormat("Empty audio".to_string()));
        }

        let wav = audio::ensure_wav(audio_data, audio::DEVICE_SAMPLE_RATE, audio::DEVICE_CHANNELS)
            .map_err(|e| STTError::InvalidAudioFormat(e.to_string()))?;

        let staged = tempfile::Builder::new()
            .prefix("openai_stt_")
            .suffix(".wav")
            .tempfile()?;
        tokio::fs::write(staged.path(), &wav).await?;
        let file = tokio::fs::File::open(staged.path()).await?;

        let file_part = Part::stream_with_length(file, wav.len() as u64)
            .file_name("audio.wav")
            .mime_str("audio/wav")
            .map_err(|e| STTError::ConfigurationError(format!("Invalid MIME type: {e}")))?;

        let form = Form::new()
            .part("file", file_part)
            .text("model", self.model.clone())
            .text("language", self.language.clone())
            .text("response_format", "json");

        debug!(bytes = wav.len(), model = %self.model, "Sending transcription request");

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .multipart(form)
            .send()
            .await
            .map_err(|e| STTError::NetworkError(format!("Request failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| STTError::NetworkError(format!("Failed to read response: {e}")))?;
        drop(staged);

        if !status.is_success() {
            let message = Self::error_message(status, &body);
            return Err(if status == reqwest::StatusCode::UNAUTHORIZED {
                STTError::AuthenticationFailed(message)
            } else {
                STTError::ProviderError(message)
            });
        }

        let parsed: TranscriptionResponse = serde_json::from_str(&body)
            .map_err(|e| STTError::ProviderError(format!("Unexpected response: {e}")))?;

        info!(chars = parsed.text.chars().count(), "Transcription complete");
        Ok(parsed.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::provider_config::{ConfigKind, test_config};

    #[test]
    fn test_new_defaults() {
        let config = test_config("u1", ConfigKind::Stt, "sk-test");
        let stt = OpenAISTT::new(&config, DEFAULT_STT_LANGUAGE, Duration::from_secs(3)).unwrap();
        assert_eq!(stt.model(), "whisper-1");
        assert_eq!(stt.language(), "zh");
        assert_eq!(stt.endpoint, OPENAI_STT_URL);
        assert_eq!(stt.stream_window(), Duration::from_secs(3));
        assert!(!stt.supports_streaming_recognition());
    }

    #[test]
    fn test_config_language_wins() {
        let mut config = test_config("u1", ConfigKind::Stt, "sk-test");
        config.language = Some("en".to_string());
        config.model_name = Some("gpt-4o-transcribe".to_string());
        let stt = OpenAISTT::new(&config, "zh", Duration::from_secs(1)).unwrap();
        assert_eq!(stt.language(), "en");
        assert_eq!(stt.model(), "gpt-4o-transcribe");
    }

    #[test]
    fn test_unlisted_model_passes_through() {
        let mut config = test_config("u1", ConfigKind::Stt, "sk-test");
        config.model_name = Some(" whisper-large-v3 ".to_string());
        let stt = OpenAISTT::new(&config, "zh", Duration::from_secs(1)).unwrap();
        assert_eq!(stt.model(), "whisper-large-v3");

        config.model_name = Some(String::new());
        let stt = OpenAISTT::new(&config, "zh", Duration::from_secs(1)).unwrap();
        assert_eq!(stt.model(), OpenAISTTModel::Whisper1.as_str());
    }

    #[test]
    fn test_missing_api_key_rejected() {
        let config = test_config("u1", ConfigKind::Stt, "");
        assert!(matches!(
            OpenAISTT::new(&config, "zh", Duration::from_secs(1)),
            Err(STTError::ConfigurationError(_))
        ));
    }

    #[test]
    fn test_error_message_prefers_api_error() {
        let body = r#"{"error":{"message":"Invalid API key","type":"invalid_request_error"}}"#;
        let message = OpenAISTT::error_message(reqwest::StatusCode::UNAUTHORIZED, body);
        assert!(message.contains("Invalid API key"));

        let message = OpenAISTT::error_message(reqwest::StatusCode::BAD_GATEWAY, "upstream down");
        assert!(message.contains("upstream down"));
    }

    #[tokio::test]
    async fn test_empty_audio_rejected() {
        let config = test_config("u1", ConfigKind::Stt, "sk-test");
        let stt = OpenAISTT::new(&config, "zh", Duration::from_secs(1)).unwrap();
        assert!(matches!(stt.transcribe(&[]).await, Err(STTError::InvalidAudioFormat(_))));
        assert_eq!(stt.recognize(&[]).await, "");
    }
}
