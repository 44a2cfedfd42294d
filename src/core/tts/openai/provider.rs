//! OpenAI TTS provider implementation.
//!
//! - Endpoint: `POST https://api.openai.com/v1/audio/speech`
//! - Request: `{model, input, voice, response_format: "wav", speed: 1.0}`
//! - Response: WAV bytes (24kHz 16-bit mono)

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::{debug, error, info};
use uuid::Uuid;

use super::config::{OpenAITTSModel, OpenAIVoice};
use crate::core::audio::{self, WavAudio};
use crate::core::provider_config::ProviderConfig;
use crate::core::tts::base::{SpeechSynthesizer, TTSError, TTSResult};

/// OpenAI TTS API endpoint
pub const OPENAI_TTS_URL: &str = "https://api.openai.com/v1/audio/speech";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// OpenAI text-to-speech backend writing WAV files to a local directory.
pub struct OpenAITTS {
    client: Client,
    api_key: String,
    endpoint: String,
    model: String,
    voice: OpenAIVoice,
    output_dir: PathBuf,
}

impl std::fmt::Debug for OpenAITTS {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAITTS")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("voice", &self.voice)
            .field("output_dir", &self.output_dir)
            .finish_non_exhaustive()
    }
}

impl Drop for OpenAITTS {
    fn drop(&mut self) {
        use zeroize::Zeroize;
        self.api_key.zeroize();
    }
}

impl OpenAITTS {
    pub fn new(config: &ProviderConfig, output_dir: impl Into<PathBuf>) -> TTSResult<Self> {
        if config.api_key.is_empty() {
            return Err(TTSError::InvalidConfiguration(
                "OpenAI TTS requires an API key".to_string(),
            ));
        }

        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| TTSError::InvalidConfiguration(format!("HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            endpoint: config
                .base_url
                .clone()
                .filter(|u| !u.is_empty())
                .unwrap_or_else(|| OPENAI_TTS_URL.to_string()),
            model: config
                .model_name
                .as_deref()
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| OpenAITTSModel::default().as_str().to_string()),
            voice: config
                .voice
                .as_deref()
                .map(OpenAIVoice::from_alias)
                .unwrap_or_default(),
            output_dir: output_dir.into(),
        })
    }

    /// Model name sent upstream, verbatim from the stored config.
    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn voice(&self) -> OpenAIVoice {
        self.voice
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    fn build_http_request(&self, text: &str) -> reqwest::RequestBuilder {
        let body = json!({
            "model": self.model,
            "input": text,
            "voice": self.voice.as_str(),
            "response_format": "wav",
            "speed": 1.0,
        });

        self.client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
    }
}

#[async_trait]
impl SpeechSynthesizer for OpenAITTS {
    fn provider_name(&self) -> &'static str {
        "openai"
    }

    fn native_audio_format(&self) -> &'static str {
        "wav"
    }

    fn supports_streaming_synthesis(&self) -> bool {
        true
    }

    async fn synthesize_pcm(&self, text: &str) -> TTSResult<WavAudio> {
        if text.trim().is_empty() {
            return Err(TTSError::InvalidConfiguration(
                "Cannot synthesize empty text".to_string(),
            ));
        }

        debug!(
            model = %self.model,
            voice = %self.voice,
            chars = text.chars().count(),
            "Requesting OpenAI speech"
        );

        let response = self
            .build_http_request(text)
            .send()
            .await
            .map_err(|e| TTSError::NetworkError(format!("Request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(status = status.as_u16(), "OpenAI speech request failed: {}", body);
            return Err(TTSError::UpstreamStatus {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| TTSError::NetworkError(format!("Failed to read response: {e}")))?;

        let wav = audio::parse_wav(&bytes)
            .map_err(|e| TTSError::AudioGenerationFailed(e.to_string()))?;
        if wav.bits_per_sample != audio::DEVICE_BIT_DEPTH {
            return Err(TTSError::AudioGenerationFailed(format!(
                "Expected 16-bit PCM, got {} bits",
                wav.bits_per_sample
            )));
        }
        Ok(wav)
    }

    async fn text_to_speech(&self, text: &str) -> TTSResult<PathBuf> {
        let wav = self.synthesize_pcm(text).await?;

        tokio::fs::create_dir_all(&self.output_dir).await?;
        let path = self.output_dir.join(format!("{}.wav", Uuid::new_v4()));
        let file = audio::pcm_to_wav(&wav.pcm, wav.sample_rate, wav.channels, wav.bits_per_sample)
            .map_err(|e| TTSError::AudioGenerationFailed(e.to_string()))?;
        tokio::fs::write(&path, file).await?;

        info!(
            path = %path.display(),
            bytes = wav.pcm.len(),
            sample_rate = wav.sample_rate,
            "Speech synthesized"
        );
        Ok(path)
    }
}
