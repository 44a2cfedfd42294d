//! Session settings sent upstream when a realtime connection opens.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// OpenAI Realtime API WebSocket endpoint.
pub const OPENAI_REALTIME_URL: &str = "wss://api.openai.com/v1/realtime";

/// Model used when the provider configuration does not name one.
pub const DEFAULT_REALTIME_MODEL: &str = "gpt-4o-realtime-preview-2024-10-01";

/// Instructions used when none are configured.
pub const DEFAULT_INSTRUCTIONS: &str = "你是一个友好的AI助手，请用中文与用户对话。";

/// Handshake deadline for the upstream WebSocket.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// How long `close` waits for the I/O task before aborting it.
pub const DEFAULT_CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Tunables for every realtime session the bridge opens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RealtimeSettings {
    /// Endpoint used when the provider configuration has no `base_url`.
    pub url: String,
    pub default_model: String,
    pub instructions: String,
    pub voice: String,
    pub audio_format: String,
    pub transcription_model: String,
    pub temperature: f32,
    pub max_response_output_tokens: u32,
    pub connect_timeout_secs: u64,
    pub close_timeout_ms: u64,
}

impl Default for RealtimeSettings {
    fn default() -> Self {
        Self {
            url: OPENAI_REALTIME_URL.to_string(),
            default_model: DEFAULT_REALTIME_MODEL.to_string(),
            instructions: DEFAULT_INSTRUCTIONS.to_string(),
            voice: "alloy".to_string(),
            audio_format: "pcm16".to_string(),
            transcription_model: "whisper-1".to_string(),
            temperature: 0.8,
            max_response_output_tokens: 4096,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT.as_secs(),
            close_timeout_ms: DEFAULT_CLOSE_TIMEOUT.as_millis() as u64,
        }
    }
}

impl RealtimeSettings {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn close_timeout(&self) -> Duration {
        Duration::from_millis(self.close_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = RealtimeSettings::default();
        assert_eq!(settings.url, "wss://api.openai.com/v1/realtime");
        assert_eq!(settings.default_model, "gpt-4o-realtime-preview-2024-10-01");
        assert_eq!(settings.voice, "alloy");
        assert_eq!(settings.instructions, "你是一个友好的AI助手，请用中文与用户对话。");
        assert_eq!(settings.max_response_output_tokens, 4096);
        assert_eq!(settings.connect_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let settings: RealtimeSettings =
            serde_yaml::from_str("voice: nova\ntemperature: 0.6\n").unwrap();
        assert_eq!(settings.voice, "nova");
        assert!((settings.temperature - 0.6).abs() < f32::EPSILON);
        assert_eq!(settings.transcription_model, "whisper-1");
    }
}
