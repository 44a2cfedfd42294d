//! OpenAI Realtime API WebSocket message types.
//!
//! Client events (sent upstream):
//! - session.update
//! - input_audio_buffer.append
//! - input_audio_buffer.commit
//! - conversation.item.create
//! - response.create
//!
//! Server events the bridge acts on:
//! - response.audio.delta
//! - response.text.delta
//! - response.done
//! - input_audio_buffer.speech_started / speech_stopped
//! - conversation.item.input_audio_transcription.completed
//! - error
//!
//! Any other server event deserializes to [`ServerEvent::Unknown`].

use base64::prelude::*;
use serde::{Deserialize, Serialize};

use super::config::RealtimeSettings;

// =============================================================================
// Session Configuration
// =============================================================================

/// Session configuration carried by `session.update`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub modalities: Vec<String>,
    pub instructions: String,
    pub voice: String,
    pub input_audio_format: String,
    pub output_audio_format: String,
    pub input_audio_transcription: InputAudioTranscription,
    pub turn_detection: TurnDetection,
    pub temperature: f32,
    pub max_response_output_tokens: u32,
}

impl SessionConfig {
    pub fn from_settings(settings: &RealtimeSettings) -> Self {
        Self {
            modalities: vec!["text".to_string(), "audio".to_string()],
            instructions: settings.instructions.clone(),
            voice: settings.voice.clone(),
            input_audio_format: settings.audio_format.clone(),
            output_audio_format: settings.audio_format.clone(),
            input_audio_transcription: InputAudioTranscription {
                model: settings.transcription_model.clone(),
            },
            turn_detection: TurnDetection::ServerVad,
            temperature: settings.temperature,
            max_response_output_tokens: settings.max_response_output_tokens,
        }
    }
}

/// Input audio transcription configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputAudioTranscription {
    /// Transcription model (e.g., "whisper-1")
    pub model: String,
}

/// Turn detection mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TurnDetection {
    /// Server-side VAD
    #[serde(rename = "server_vad")]
    ServerVad,
}

// =============================================================================
// Conversation Items
// =============================================================================

/// Conversation item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationItem {
    #[serde(rename = "type")]
    pub item_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub content: Vec<ContentPart>,
}

impl ConversationItem {
    /// User message carrying plain text.
    pub fn user_text(text: &str) -> Self {
        Self {
            item_type: "message".to_string(),
            role: Some("user".to_string()),
            content: vec![ContentPart {
                content_type: "input_text".to_string(),
                text: Some(text.to_string()),
            }],
        }
    }
}

/// Content part within a conversation item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentPart {
    #[serde(rename = "type")]
    pub content_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

// =============================================================================
// Client Events (sent to server)
// =============================================================================

/// Client events sent to the OpenAI Realtime API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    #[serde(rename = "session.update")]
    SessionUpdate { session: SessionConfig },

    /// Base64-encoded PCM16 audio
    #[serde(rename = "input_audio_buffer.append")]
    InputAudioBufferAppend { audio: String },

    #[serde(rename = "input_audio_buffer.commit")]
    InputAudioBufferCommit,

    #[serde(rename = "conversation.item.create")]
    ConversationItemCreate { item: ConversationItem },

    #[serde(rename = "response.create")]
    ResponseCreate,
}

impl ClientEvent {
    /// Create an audio append event from raw bytes.
    pub fn audio_append(data: &[u8]) -> Self {
        ClientEvent::InputAudioBufferAppend {
            audio: BASE64_STANDARD.encode(data),
        }
    }

    /// Wire name of the event.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::SessionUpdate { .. } => "session.update",
            Self::InputAudioBufferAppend { .. } => "input_audio_buffer.append",
            Self::InputAudioBufferCommit => "input_audio_buffer.commit",
            Self::ConversationItemCreate { .. } => "conversation.item.create",
            Self::ResponseCreate => "response.create",
        }
    }
}

// =============================================================================
// Server Events (received from server)
// =============================================================================

/// Error payload nested under `error`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ApiError {
    #[serde(default, rename = "type")]
    pub error_type: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Server events received from the OpenAI Realtime API.
///
/// Fields the bridge does not read are left out; extra JSON keys are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    #[serde(rename = "error")]
    Error {
        #[serde(default)]
        error: Option<ApiError>,
        /// Some gateways put the message at the top level.
        #[serde(default)]
        message: Option<String>,
    },

    #[serde(rename = "input_audio_buffer.speech_started")]
    SpeechStarted {
        #[serde(default)]
        audio_start_ms: Option<u64>,
    },

    #[serde(rename = "input_audio_buffer.speech_stopped")]
    SpeechStopped {
        #[serde(default)]
        audio_end_ms: Option<u64>,
    },

    #[serde(rename = "conversation.item.input_audio_transcription.completed")]
    TranscriptionCompleted {
        #[serde(default)]
        transcript: String,
    },

    /// Base64-encoded PCM16 audio
    #[serde(rename = "response.audio.delta")]
    AudioDelta { delta: String },

    #[serde(rename = "response.text.delta")]
    TextDelta { delta: String },

    #[serde(rename = "response.done")]
    ResponseDone,

    #[serde(other)]
    Unknown,
}

impl ServerEvent {
    /// Error text from either the nested or the top-level field.
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Error { error, message } => error
                .as_ref()
                .and_then(|e| e.message.as_deref())
                .or(message.as_deref()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_session_update_shape() {
        let event = ClientEvent::SessionUpdate {
            session: SessionConfig::from_settings(&RealtimeSettings::default()),
        };
        let value = serde_json::to_value(&event).unwrap();

        assert_eq!(value["type"], "session.update");
        assert_eq!(value["session"]["modalities"], json!(["text", "audio"]));
        assert_eq!(value["session"]["voice"], "alloy");
        assert_eq!(value["session"]["input_audio_format"], "pcm16");
        assert_eq!(value["session"]["output_audio_format"], "pcm16");
        assert_eq!(
            value["session"]["input_audio_transcription"]["model"],
            "whisper-1"
        );
        assert_eq!(value["session"]["turn_detection"]["type"], "server_vad");
        assert_eq!(value["session"]["max_response_output_tokens"], 4096);
    }

    #[test]
    fn test_audio_append_encodes_base64() {
        let event = ClientEvent::audio_append(&[0x01, 0x02, 0x03]);
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value, json!({"type": "input_audio_buffer.append", "audio": "AQID"}));
    }

    #[test]
    fn test_unit_events_serialize_type_only() {
        assert_eq!(
            serde_json::to_value(ClientEvent::InputAudioBufferCommit).unwrap(),
            json!({"type": "input_audio_buffer.commit"})
        );
        assert_eq!(
            serde_json::to_value(ClientEvent::ResponseCreate).unwrap(),
            json!({"type": "response.create"})
        );
    }

    #[test]
    fn test_text_item_shape() {
        let event = ClientEvent::ConversationItemCreate {
            item: ConversationItem::user_text("hello"),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["item"]["type"], "message");
        assert_eq!(value["item"]["role"], "user");
        assert_eq!(value["item"]["content"][0]["type"], "input_text");
        assert_eq!(value["item"]["content"][0]["text"], "hello");
    }

    #[test]
    fn test_server_events_parse_with_extra_fields() {
        let event: ServerEvent = serde_json::from_str(
            r#"{"type":"response.audio.delta","event_id":"e1","response_id":"r1","item_id":"i1","output_index":0,"content_index":0,"delta":"AAA="}"#,
        )
        .unwrap();
        assert_eq!(event, ServerEvent::AudioDelta { delta: "AAA=".to_string() });

        let event: ServerEvent = serde_json::from_str(
            r#"{"type":"response.done","response":{"id":"r1","status":"completed"}}"#,
        )
        .unwrap();
        assert_eq!(event, ServerEvent::ResponseDone);

        let event: ServerEvent = serde_json::from_str(
            r#"{"type":"input_audio_buffer.speech_stopped","audio_end_ms":1200,"item_id":"i2"}"#,
        )
        .unwrap();
        assert_eq!(event, ServerEvent::SpeechStopped { audio_end_ms: Some(1200) });
    }

    #[test]
    fn test_unknown_event_type() {
        let event: ServerEvent =
            serde_json::from_str(r#"{"type":"rate_limits.updated","rate_limits":[]}"#).unwrap();
        assert_eq!(event, ServerEvent::Unknown);
    }

    #[test]
    fn test_error_message_locations() {
        let nested: ServerEvent = serde_json::from_str(
            r#"{"type":"error","error":{"type":"invalid_request_error","message":"bad audio"}}"#,
        )
        .unwrap();
        assert_eq!(nested.error_message(), Some("bad audio"));

        let flat: ServerEvent =
            serde_json::from_str(r#"{"type":"error","message":"flat message"}"#).unwrap();
        assert_eq!(flat.error_message(), Some("flat message"));
    }

    #[test]
    fn test_missing_required_field_is_rejected() {
        assert!(serde_json::from_str::<ServerEvent>(r#"{"type":"response.text.delta"}"#).is_err());
        assert!(serde_json::from_str::<ServerEvent>(r#"{"delta":"x"}"#).is_err());
    }
}
