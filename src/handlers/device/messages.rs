//! Device WebSocket message types

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Maximum allowed size for text messages (50 KB)
pub const MAX_TEXT_SIZE: usize = 50 * 1024;

/// Incoming WebSocket messages from the device
#[derive(Debug, Deserialize, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DeviceIncomingMessage {
    /// Open the realtime conversation for this session
    Start,
    /// Close the realtime conversation, keeping the socket
    Stop,
    /// Typed user turn
    Text { text: String },
}

impl DeviceIncomingMessage {
    pub fn validate_size(&self) -> Result<(), String> {
        match self {
            Self::Text { text } if text.len() > MAX_TEXT_SIZE => Err(format!(
                "Text too large: {} bytes (max {} bytes)",
                text.len(),
                MAX_TEXT_SIZE
            )),
            _ => Ok(()),
        }
    }
}

/// Outgoing WebSocket messages to the device
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DeviceOutgoingMessage {
    /// Session status, sent on connect and after every start/stop
    Session {
        session_id: String,
        device_id: String,
        realtime_active: bool,
    },
    TextDelta { text: String },
    /// Transcript of what the user said
    Transcript { text: String },
    ResponseDone,
    Error {
        #[serde(skip_serializing_if = "Option::is_none")]
        code: Option<String>,
        message: String,
    },
}

impl DeviceOutgoingMessage {
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        Self::Error {
            code: Some(code.to_string()),
            message: message.into(),
        }
    }
}

/// Frames queued for the socket writer task
#[derive(Debug)]
pub enum DeviceMessageRoute {
    Outgoing(DeviceOutgoingMessage),
    Audio(Bytes),
    Close,
}
