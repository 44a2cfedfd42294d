//! Upstream event handling for one realtime session.
//!
//! [`ProtocolMachine`] turns each parsed [`ServerEvent`] into the actions the
//! connection's I/O task performs, in order: client events to write upstream
//! and deliveries to the device. It holds no I/O so every rule can be checked
//! without a socket.

use base64::prelude::*;
use bytes::Bytes;
use tracing::{debug, info, warn};

use super::messages::{ClientEvent, ServerEvent};
use crate::core::audio;

/// One step the I/O task performs after an upstream event.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Write a client event upstream.
    Send(ClientEvent),
    /// Frame-sized PCM chunk for the device.
    DeliverAudio(Bytes),
    DeliverText(String),
    DeliverResponseComplete,
    DeliverTranscript(String),
}

/// Maps server events to actions for a single session.
#[derive(Debug, Clone)]
pub struct ProtocolMachine {
    session_id: String,
    frame_size: usize,
}

impl ProtocolMachine {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            frame_size: audio::FRAME_BYTES,
        }
    }

    /// Overrides the device frame size used to split audio deltas.
    pub fn with_frame_size(mut self, frame_size: usize) -> Self {
        self.frame_size = frame_size;
        self
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Events sent once, right after the connection opens.
    pub fn on_open(&self, session: &super::messages::SessionConfig) -> Vec<Action> {
        vec![Action::Send(ClientEvent::SessionUpdate {
            session: session.clone(),
        })]
    }

    pub fn on_event(&self, event: ServerEvent) -> Vec<Action> {
        match event {
            ServerEvent::AudioDelta { delta } => match BASE64_STANDARD.decode(delta.as_bytes()) {
                Ok(pcm) => audio::chunk(&Bytes::from(pcm), self.frame_size)
                    .into_iter()
                    .map(Action::DeliverAudio)
                    .collect(),
                Err(e) => {
                    warn!(session_id = %self.session_id, "Dropping undecodable audio delta: {}", e);
                    Vec::new()
                }
            },
            // Whitespace-only deltas are part of the text; only empty ones are dropped.
            ServerEvent::TextDelta { delta } if delta.is_empty() => Vec::new(),
            ServerEvent::TextDelta { delta } => vec![Action::DeliverText(delta)],
            ServerEvent::ResponseDone => {
                debug!(session_id = %self.session_id, "Response complete");
                vec![Action::DeliverResponseComplete]
            }
            ServerEvent::SpeechStarted { audio_start_ms } => {
                debug!(session_id = %self.session_id, ?audio_start_ms, "Speech started");
                Vec::new()
            }
            ServerEvent::SpeechStopped { audio_end_ms } => {
                debug!(session_id = %self.session_id, ?audio_end_ms, "Speech stopped, requesting response");
                vec![
                    Action::Send(ClientEvent::InputAudioBufferCommit),
                    Action::Send(ClientEvent::ResponseCreate),
                ]
            }
            ServerEvent::TranscriptionCompleted { transcript } => {
                if transcript.trim().is_empty() {
                    Vec::new()
                } else {
                    info!(session_id = %self.session_id, "User said: {}", transcript);
                    vec![Action::DeliverTranscript(transcript)]
                }
            }
            ServerEvent::Error { .. } => {
                warn!(
                    session_id = %self.session_id,
                    "Upstream error: {}",
                    event.error_message().unwrap_or("unknown error")
                );
                Vec::new()
            }
            ServerEvent::Unknown => Vec::new(),
        }
    }

    /// Actions for a user text message.
    pub fn on_user_text(&self, text: &str) -> Vec<Action> {
        vec![
            Action::Send(ClientEvent::ConversationItemCreate {
                item: super::messages::ConversationItem::user_text(text),
            }),
            Action::Send(ClientEvent::ResponseCreate),
        ]
    }
}
