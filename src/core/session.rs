//! Chat sessions, devices, and the channel audio is delivered back through.
//!
//! The dialogue system owns sessions and the device table; the bridge only
//! holds a session id and looks the session up again for every delivery, so
//! a session that disappears mid-response simply stops receiving output.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Registered end-user device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub device_id: String,
    pub user_id: String,
    /// Assistant role bound to the device. Sessions need one to start.
    #[serde(default)]
    pub role_id: Option<String>,
}

/// Outbound path to the device behind a session.
#[async_trait]
pub trait DeviceChannel: Send + Sync {
    async fn deliver_audio_chunk(&self, session_id: &str, chunk: Bytes);
    async fn deliver_text_delta(&self, session_id: &str, delta: &str);
    async fn deliver_response_complete(&self, session_id: &str);
    async fn deliver_transcript(&self, session_id: &str, transcript: &str);
}

/// Live dialogue session for one connected device.
#[derive(Clone)]
pub struct ChatSession {
    pub session_id: String,
    pub device_id: String,
    pub channel: Arc<dyn DeviceChannel>,
}

impl std::fmt::Debug for ChatSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatSession")
            .field("session_id", &self.session_id)
            .field("device_id", &self.device_id)
            .finish_non_exhaustive()
    }
}

/// Session and device lookup provided by the dialogue system.
pub trait SessionDirectory: Send + Sync {
    fn get_session(&self, session_id: &str) -> Option<ChatSession>;
    fn get_device(&self, session_id: &str) -> Option<Device>;
}

/// In-process directory used by the device WebSocket server.
#[derive(Default)]
pub struct InMemorySessionDirectory {
    sessions: DashMap<String, ChatSession>,
    devices: RwLock<HashMap<String, Device>>,
}

impl InMemorySessionDirectory {
    pub fn new(devices: impl IntoIterator<Item = Device>) -> Self {
        let devices = devices
            .into_iter()
            .map(|d| (d.device_id.clone(), d))
            .collect();
        Self {
            sessions: DashMap::new(),
            devices: RwLock::new(devices),
        }
    }

    pub fn register_device(&self, device: Device) {
        self.devices.write().insert(device.device_id.clone(), device);
    }

    pub fn device(&self, device_id: &str) -> Option<Device> {
        self.devices.read().get(device_id).cloned()
    }

    pub fn open_session(&self, session: ChatSession) {
        self.sessions.insert(session.session_id.clone(), session);
    }

    pub fn close_session(&self, session_id: &str) -> Option<ChatSession> {
        self.sessions.remove(session_id).map(|(_, session)| session)
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}

impl SessionDirectory for InMemorySessionDirectory {
    fn get_session(&self, session_id: &str) -> Option<ChatSession> {
        self.sessions.get(session_id).map(|s| s.value().clone())
    }

    fn get_device(&self, session_id: &str) -> Option<Device> {
        let device_id = self.sessions.get(session_id)?.device_id.clone();
        self.device(&device_id)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use tokio::sync::mpsc;

    /// What a recording channel observed, in delivery order.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Delivery {
        Audio(Bytes),
        TextDelta(String),
        ResponseComplete,
        Transcript(String),
    }

    /// Device channel forwarding every delivery to an mpsc receiver.
    pub struct RecordingChannel {
        tx: mpsc::UnboundedSender<Delivery>,
    }

    impl RecordingChannel {
        pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<Delivery>) {
            let (tx, rx) = mpsc::unbounded_channel();
            (Arc::new(Self { tx }), rx)
        }
    }

    #[async_trait]
    impl DeviceChannel for RecordingChannel {
        async fn deliver_audio_chunk(&self, _session_id: &str, chunk: Bytes) {
            let _ = self.tx.send(Delivery::Audio(chunk));
        }

        async fn deliver_text_delta(&self, _session_id: &str, delta: &str) {
            let _ = self.tx.send(Delivery::TextDelta(delta.to_string()));
        }

        async fn deliver_response_complete(&self, _session_id: &str) {
            let _ = self.tx.send(Delivery::ResponseComplete);
        }

        async fn deliver_transcript(&self, _session_id: &str, transcript: &str) {
            let _ = self.tx.send(Delivery::Transcript(transcript.to_string()));
        }
    }
}
