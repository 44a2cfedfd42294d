use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;
use tracing::debug;

use super::messages::{DeviceMessageRoute, DeviceOutgoingMessage};
use crate::core::session::DeviceChannel;

/// [`DeviceChannel`] feeding the writer task of one device socket.
pub struct WsDeviceChannel {
    tx: mpsc::Sender<DeviceMessageRoute>,
}

impl WsDeviceChannel {
    pub fn new(tx: mpsc::Sender<DeviceMessageRoute>) -> Self {
        Self { tx }
    }

    async fn route(&self, session_id: &str, route: DeviceMessageRoute) {
        if self.tx.send(route).await.is_err() {
            debug!(session_id, "Device socket gone, dropping delivery");
        }
    }
}

#[async_trait]
impl DeviceChannel for WsDeviceChannel {
    async fn deliver_audio_chunk(&self, session_id: &str, chunk: Bytes) {
        self.route(session_id, DeviceMessageRoute::Audio(chunk)).await;
    }

    async fn deliver_text_delta(&self, session_id: &str, delta: &str) {
        let message = DeviceOutgoingMessage::TextDelta {
            text: delta.to_string(),
        };
        self.route(session_id, DeviceMessageRoute::Outgoing(message))
            .await;
    }

    async fn deliver_response_complete(&self, session_id: &str) {
        self.route(
            session_id,
            DeviceMessageRoute::Outgoing(DeviceOutgoingMessage::ResponseDone),
        )
        .await;
    }

    async fn deliver_transcript(&self, session_id: &str, transcript: &str) {
        let message = DeviceOutgoingMessage::Transcript {
            text: transcript.to_string(),
        };
        self.route(session_id, DeviceMessageRoute::Outgoing(message))
            .await;
    }
}
