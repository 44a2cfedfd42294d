//! Device WebSocket handler
//!
//! Each socket is one chat session. The session is registered in the
//! directory for as long as the socket lives; the realtime bridge is opened
//! and closed on request within it.

use std::sync::Arc;

use axum::{
    extract::{
        Path, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::{IntoResponse, Response},
};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::channel::WsDeviceChannel;
use super::messages::{DeviceIncomingMessage, DeviceMessageRoute, DeviceOutgoingMessage};
use crate::core::realtime::StartOutcome;
use crate::core::session::ChatSession;
use crate::errors::app_error::AppError;
use crate::state::AppState;

/// Channel buffer between the session and the socket writer
const CHANNEL_BUFFER_SIZE: usize = 1024;

/// Maximum WebSocket frame size (1 MB)
const MAX_WS_FRAME_SIZE: usize = 1024 * 1024;

/// Maximum WebSocket message size (1 MB)
const MAX_WS_MESSAGE_SIZE: usize = 1024 * 1024;

/// Device WebSocket handler
///
/// Unknown devices are refused before the upgrade.
pub async fn device_ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Path(device_id): Path<String>,
) -> Response {
    if state.directory.device(&device_id).is_none() {
        warn!(device_id, "WebSocket upgrade refused for unknown device");
        return AppError::NotFound(format!("Unknown device: {device_id}")).into_response();
    }

    info!(device_id, "Device WebSocket upgrade requested");

    ws.max_frame_size(MAX_WS_FRAME_SIZE)
        .max_message_size(MAX_WS_MESSAGE_SIZE)
        .on_upgrade(move |socket| handle_device_socket(socket, state, device_id))
}

struct DeviceSession {
    session_id: String,
    device_id: String,
    tx: mpsc::Sender<DeviceMessageRoute>,
}

impl DeviceSession {
    async fn send(&self, message: DeviceOutgoingMessage) {
        let _ = self.tx.send(DeviceMessageRoute::Outgoing(message)).await;
    }

    async fn send_status(&self, realtime_active: bool) {
        self.send(DeviceOutgoingMessage::Session {
            session_id: self.session_id.clone(),
            device_id: self.device_id.clone(),
            realtime_active,
        })
        .await;
    }
}

async fn handle_device_socket(socket: WebSocket, state: Arc<AppState>, device_id: String) {
    let session_id = Uuid::new_v4().to_string();
    info!(session_id, device_id, "Device WebSocket connection established");

    let (mut sender, mut receiver) = socket.split();
    let (message_tx, mut message_rx) = mpsc::channel::<DeviceMessageRoute>(CHANNEL_BUFFER_SIZE);

    let sender_task = tokio::spawn(async move {
        while let Some(route) = message_rx.recv().await {
            let should_close = matches!(route, DeviceMessageRoute::Close);

            let result = match route {
                DeviceMessageRoute::Outgoing(message) => match serde_json::to_string(&message) {
                    Ok(json_str) => sender.send(Message::Text(json_str.into())).await,
                    Err(e) => {
                        error!("Failed to serialize outgoing message: {}", e);
                        continue;
                    }
                },
                DeviceMessageRoute::Audio(data) => sender.send(Message::Binary(data)).await,
                DeviceMessageRoute::Close => sender.send(Message::Close(None)).await,
            };

            if let Err(e) = result {
                debug!("Failed to send WebSocket message: {}", e);
                break;
            }

            if should_close {
                break;
            }
        }
    });

    state.directory.open_session(ChatSession {
        session_id: session_id.clone(),
        device_id: device_id.clone(),
        channel: Arc::new(WsDeviceChannel::new(message_tx.clone())),
    });

    let session = DeviceSession {
        session_id,
        device_id,
        tx: message_tx,
    };
    session.send_status(false).await;

    while let Some(msg_result) = receiver.next().await {
        match msg_result {
            Ok(msg) => {
                if !process_device_message(msg, &session, &state).await {
                    break;
                }
            }
            Err(e) => {
                warn!(session_id = %session.session_id, "Device WebSocket error: {}", e);
                break;
            }
        }
    }

    // Cleanup
    state.registry.cleanup(&session.session_id).await;
    state.directory.close_session(&session.session_id);
    let _ = session.tx.send(DeviceMessageRoute::Close).await;
    drop(session.tx);
    if tokio::time::timeout(std::time::Duration::from_secs(1), sender_task)
        .await
        .is_err()
    {
        debug!("Device socket writer did not finish in time");
    }

    info!(session_id = %session.session_id, "Device WebSocket connection terminated");
}

/// Handles one frame; false ends the connection.
async fn process_device_message(msg: Message, session: &DeviceSession, state: &AppState) -> bool {
    let session_id = session.session_id.as_str();
    match msg {
        Message::Text(text) => {
            let incoming: DeviceIncomingMessage = match serde_json::from_str(&text) {
                Ok(msg) => msg,
                Err(e) => {
                    warn!(session_id, "Failed to parse device message: {}", e);
                    session
                        .send(DeviceOutgoingMessage::error(
                            "parse_error",
                            format!("Invalid message format: {e}"),
                        ))
                        .await;
                    return true;
                }
            };

            if let Err(e) = incoming.validate_size() {
                session
                    .send(DeviceOutgoingMessage::error("validation_error", e))
                    .await;
                return true;
            }

            handle_incoming(incoming, session, state).await;
            true
        }
        Message::Binary(data) => {
            if state.registry.has_active(session_id) {
                state.registry.send_audio(session_id, &data).await;
            } else {
                debug!(session_id, bytes = data.len(), "No realtime session, dropping audio");
            }
            true
        }
        Message::Ping(_) | Message::Pong(_) => true,
        Message::Close(_) => {
            info!(session_id, "Device WebSocket close received");
            false
        }
    }
}

async fn handle_incoming(msg: DeviceIncomingMessage, session: &DeviceSession, state: &AppState) {
    let session_id = session.session_id.as_str();
    match msg {
        DeviceIncomingMessage::Start => match state.registry.try_start(session_id).await {
            Ok(outcome) => {
                if outcome == StartOutcome::AlreadyActive {
                    debug!(session_id, "Realtime session already active");
                }
                session.send_status(true).await;
            }
            Err(e) => {
                warn!(session_id, "Failed to start realtime session: {}", e);
                session
                    .send(DeviceOutgoingMessage::error("start_failed", e.to_string()))
                    .await;
            }
        },
        DeviceIncomingMessage::Stop => {
            state.registry.stop(session_id).await;
            session.send_status(false).await;
        }
        DeviceIncomingMessage::Text { text } => {
            if state.registry.has_active(session_id) {
                state.registry.send_text(session_id, &text).await;
            } else {
                session
                    .send(DeviceOutgoingMessage::error(
                        "not_started",
                        "Realtime session is not active",
                    ))
                    .await;
            }
        }
    }
}
