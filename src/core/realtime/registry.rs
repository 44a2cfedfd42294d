//! Session id to live connection map, the entry point used by the dialogue
//! system.
//!
//! Start reserves the map slot atomically and performs the handshake outside
//! the shard lock; a failed handshake removes only its own reservation. The
//! map is never held across an `.await`.

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::{debug, info, warn};

use super::base::{ConnectionState, RealtimeError, RealtimeResult};
use super::config::RealtimeSettings;
use super::connection::RealtimeConnection;
use crate::core::provider_config::{self, ConfigStore};
use crate::core::session::SessionDirectory;

/// Result of a successful [`SessionRegistry::try_start`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// A new upstream connection was opened.
    Started,
    /// The session already had an open connection; nothing changed.
    AlreadyActive,
}

/// Holds at most one [`RealtimeConnection`] per session id.
pub struct SessionRegistry {
    connections: DashMap<String, Arc<RealtimeConnection>>,
    directory: Arc<dyn SessionDirectory>,
    config_store: Arc<dyn ConfigStore>,
    settings: RealtimeSettings,
}

impl SessionRegistry {
    pub fn new(
        directory: Arc<dyn SessionDirectory>,
        config_store: Arc<dyn ConfigStore>,
        settings: RealtimeSettings,
    ) -> Self {
        Self {
            connections: DashMap::new(),
            directory,
            config_store,
            settings,
        }
    }

    pub fn settings(&self) -> &RealtimeSettings {
        &self.settings
    }

    /// Opens the realtime bridge for a session, reporting success as a bool.
    pub async fn start(&self, session_id: &str) -> bool {
        match self.try_start(session_id).await {
            Ok(_) => true,
            Err(e) => {
                warn!(session_id, "Failed to start realtime session: {}", e);
                false
            }
        }
    }

    /// Opens the realtime bridge for a session.
    ///
    /// An `Open` occupant makes this a no-op; an occupant still connecting is
    /// an error; a `Closed` occupant is replaced.
    pub async fn try_start(&self, session_id: &str) -> RealtimeResult<StartOutcome> {
        let session = self
            .directory
            .get_session(session_id)
            .ok_or_else(|| RealtimeError::SessionError(format!("Unknown session {session_id}")))?;
        let device = self.directory.get_device(session_id).ok_or_else(|| {
            RealtimeError::SessionError(format!("No device bound to session {session_id}"))
        })?;
        if device.role_id.is_none() {
            return Err(RealtimeError::SessionError(format!(
                "Device {} has no role assigned",
                device.device_id
            )));
        }

        let config = provider_config::resolve(self.config_store.as_ref(), &device)
            .await
            .ok_or_else(|| RealtimeError::ConfigNotFound(device.user_id.clone()))?;

        let connection = Arc::new(RealtimeConnection::new(
            session_id,
            self.settings.close_timeout(),
        ));

        let stale = match self.connections.entry(session_id.to_string()) {
            Entry::Occupied(mut occupied) => match occupied.get().state() {
                ConnectionState::Open => {
                    debug!(session_id, "Realtime session already active");
                    return Ok(StartOutcome::AlreadyActive);
                }
                ConnectionState::Idle | ConnectionState::Connecting => {
                    return Err(RealtimeError::SessionError(format!(
                        "Session {session_id} is already connecting"
                    )));
                }
                ConnectionState::Closing | ConnectionState::Closed => {
                    Some(occupied.insert(connection.clone()))
                }
            },
            Entry::Vacant(vacant) => {
                vacant.insert(connection.clone());
                None
            }
        };

        if let Some(stale) = stale {
            debug!(session_id, "Replacing closed realtime connection");
            stale.close().await;
        }

        match connection
            .open(&config, &self.settings, self.directory.clone())
            .await
        {
            Ok(()) => {
                info!(
                    session_id,
                    device_id = %session.device_id,
                    "Realtime session started"
                );
                Ok(StartOutcome::Started)
            }
            Err(e) => {
                self.connections
                    .remove_if(session_id, |_, current| Arc::ptr_eq(current, &connection));
                Err(e)
            }
        }
    }

    /// Removes and closes the session's connection. No-op when absent.
    pub async fn stop(&self, session_id: &str) {
        if let Some((_, connection)) = self.connections.remove(session_id) {
            connection.close().await;
            info!(session_id, "Realtime session stopped");
        }
    }

    /// Same as [`stop`](Self::stop); called when the device disconnects.
    pub async fn cleanup(&self, session_id: &str) {
        self.stop(session_id).await;
    }

    fn connection(&self, session_id: &str) -> Option<Arc<RealtimeConnection>> {
        self.connections.get(session_id).map(|c| c.value().clone())
    }

    /// Forwards device audio upstream.
    pub async fn send_audio(&self, session_id: &str, pcm: &[u8]) {
        let Some(connection) = self.connection(session_id) else {
            warn!(session_id, "No realtime connection for audio");
            return;
        };
        if let Err(e) = connection.send_audio(pcm).await {
            debug!(session_id, "Audio not forwarded: {}", e);
        }
    }

    /// Forwards a user text message upstream.
    pub async fn send_text(&self, session_id: &str, text: &str) {
        let Some(connection) = self.connection(session_id) else {
            warn!(session_id, "No realtime connection for text");
            return;
        };
        if let Err(e) = connection.send_text(text).await {
            warn!(session_id, "Text not forwarded: {}", e);
        }
    }

    /// True when the session has an entry whose connection is `Open`.
    pub fn has_active(&self, session_id: &str) -> bool {
        self.connections
            .get(session_id)
            .is_some_and(|c| c.is_connected())
    }

    pub fn state(&self, session_id: &str) -> Option<ConnectionState> {
        self.connections.get(session_id).map(|c| c.state())
    }

    pub fn active_count(&self) -> usize {
        self.connections.len()
    }

    /// Closes every connection, used on shutdown.
    pub async fn close_all(&self) {
        let ids: Vec<String> = self.connections.iter().map(|e| e.key().clone()).collect();
        for id in ids {
            self.stop(&id).await;
        }
    }
}
