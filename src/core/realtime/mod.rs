//! Realtime session bridge.
//!
//! Each chat session that starts a realtime conversation gets one upstream
//! WebSocket to the OpenAI Realtime API. Device audio is appended to the
//! upstream input buffer as it arrives; server-side VAD decides when a turn
//! ends, at which point the bridge commits the buffer and requests a
//! response. Response audio is split into device-sized frames and delivered
//! back through the session's [`DeviceChannel`](crate::core::session::DeviceChannel).
//!
//! # Components
//!
//! - [`SessionRegistry`] - at most one connection per session id
//! - [`RealtimeConnection`] - lifecycle and the socket-owning I/O task
//! - [`ProtocolMachine`] - pure mapping from server events to actions
//!
//! # Example
//!
//! ```rust,ignore
//! let registry = SessionRegistry::new(directory, config_store, RealtimeSettings::default());
//! if registry.start(&session_id).await {
//!     registry.send_audio(&session_id, &pcm).await;
//! }
//! registry.stop(&session_id).await;
//! ```

mod base;
pub mod config;
pub mod connection;
pub mod machine;
pub mod messages;
pub mod registry;

pub use base::{ConnectionState, RealtimeError, RealtimeResult, StateCell};
pub use config::{DEFAULT_REALTIME_MODEL, OPENAI_REALTIME_URL, RealtimeSettings};
pub use connection::{CLOSE_REASON, RealtimeConnection, endpoint_url};
pub use machine::{Action, ProtocolMachine};
pub use messages::{ClientEvent, ServerEvent, SessionConfig};
pub use registry::{SessionRegistry, StartOutcome};
