//! Device-facing WebSocket
//!
//! # Protocol
//!
//! ## Device → Server
//!
//! - **start**: Open the realtime conversation
//! - **stop**: Close the realtime conversation
//! - **text**: Typed user turn
//! - **Binary frames**: Audio data (PCM 16-bit, 16kHz, mono)
//!
//! ## Server → Device
//!
//! - **session**: Session id and whether the realtime conversation is active
//! - **text_delta**: Incremental assistant text
//! - **transcript**: Transcript of the user's speech
//! - **response_done**: Assistant finished its turn
//! - **error**: Error message
//! - **Binary frames**: Response audio in 60 ms frames

mod channel;
mod handler;
pub mod messages;

pub use channel::WsDeviceChannel;
pub use handler::device_ws_handler;
