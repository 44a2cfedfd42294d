//! HTTP and WebSocket request handlers
//!
//! - `api` - Health check endpoint
//! - `device` - Device WebSocket bridging to the realtime session
//! - `speech` - Batch synthesis and recognition

pub mod api;
pub mod device;
pub mod speech;

pub use device::device_ws_handler;
