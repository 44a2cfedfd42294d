//! Device WebSocket route configuration

use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use crate::handlers::device::device_ws_handler;
use crate::state::AppState;
use std::sync::Arc;

/// Create the device WebSocket router
///
/// `GET /ws/{device_id}` upgrades to the device protocol described in
/// [`crate::handlers::device`].
pub fn create_ws_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/ws/{device_id}", get(device_ws_handler))
        .layer(TraceLayer::new_for_http())
}
