use std::sync::Arc;

use axum::Router;

use crate::state::AppState;

pub mod api;
pub mod ws;

/// All routes with state applied; CORS and header layers are added by the binary.
pub fn create_router(state: Arc<AppState>) -> Router {
    api::create_api_router()
        .merge(ws::create_ws_router())
        .with_state(state)
}
