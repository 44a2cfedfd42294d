use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::handlers::{api, speech};
use crate::state::AppState;
use std::sync::Arc;

/// Create the HTTP API router
pub fn create_api_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(api::health_check))
        .route("/speech/synthesize", post(speech::synthesize_handler))
        .route("/speech/recognize", post(speech::recognize_handler))
        .layer(TraceLayer::new_for_http())
}
