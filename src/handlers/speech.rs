//! Batch speech endpoints
//!
//! Provider configuration is looked up for the owner of the requesting
//! device, one backend instance per request.

use std::sync::Arc;

use axum::{
    Json,
    body::Bytes,
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use crate::core::provider_config::{self, ConfigKind, ProviderConfig};
use crate::core::session::Device;
use crate::core::stt::create_stt_provider;
use crate::core::tts::create_tts_provider;
use crate::errors::app_error::{AppError, AppResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SynthesizeRequest {
    pub device_id: String,
    pub text: String,
    /// Voice name or alias; the stored provider voice applies when absent
    #[serde(default)]
    pub voice: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RecognizeParams {
    pub device_id: String,
}

async fn provider_for(
    state: &AppState,
    device_id: &str,
    kind: ConfigKind,
) -> AppResult<(Device, ProviderConfig)> {
    let device = state
        .directory
        .device(device_id)
        .ok_or_else(|| AppError::NotFound(format!("Unknown device: {device_id}")))?;

    let config = provider_config::resolve_kind(state.config_store.as_ref(), &device.user_id, kind)
        .await
        .ok_or_else(|| {
            AppError::ProviderNotConfigured(format!(
                "No {kind} configuration for user {}",
                device.user_id
            ))
        })?;

    Ok((device, config))
}

/// Synthesizes text and returns the WAV body. The file written by the
/// provider is removed once read.
pub async fn synthesize_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SynthesizeRequest>,
) -> AppResult<Response> {
    if request.text.trim().is_empty() {
        return Err(AppError::BadRequest("Text cannot be empty".to_string()));
    }

    let (device, mut config) = provider_for(&state, &request.device_id, ConfigKind::Tts).await?;
    if let Some(voice) = request.voice.filter(|v| !v.trim().is_empty()) {
        config.voice = Some(voice);
    }

    let tts = create_tts_provider(&config, state.config.tts_output_dir.clone())?;
    let path = tts.text_to_speech(&request.text).await?;
    let audio = tokio::fs::read(&path)
        .await
        .map_err(|e| AppError::Internal(format!("Failed to read {}: {e}", path.display())))?;
    // The file only backs this response.
    if let Err(e) = tokio::fs::remove_file(&path).await {
        warn!(path = %path.display(), "Failed to remove synthesized file: {}", e);
    }

    info!(
        device_id = %device.device_id,
        provider = tts.provider_name(),
        bytes = audio.len(),
        "Synthesis request served"
    );

    Ok(([(header::CONTENT_TYPE, "audio/wav")], audio).into_response())
}

/// Transcribes a WAV or raw PCM16 body. Recognition failures yield `""`.
pub async fn recognize_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RecognizeParams>,
    body: Bytes,
) -> AppResult<Json<serde_json::Value>> {
    if body.is_empty() {
        return Err(AppError::BadRequest("Audio body cannot be empty".to_string()));
    }

    let (device, config) = provider_for(&state, &params.device_id, ConfigKind::Stt).await?;
    let stt = create_stt_provider(&config, &state.config.stt_language, state.config.stt_window())?;
    let text = stt.recognize(&body).await;

    info!(
        device_id = %device.device_id,
        provider = stt.provider_name(),
        chars = text.chars().count(),
        "Recognition request served"
    );

    Ok(Json(json!({ "text": text })))
}
