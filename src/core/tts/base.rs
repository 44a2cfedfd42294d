//! Speech synthesis abstraction.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::core::audio::{self, WavAudio};

/// Errors raised by synthesis backends.
#[derive(Debug, Error)]
pub enum TTSError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    /// Non-2xx response from the provider.
    #[error("Provider returned HTTP {status}: {body}")]
    UpstreamStatus { status: u16, body: String },

    #[error("Audio generation failed: {0}")]
    AudioGenerationFailed(String),

    #[error("Failed to write audio file: {0}")]
    Io(#[from] std::io::Error),
}

pub type TTSResult<T> = Result<T, TTSError>;

/// Delay between chunks when emulating a live stream.
pub const STREAM_CHUNK_INTERVAL: Duration = Duration::from_millis(audio::FRAME_DURATION_MS);

/// How an emulated stream ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamOutcome {
    pub chunks_delivered: usize,
    pub cancelled: bool,
}

/// Text-to-speech backend.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    fn provider_name(&self) -> &'static str;

    /// Container the provider is asked to return.
    fn native_audio_format(&self) -> &'static str;

    fn supports_streaming_synthesis(&self) -> bool;

    /// One blocking synthesis call, returned as PCM with its format.
    async fn synthesize_pcm(&self, text: &str) -> TTSResult<WavAudio>;

    /// Synthesizes `text` and writes a WAV file, returning its path.
    async fn text_to_speech(&self, text: &str) -> TTSResult<PathBuf>;

    /// Emulates streaming: one synthesis call, then frame-sized chunks handed
    /// to `on_chunk` at playback cadence until done or `cancel` fires.
    async fn stream_synthesize(
        &self,
        text: &str,
        on_chunk: &mut (dyn FnMut(Bytes) + Send),
        cancel: &CancellationToken,
    ) -> TTSResult<StreamOutcome> {
        let audio = self.synthesize_pcm(text).await?;
        let chunks = audio::chunk(&audio.pcm, audio::FRAME_BYTES);
        Ok(pace_chunks(chunks, STREAM_CHUNK_INTERVAL, on_chunk, cancel).await)
    }
}

/// Delivers the first chunk at once and each following one after `interval`.
pub async fn pace_chunks(
    chunks: Vec<Bytes>,
    interval: Duration,
    on_chunk: &mut (dyn FnMut(Bytes) + Send),
    cancel: &CancellationToken,
) -> StreamOutcome {
    let mut delivered = 0;
    for (index, chunk) in chunks.into_iter().enumerate() {
        if index > 0 {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!(delivered, "Synthesis stream cancelled");
                    return StreamOutcome { chunks_delivered: delivered, cancelled: true };
                }
                _ = tokio::time::sleep(interval) => {}
            }
        } else if cancel.is_cancelled() {
            return StreamOutcome {
                chunks_delivered: 0,
                cancelled: true,
            };
        }
        on_chunk(chunk);
        delivered += 1;
    }
    StreamOutcome {
        chunks_delivered: delivered,
        cancelled: false,
    }
}
