//! Speech recognition abstraction.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::warn;

use super::batcher::WindowedBatcher;

/// Errors raised by recognition backends.
///
/// Callers of [`SpeechRecognizer::recognize`] never see these; they are
/// logged and turned into an empty transcript.
#[derive(Debug, Error)]
pub enum STTError {
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Provider error: {0}")]
    ProviderError(String),

    #[error("Invalid audio format: {0}")]
    InvalidAudioFormat(String),

    #[error("Audio processing error: {0}")]
    AudioProcessingError(String),
}

impl From<std::io::Error> for STTError {
    fn from(e: std::io::Error) -> Self {
        STTError::AudioProcessingError(e.to_string())
    }
}

pub type STTResult<T> = Result<T, STTError>;

/// Window used to batch streamed audio when no other value is configured.
pub const DEFAULT_STREAM_WINDOW: Duration = Duration::from_secs(3);

/// Speech-to-text backend.
#[async_trait]
pub trait SpeechRecognizer: Send + Sync {
    fn provider_name(&self) -> &'static str;

    /// True when the backend accepts audio incrementally. Batch backends
    /// return false and get windowed emulation from [`recognize_stream`](Self::recognize_stream).
    fn supports_streaming_recognition(&self) -> bool;

    /// Batching window for [`recognize_stream`](Self::recognize_stream).
    fn stream_window(&self) -> Duration {
        DEFAULT_STREAM_WINDOW
    }

    /// One request against the backend. WAV or raw 16 kHz mono PCM16 input.
    async fn transcribe(&self, audio: &[u8]) -> STTResult<String>;

    /// Like [`transcribe`](Self::transcribe) but any failure yields `""`.
    async fn recognize(&self, audio: &[u8]) -> String {
        match self.transcribe(audio).await {
            Ok(text) => text,
            Err(e) => {
                warn!(provider = self.provider_name(), "Recognition failed: {}", e);
                String::new()
            }
        }
    }

    /// Recognizes each window of the stream and joins the non-empty results.
    async fn recognize_stream(&self, audio: mpsc::Receiver<Bytes>) -> String {
        let mut batcher = WindowedBatcher::new(audio, self.stream_window());
        let mut parts: Vec<String> = Vec::new();
        while let Some(window) = batcher.next_window().await {
            let text = self.recognize(&window).await;
            let text = text.trim();
            if !text.is_empty() {
                parts.push(text.to_string());
            }
        }
        parts.join(" ").trim().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    /// Returns scripted results and records the audio it was given.
    struct Scripted {
        results: Mutex<Vec<STTResult<String>>>,
        seen: Mutex<Vec<usize>>,
    }

    #[async_trait]
    impl SpeechRecognizer for Scripted {
        fn provider_name(&self) -> &'static str {
            "scripted"
        }

        fn supports_streaming_recognition(&self) -> bool {
            false
        }

        fn stream_window(&self) -> Duration {
            Duration::from_millis(50)
        }

        async fn transcribe(&self, audio: &[u8]) -> STTResult<String> {
            self.seen.lock().push(audio.len());
            let mut results = self.results.lock();
            if results.is_empty() {
                Ok(String::new())
            } else {
                results.remove(0)
            }
        }
    }

    fn scripted(results: Vec<STTResult<String>>) -> Scripted {
        Scripted {
            results: Mutex::new(results),
            seen: Mutex::new(Vec::new()),
        }
    }

    #[tokio::test]
    async fn test_recognize_swallows_errors() {
        let stt = scripted(vec![Err(STTError::ProviderError("500".to_string()))]);
        assert_eq!(stt.recognize(&[0u8; 32]).await, "");
    }

    #[tokio::test]
    async fn test_stream_joins_windows() {
        let stt = scripted(vec![
            Ok(" hello ".to_string()),
            Err(STTError::NetworkError("reset".to_string())),
            Ok("world".to_string()),
        ]);
        let (tx, rx) = mpsc::channel(8);

        let producer = tokio::spawn(async move {
            tx.send(Bytes::from_static(&[1; 10])).await.unwrap();
            tokio::time::sleep(Duration::from_millis(120)).await;
            tx.send(Bytes::from_static(&[2; 20])).await.unwrap();
            tokio::time::sleep(Duration::from_millis(120)).await;
            tx.send(Bytes::from_static(&[3; 30])).await.unwrap();
        });

        let text = stt.recognize_stream(rx).await;
        producer.await.unwrap();

        assert_eq!(text, "hello world");
        assert_eq!(*stt.seen.lock(), vec![10, 20, 30]);
    }

    #[tokio::test]
    async fn test_empty_stream_makes_no_requests() {
        let stt = scripted(Vec::new());
        let (tx, rx) = mpsc::channel::<Bytes>(1);
        drop(tx);

        assert_eq!(stt.recognize_stream(rx).await, "");
        assert!(stt.seen.lock().is_empty());
    }
}
