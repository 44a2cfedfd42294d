//! OpenAI transcription provider.
//!
//! REST batch API: each request carries one complete WAV file. Streamed
//! input is handled by the windowed batching in
//! [`SpeechRecognizer::recognize_stream`](crate::core::stt::SpeechRecognizer::recognize_stream).

mod client;
mod config;

pub use client::{DEFAULT_STT_LANGUAGE, OPENAI_STT_URL, OpenAISTT};
pub use config::OpenAISTTModel;
