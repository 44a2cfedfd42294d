//! OpenAI TTS provider module.
//!
//! # Supported Models
//!
//! - `tts-1` - Standard quality, lower latency
//! - `tts-1-hd` - High definition quality, higher latency
//! - `gpt-4o-mini-tts` - Latest model with improved quality
//!
//! # Supported Voices
//!
//! alloy, ash, ballad, coral, echo, fable, onyx, nova, sage, shimmer, verse,
//! plus the descriptive aliases accepted by [`map_voice`].

mod config;
mod provider;

pub use config::{OpenAITTSModel, OpenAIVoice, map_voice};
pub use provider::{OPENAI_TTS_URL, OpenAITTS};
