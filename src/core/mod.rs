pub mod audio;
pub mod provider_config;
pub mod realtime;
pub mod session;
pub mod stt;
pub mod tts;

// Re-export commonly used types for convenience
pub use audio::{AudioError, AudioResult, WavAudio};

pub use provider_config::{ConfigKind, ConfigQuery, ConfigStore, InMemoryConfigStore, ProviderConfig};

pub use session::{ChatSession, Device, DeviceChannel, InMemorySessionDirectory, SessionDirectory};

pub use realtime::{
    ConnectionState, RealtimeConnection, RealtimeError, RealtimeResult, RealtimeSettings,
    SessionRegistry, StartOutcome,
};

pub use stt::{STTError, STTResult, SpeechRecognizer, create_stt_provider};

pub use tts::{SpeechSynthesizer, TTSError, TTSResult, create_tts_provider};
