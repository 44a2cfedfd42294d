//! Configuration types for OpenAI TTS API.
//!
//! - Known model names (tts-1, tts-1-hd, gpt-4o-mini-tts)
//! - Voice selection (11 available voices) and alias mapping

use serde::{Deserialize, Serialize};

// =============================================================================
// OpenAI TTS Models
// =============================================================================

/// Known OpenAI TTS models. Configured names outside this list are sent as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OpenAITTSModel {
    /// Standard quality, lower latency
    #[default]
    #[serde(rename = "tts-1")]
    Tts1,
    /// High definition, higher latency
    #[serde(rename = "tts-1-hd")]
    Tts1Hd,
    #[serde(rename = "gpt-4o-mini-tts")]
    Gpt4oMiniTts,
}

impl OpenAITTSModel {
    /// Convert to the API parameter value.
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tts1 => "tts-1",
            Self::Tts1Hd => "tts-1-hd",
            Self::Gpt4oMiniTts => "gpt-4o-mini-tts",
        }
    }
}

impl std::fmt::Display for OpenAITTSModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// OpenAI TTS Voices
// =============================================================================

/// Available voices for OpenAI TTS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpenAIVoice {
    #[default]
    Alloy,
    Ash,
    Ballad,
    Coral,
    Echo,
    Fable,
    Onyx,
    Nova,
    Sage,
    Shimmer,
    Verse,
}

impl OpenAIVoice {
    /// Convert to the API parameter value.
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Alloy => "alloy",
            Self::Ash => "ash",
            Self::Ballad => "ballad",
            Self::Coral => "coral",
            Self::Echo => "echo",
            Self::Fable => "fable",
            Self::Onyx => "onyx",
            Self::Nova => "nova",
            Self::Sage => "sage",
            Self::Shimmer => "shimmer",
            Self::Verse => "verse",
        }
    }

    /// Get all available voices.
    pub fn all() -> &'static [OpenAIVoice] {
        &[
            Self::Alloy,
            Self::Ash,
            Self::Ballad,
            Self::Coral,
            Self::Echo,
            Self::Fable,
            Self::Onyx,
            Self::Nova,
            Self::Sage,
            Self::Shimmer,
            Self::Verse,
        ]
    }

    /// Resolves a configured voice name, accepting descriptive aliases.
    ///
    /// Case-insensitive. Unknown or empty names fall back to `alloy`.
    pub fn from_alias(name: &str) -> Self {
        let normalized = name.trim().to_lowercase();
        if let Some(voice) = Self::all().iter().find(|v| v.as_str() == normalized) {
            return *voice;
        }
        match normalized.as_str() {
            "female" | "woman" | "女性" | "女声" => Self::Nova,
            "male" | "man" | "男性" | "男声" => Self::Onyx,
            "clear" | "清晰" => Self::Echo,
            "warm" | "温暖" => Self::Alloy,
            "lively" | "活泼" => Self::Shimmer,
            "deep" | "深沉" => Self::Fable,
            _ => Self::default(),
        }
    }
}

impl std::fmt::Display for OpenAIVoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Maps a configured voice name to the OpenAI voice sent upstream.
pub fn map_voice(name: &str) -> &'static str {
    OpenAIVoice::from_alias(name).as_str()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_voice_aliases() {
        assert_eq!(map_voice("female"), "nova");
        assert_eq!(map_voice("MALE"), "onyx");
        assert_eq!(map_voice("Clear"), "echo");
        assert_eq!(map_voice("warm"), "alloy");
        assert_eq!(map_voice("lively"), "shimmer");
        assert_eq!(map_voice("deep"), "fable");
        assert_eq!(map_voice("女性"), "nova");
        assert_eq!(map_voice("深沉"), "fable");
    }

    #[test]
    fn test_map_voice_defaults_to_alloy() {
        assert_eq!(map_voice("unknown-xyz"), "alloy");
        assert_eq!(map_voice(""), "alloy");
    }

    #[test]
    fn test_native_voices_pass_through() {
        for voice in OpenAIVoice::all() {
            assert_eq!(map_voice(voice.as_str()), voice.as_str());
            assert_eq!(map_voice(&voice.as_str().to_uppercase()), voice.as_str());
        }
        assert_eq!(OpenAIVoice::all().len(), 11);
    }

    #[test]
    fn test_model_names() {
        assert_eq!(OpenAITTSModel::default().to_string(), "tts-1");
        assert_eq!(OpenAITTSModel::Tts1Hd.as_str(), "tts-1-hd");
        assert_eq!(OpenAITTSModel::Gpt4oMiniTts.as_str(), "gpt-4o-mini-tts");
    }
}
