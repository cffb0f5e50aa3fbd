//! OpenAI Realtime API configuration types.
//!
//! - Model selection
//! - Voice selection
//! - Resolved per-session settings used to build the handshake

use serde::{Deserialize, Serialize};

use crate::core::realtime::{ProviderConfig, ServerVadSettings};

/// OpenAI Realtime API WebSocket endpoint.
pub const OPENAI_REALTIME_URL: &str = "wss://api.openai.com/v1/realtime";

/// Audio sample rate for OpenAI Realtime API, both directions.
pub const OPENAI_REALTIME_SAMPLE_RATE: u32 = 24000;

/// Default model used to transcribe user audio.
pub const OPENAI_DEFAULT_TRANSCRIPTION_MODEL: &str = "whisper-1";

// =============================================================================
// Models
// =============================================================================

/// Known OpenAI Realtime models.
///
/// Unknown identifiers are passed through untouched, so new models work
/// without a code change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OpenAIRealtimeModel {
    /// GPT-4o Realtime Preview model
    #[default]
    #[serde(rename = "gpt-4o-realtime-preview")]
    Gpt4oRealtimePreview,
    /// GPT-4o Mini Realtime Preview
    #[serde(rename = "gpt-4o-mini-realtime-preview")]
    Gpt4oMiniRealtimePreview,
    /// GA realtime model
    #[serde(rename = "gpt-realtime")]
    GptRealtime,
}

impl OpenAIRealtimeModel {
    /// Convert to the API parameter value.
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gpt4oRealtimePreview => "gpt-4o-realtime-preview",
            Self::Gpt4oMiniRealtimePreview => "gpt-4o-mini-realtime-preview",
            Self::GptRealtime => "gpt-realtime",
        }
    }
}

impl std::fmt::Display for OpenAIRealtimeModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Voices
// =============================================================================

/// Available voices for OpenAI Realtime API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpenAIRealtimeVoice {
    /// Alloy voice (default)
    #[default]
    Alloy,
    Ash,
    Ballad,
    Coral,
    Echo,
    Sage,
    Shimmer,
    Verse,
}

impl OpenAIRealtimeVoice {
    /// Convert to the API parameter value.
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Alloy => "alloy",
            Self::Ash => "ash",
            Self::Ballad => "ballad",
            Self::Coral => "coral",
            Self::Echo => "echo",
            Self::Sage => "sage",
            Self::Shimmer => "shimmer",
            Self::Verse => "verse",
        }
    }

    /// Parse a known voice (case-insensitive).
    pub fn from_name(s: &str) -> Option<Self> {
        Self::all()
            .iter()
            .copied()
            .find(|voice| voice.as_str().eq_ignore_ascii_case(s.trim()))
    }

    /// Voice identifier to send for a configured name.
    ///
    /// Known voices are normalised to their API spelling; anything else is
    /// passed through untouched, so new voices work without a code change.
    pub fn resolve(configured: Option<&str>) -> String {
        match configured.map(str::trim).filter(|name| !name.is_empty()) {
            Some(name) => Self::from_name(name)
                .map(|voice| voice.to_string())
                .unwrap_or_else(|| name.to_string()),
            None => Self::default().to_string(),
        }
    }

    /// Get all available voices.
    pub fn all() -> &'static [OpenAIRealtimeVoice] {
        &[
            Self::Alloy,
            Self::Ash,
            Self::Ballad,
            Self::Coral,
            Self::Echo,
            Self::Sage,
            Self::Shimmer,
            Self::Verse,
        ]
    }
}

impl std::fmt::Display for OpenAIRealtimeVoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Session Settings
// =============================================================================

/// Settings for one OpenAI realtime session with defaults filled in.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenAIRealtimeConfig {
    pub model: String,
    pub voice: String,
    pub instructions: Option<String>,
    pub endpoint: String,
    pub transcription_model: String,
    pub turn_detection: ServerVadSettings,
}

impl Default for OpenAIRealtimeConfig {
    fn default() -> Self {
        Self::from(&ProviderConfig::default())
    }
}

impl From<&ProviderConfig> for OpenAIRealtimeConfig {
    fn from(config: &ProviderConfig) -> Self {
        Self {
            model: config
                .model
                .clone()
                .unwrap_or_else(|| OpenAIRealtimeModel::default().to_string()),
            voice: OpenAIRealtimeVoice::resolve(config.voice.as_deref()),
            instructions: config.instructions.clone(),
            endpoint: config
                .endpoint
                .clone()
                .unwrap_or_else(|| OPENAI_REALTIME_URL.to_string()),
            transcription_model: config
                .transcription_model
                .clone()
                .unwrap_or_else(|| OPENAI_DEFAULT_TRANSCRIPTION_MODEL.to_string()),
            turn_detection: config.turn_detection,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
