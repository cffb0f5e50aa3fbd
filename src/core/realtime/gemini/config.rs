//! Gemini Live API configuration types.

use serde::{Deserialize, Serialize};

use crate::core::realtime::ProviderConfig;

/// Gemini Live bidirectional streaming endpoint.
pub const GEMINI_LIVE_URL: &str = "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1alpha.GenerativeService.BidiGenerateContent";

/// Microphone rate the Live API expects.
pub const GEMINI_INPUT_SAMPLE_RATE: u32 = 16000;

/// Rate of synthesized audio returned by the Live API.
pub const GEMINI_OUTPUT_SAMPLE_RATE: u32 = 24000;

/// Default Live model.
pub const GEMINI_DEFAULT_MODEL: &str = "models/gemini-2.0-flash-exp";

/// Prebuilt voices available to the Live API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GeminiVoice {
    #[default]
    Puck,
    Charon,
    Kore,
    Fenrir,
    Aoede,
}

impl GeminiVoice {
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Puck => "Puck",
            Self::Charon => "Charon",
            Self::Kore => "Kore",
            Self::Fenrir => "Fenrir",
            Self::Aoede => "Aoede",
        }
    }

    /// Parse a known voice (case-insensitive).
    pub fn from_name(s: &str) -> Option<Self> {
        Self::all()
            .iter()
            .copied()
            .find(|voice| voice.as_str().eq_ignore_ascii_case(s.trim()))
    }

    /// Voice name to send for a configured name.
    ///
    /// Known voices get their canonical spelling, other names go out as given.
    pub fn resolve(configured: Option<&str>) -> String {
        match configured.map(str::trim).filter(|name| !name.is_empty()) {
            Some(name) => Self::from_name(name)
                .map(|voice| voice.to_string())
                .unwrap_or_else(|| name.to_string()),
            None => Self::default().to_string(),
        }
    }

    pub fn all() -> &'static [GeminiVoice] {
        &[Self::Puck, Self::Charon, Self::Kore, Self::Fenrir, Self::Aoede]
    }
}

impl std::fmt::Display for GeminiVoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Settings for one Gemini Live session with defaults filled in.
#[derive(Debug, Clone, PartialEq)]
pub struct GeminiLiveConfig {
    pub model: String,
    pub voice: String,
    pub instructions: Option<String>,
    pub endpoint: String,
}

impl Default for GeminiLiveConfig {
    fn default() -> Self {
        Self::from(&ProviderConfig::default())
    }
}

impl From<&ProviderConfig> for GeminiLiveConfig {
    fn from(config: &ProviderConfig) -> Self {
        let model = config
            .model
            .clone()
            .unwrap_or_else(|| GEMINI_DEFAULT_MODEL.to_string());
        // The API wants fully qualified resource names
        let model = if model.starts_with("models/") {
            model
        } else {
            format!("models/{model}")
        };

        Self {
            model,
            voice: GeminiVoice::resolve(config.voice.as_deref()),
            instructions: config.instructions.clone(),
            endpoint: config
                .endpoint
                .clone()
                .unwrap_or_else(|| GEMINI_LIVE_URL.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_voice_parsing() {
        assert_eq!(GeminiVoice::from_name("kore"), Some(GeminiVoice::Kore));
        assert_eq!(GeminiVoice::from_name("AOEDE"), Some(GeminiVoice::Aoede));
        assert_eq!(GeminiVoice::from_name("Zephyr"), None);
        assert_eq!(GeminiVoice::all().len(), 5);

        assert_eq!(GeminiVoice::resolve(Some("kore")), "Kore");
        assert_eq!(GeminiVoice::resolve(Some("Zephyr")), "Zephyr");
        assert_eq!(GeminiVoice::resolve(None), "Puck");
    }

    #[test]
    fn test_config_defaults() {
        let config = GeminiLiveConfig::default();
        assert_eq!(config.model, "models/gemini-2.0-flash-exp");
        assert_eq!(config.voice, "Puck");
        assert_eq!(config.endpoint, GEMINI_LIVE_URL);
    }

    #[test]
    fn test_model_name_is_qualified() {
        let config = GeminiLiveConfig::from(&ProviderConfig {
            model: Some("gemini-2.0-flash-live-001".to_string()),
            ..Default::default()
        });
        assert_eq!(config.model, "models/gemini-2.0-flash-live-001");
    }
}
