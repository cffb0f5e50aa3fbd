use serde::Deserialize;
use std::path::Path;

/// Complete YAML configuration structure
///
/// Every field is optional so a file can override just a few settings; the
/// rest comes from environment variables and defaults.
///
/// # Example YAML structure
/// ```yaml
/// provider:
///   name: "gemini"
///   model: "models/gemini-2.0-flash-exp"
///   voice: "Kore"
///   instructions: "You are a friendly assistant. Keep answers short."
///   endpoint: "wss://proxy.example.com/live"
///   transcription_model: "whisper-1"
///
/// session:
///   silence_debounce_ms: 1700
///   thinking_delay_ms: 1700
///   vad_threshold: 0.01
///   frame_size: 4096
///   echo_cancellation: true
///   noise_suppression: true
///   auto_gain_control: true
///
/// turn_detection:
///   threshold: 0.5
///   prefix_padding_ms: 300
///   silence_duration_ms: 1500
///   create_response: true
///
/// credentials:
///   openai_api_key: "sk-..."
///   gemini_api_key: "AIza..."
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub provider: Option<ProviderYaml>,
    pub session: Option<SessionYaml>,
    pub turn_detection: Option<TurnDetectionYaml>,
    pub credentials: Option<CredentialsYaml>,
}

/// Provider selection and per-session provider settings
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ProviderYaml {
    /// "openai" or "gemini"
    pub name: Option<String>,
    pub model: Option<String>,
    pub voice: Option<String>,
    pub instructions: Option<String>,
    /// WebSocket endpoint override
    pub endpoint: Option<String>,
    /// Model used to transcribe user audio (OpenAI only)
    pub transcription_model: Option<String>,
}

/// Timings and microphone settings
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SessionYaml {
    pub silence_debounce_ms: Option<u64>,
    pub thinking_delay_ms: Option<u64>,
    /// Mean absolute amplitude above which a captured frame counts as speech
    pub vad_threshold: Option<f32>,
    /// Samples per captured frame
    pub frame_size: Option<usize>,
    pub echo_cancellation: Option<bool>,
    pub noise_suppression: Option<bool>,
    pub auto_gain_control: Option<bool>,
}

/// Server-side VAD parameters (OpenAI only)
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TurnDetectionYaml {
    pub threshold: Option<f32>,
    pub prefix_padding_ms: Option<u32>,
    pub silence_duration_ms: Option<u32>,
    pub create_response: Option<bool>,
}

/// Provider API keys
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct CredentialsYaml {
    pub openai_api_key: Option<String>,
    pub gemini_api_key: Option<String>,
}

impl YamlConfig {
    /// Load YAML configuration from a file
    ///
    /// # Errors
    /// Returns an error if:
    /// - The file cannot be read
    /// - The YAML is malformed
    /// - Fields have invalid types
    pub fn from_file(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file {}: {e}", path.display()))?;

        let config: YamlConfig = serde_yaml::from_str(&contents)
            .map_err(|e| format!("Failed to parse YAML config: {e}"))?;

        Ok(config)
    }
}
