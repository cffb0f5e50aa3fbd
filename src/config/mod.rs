//! Configuration for the voice client
//!
//! Settings come from environment variables and an optional YAML file.
//! Priority: YAML > ENV vars > .env values > defaults. The `.env` file is
//! loaded by the binary before any of this runs.
//!
//! # Environment variables
//! - `VOICE_PROVIDER`: `openai` (default) or `gemini`
//! - `OPENAI_API_KEY`, `GEMINI_API_KEY` (falls back to `GOOGLE_API_KEY`)
//! - `VOICE_MODEL`, `VOICE_NAME`, `VOICE_INSTRUCTIONS`, `VOICE_ENDPOINT`
//! - `VOICE_SILENCE_DEBOUNCE_MS`, `VOICE_THINKING_DELAY_MS`
//! - `VOICE_VAD_THRESHOLD`, `VOICE_FRAME_SIZE`
//!
//! # Example
//! ```rust,no_run
//! use realtime_voice::config::VoiceConfig;
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = VoiceConfig::from_file(Path::new("voice.yaml"))?;
//! println!("Using provider {}", config.provider);
//! # Ok(())
//! # }
//! ```

use std::env;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

mod yaml;

pub use yaml::{CredentialsYaml, ProviderYaml, SessionYaml, TurnDetectionYaml, YamlConfig};

use crate::core::audio::{DEFAULT_FRAME_SIZE, DEFAULT_SPEECH_THRESHOLD, InputProcessing};
use crate::core::realtime::{ProviderConfig, RealtimeProvider, ServerVadSettings};
use crate::core::session::{DEFAULT_SILENCE_DEBOUNCE, DEFAULT_THINKING_DELAY, SessionConfig};
use crate::errors::{VoiceError, VoiceResult};

/// Longest accepted silence debounce or thinking delay.
const MAX_DELAY_MS: u64 = 60_000;

/// Voice client configuration
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    pub provider: RealtimeProvider,

    // Provider settings; unset values use the provider's defaults
    pub model: Option<String>,
    pub voice: Option<String>,
    pub instructions: Option<String>,
    pub endpoint: Option<String>,
    pub transcription_model: Option<String>,
    pub turn_detection: ServerVadSettings,

    // Session settings
    pub silence_debounce_ms: u64,
    pub thinking_delay_ms: u64,
    pub vad_threshold: f32,
    pub frame_size: usize,
    pub processing: InputProcessing,

    // Provider API keys
    pub openai_api_key: Option<String>,
    pub gemini_api_key: Option<String>,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            provider: RealtimeProvider::default(),
            model: None,
            voice: None,
            instructions: None,
            endpoint: None,
            transcription_model: None,
            turn_detection: ServerVadSettings::default(),
            silence_debounce_ms: DEFAULT_SILENCE_DEBOUNCE.as_millis() as u64,
            thinking_delay_ms: DEFAULT_THINKING_DELAY.as_millis() as u64,
            vad_threshold: DEFAULT_SPEECH_THRESHOLD,
            frame_size: DEFAULT_FRAME_SIZE,
            processing: InputProcessing::default(),
            openai_api_key: None,
            gemini_api_key: None,
        }
    }
}

/// Zeroize API keys when the configuration is dropped.
impl Drop for VoiceConfig {
    fn drop(&mut self) {
        use zeroize::Zeroize;

        if let Some(ref mut key) = self.openai_api_key {
            key.zeroize();
        }
        if let Some(ref mut key) = self.gemini_api_key {
            key.zeroize();
        }
    }
}

impl VoiceConfig {
    /// Load configuration from environment variables and defaults.
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        let config = Self::merge(None)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file on top of the environment.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed, an environment
    /// variable has an invalid format, or validation fails.
    pub fn from_file(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let yaml_config = YamlConfig::from_file(path)?;
        let config = Self::merge(Some(yaml_config))?;
        config.validate()?;
        Ok(config)
    }

    fn merge(yaml: Option<YamlConfig>) -> Result<Self, Box<dyn std::error::Error>> {
        let mut config = Self::default();

        // Environment variables
        if let Some(name) = env_string("VOICE_PROVIDER") {
            config.provider = parse_provider(&name)?;
        }
        config.model = env_string("VOICE_MODEL");
        config.voice = env_string("VOICE_NAME");
        config.instructions = env_string("VOICE_INSTRUCTIONS");
        config.endpoint = env_string("VOICE_ENDPOINT");
        if let Some(ms) = env_parse("VOICE_SILENCE_DEBOUNCE_MS")? {
            config.silence_debounce_ms = ms;
        }
        if let Some(ms) = env_parse("VOICE_THINKING_DELAY_MS")? {
            config.thinking_delay_ms = ms;
        }
        if let Some(threshold) = env_parse("VOICE_VAD_THRESHOLD")? {
            config.vad_threshold = threshold;
        }
        if let Some(frame_size) = env_parse("VOICE_FRAME_SIZE")? {
            config.frame_size = frame_size;
        }
        config.openai_api_key = env_string("OPENAI_API_KEY");
        config.gemini_api_key = env_string("GEMINI_API_KEY").or_else(|| env_string("GOOGLE_API_KEY"));

        let Some(yaml) = yaml else {
            return Ok(config);
        };

        // YAML overrides
        if let Some(provider) = yaml.provider {
            if let Some(name) = provider.name {
                config.provider = parse_provider(&name)?;
            }
            config.model = provider.model.or(config.model.take());
            config.voice = provider.voice.or(config.voice.take());
            config.instructions = provider.instructions.or(config.instructions.take());
            config.endpoint = provider.endpoint.or(config.endpoint.take());
            config.transcription_model = provider.transcription_model;
        }

        if let Some(session) = yaml.session {
            if let Some(ms) = session.silence_debounce_ms {
                config.silence_debounce_ms = ms;
            }
            if let Some(ms) = session.thinking_delay_ms {
                config.thinking_delay_ms = ms;
            }
            if let Some(threshold) = session.vad_threshold {
                config.vad_threshold = threshold;
            }
            if let Some(frame_size) = session.frame_size {
                config.frame_size = frame_size;
            }
            if let Some(enabled) = session.echo_cancellation {
                config.processing.echo_cancellation = enabled;
            }
            if let Some(enabled) = session.noise_suppression {
                config.processing.noise_suppression = enabled;
            }
            if let Some(enabled) = session.auto_gain_control {
                config.processing.auto_gain_control = enabled;
            }
        }

        if let Some(turn_detection) = yaml.turn_detection {
            let vad = &mut config.turn_detection;
            if let Some(threshold) = turn_detection.threshold {
                vad.threshold = threshold;
            }
            if let Some(ms) = turn_detection.prefix_padding_ms {
                vad.prefix_padding_ms = ms;
            }
            if let Some(ms) = turn_detection.silence_duration_ms {
                vad.silence_duration_ms = ms;
            }
            if let Some(create_response) = turn_detection.create_response {
                vad.create_response = create_response;
            }
        }

        if let Some(credentials) = yaml.credentials {
            if credentials.openai_api_key.is_some() {
                config.openai_api_key = credentials.openai_api_key.clone();
            }
            if credentials.gemini_api_key.is_some() {
                config.gemini_api_key = credentials.gemini_api_key.clone();
            }
        }

        Ok(config)
    }

    /// Check ranges that would make the session misbehave.
    pub fn validate(&self) -> VoiceResult<()> {
        if !(self.vad_threshold > 0.0 && self.vad_threshold <= 1.0) {
            return Err(VoiceError::InvalidConfiguration(format!(
                "vad_threshold must be in (0, 1], got {}",
                self.vad_threshold
            )));
        }
        let vad = self.turn_detection.threshold;
        if !(vad > 0.0 && vad <= 1.0) {
            return Err(VoiceError::InvalidConfiguration(format!(
                "turn_detection.threshold must be in (0, 1], got {vad}"
            )));
        }
        if self.frame_size == 0 {
            return Err(VoiceError::InvalidConfiguration(
                "frame_size must be greater than zero".to_string(),
            ));
        }
        for (name, value) in [
            ("silence_debounce_ms", self.silence_debounce_ms),
            ("thinking_delay_ms", self.thinking_delay_ms),
        ] {
            if value > MAX_DELAY_MS {
                return Err(VoiceError::InvalidConfiguration(format!(
                    "{name} must be at most {MAX_DELAY_MS}, got {value}"
                )));
            }
        }
        Ok(())
    }

    /// API key of the configured provider.
    pub fn api_key(&self) -> VoiceResult<&str> {
        let key = match self.provider {
            RealtimeProvider::OpenAI => self.openai_api_key.as_deref(),
            RealtimeProvider::Gemini => self.gemini_api_key.as_deref(),
        };
        key.filter(|key| !key.is_empty())
            .ok_or_else(|| VoiceError::MissingCredential(self.provider.to_string()))
    }

    pub fn provider_config(&self) -> ProviderConfig {
        ProviderConfig {
            model: self.model.clone(),
            voice: self.voice.clone(),
            instructions: self.instructions.clone(),
            endpoint: self.endpoint.clone(),
            transcription_model: self.transcription_model.clone(),
            turn_detection: self.turn_detection,
        }
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            silence_debounce: Duration::from_millis(self.silence_debounce_ms),
            thinking_delay: Duration::from_millis(self.thinking_delay_ms),
            speech_threshold: self.vad_threshold,
            frame_size: self.frame_size,
            processing: self.processing,
        }
    }
}

fn env_string(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn env_parse<T: FromStr>(name: &str) -> Result<Option<T>, String>
where
    T::Err: std::fmt::Display,
{
    env_string(name)
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|e| format!("Invalid {name} value {value:?}: {e}"))
        })
        .transpose()
}

fn parse_provider(name: &str) -> Result<RealtimeProvider, String> {
    RealtimeProvider::parse(name).ok_or_else(|| {
        format!(
            "Unknown provider {name:?}, expected one of: {}",
            crate::core::realtime::get_supported_realtime_providers().join(", ")
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;
    use tempfile::TempDir;

    // Helper to clean up environment variables
    fn cleanup_env_vars() {
        unsafe {
            env::remove_var("VOICE_PROVIDER");
            env::remove_var("VOICE_MODEL");
            env::remove_var("VOICE_NAME");
            env::remove_var("VOICE_INSTRUCTIONS");
            env::remove_var("VOICE_ENDPOINT");
            env::remove_var("VOICE_SILENCE_DEBOUNCE_MS");
            env::remove_var("VOICE_THINKING_DELAY_MS");
            env::remove_var("VOICE_VAD_THRESHOLD");
            env::remove_var("VOICE_FRAME_SIZE");
            env::remove_var("OPENAI_API_KEY");
            env::remove_var("GEMINI_API_KEY");
            env::remove_var("GOOGLE_API_KEY");
        }
    }

    #[test]
    #[serial]
    fn test_from_env_defaults() {
        cleanup_env_vars();

        let config = VoiceConfig::from_env().unwrap();

        assert_eq!(config.provider, RealtimeProvider::OpenAI);
        assert_eq!(config.silence_debounce_ms, 1700);
        assert_eq!(config.thinking_delay_ms, 1700);
        assert_eq!(config.vad_threshold, 0.01);
        assert_eq!(config.frame_size, 4096);
        assert_eq!(config.turn_detection, ServerVadSettings::default());
        assert!(config.openai_api_key.is_none());
        assert!(matches!(
            config.api_key(),
            Err(VoiceError::MissingCredential(_))
        ));
    }

    #[test]
    #[serial]
    fn test_from_env_values() {
        cleanup_env_vars();
        unsafe {
            env::set_var("VOICE_PROVIDER", "Gemini");
            env::set_var("VOICE_NAME", "Kore");
            env::set_var("VOICE_THINKING_DELAY_MS", "500");
            env::set_var("VOICE_FRAME_SIZE", "2048");
            env::set_var("GOOGLE_API_KEY", "google-key");
        }

        let config = VoiceConfig::from_env().unwrap();

        assert_eq!(config.provider, RealtimeProvider::Gemini);
        assert_eq!(config.voice.as_deref(), Some("Kore"));
        assert_eq!(config.thinking_delay_ms, 500);
        assert_eq!(config.frame_size, 2048);
        assert_eq!(config.api_key().unwrap(), "google-key");

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_env_invalid_number() {
        cleanup_env_vars();
        unsafe {
            env::set_var("VOICE_SILENCE_DEBOUNCE_MS", "soon");
        }

        let err = VoiceConfig::from_env().unwrap_err();
        assert!(err.to_string().contains("VOICE_SILENCE_DEBOUNCE_MS"));

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_env_unknown_provider() {
        cleanup_env_vars();
        unsafe {
            env::set_var("VOICE_PROVIDER", "hume");
        }

        let err = VoiceConfig::from_env().unwrap_err();
        assert!(err.to_string().contains("Unknown provider"));

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_file_yaml_overrides_env() {
        cleanup_env_vars();
        unsafe {
            env::set_var("VOICE_PROVIDER", "openai");
            env::set_var("VOICE_NAME", "alloy");
            env::set_var("VOICE_MODEL", "gpt-realtime");
            env::set_var("OPENAI_API_KEY", "env-key");
        }

        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("voice.yaml");
        let yaml_content = r#"
provider:
  voice: "verse"
session:
  silence_debounce_ms: 900
  auto_gain_control: false
turn_detection:
  silence_duration_ms: 700
credentials:
  openai_api_key: "yaml-key"
"#;
        fs::write(&config_path, yaml_content).unwrap();

        let config = VoiceConfig::from_file(&config_path).unwrap();

        assert_eq!(config.voice.as_deref(), Some("verse"));
        // Not in the file, so the environment value stays
        assert_eq!(config.model.as_deref(), Some("gpt-realtime"));
        assert_eq!(config.silence_debounce_ms, 900);
        assert!(!config.processing.auto_gain_control);
        assert!(config.processing.echo_cancellation);
        assert_eq!(config.turn_detection.silence_duration_ms, 700);
        assert_eq!(config.turn_detection.prefix_padding_ms, 300);
        assert_eq!(config.api_key().unwrap(), "yaml-key");

        let session = config.session_config();
        assert_eq!(session.silence_debounce, Duration::from_millis(900));
        assert_eq!(session.thinking_delay, Duration::from_millis(1700));

        let provider = config.provider_config();
        assert_eq!(provider.voice.as_deref(), Some("verse"));
        assert_eq!(provider.turn_detection.silence_duration_ms, 700);

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_file_validation_error() {
        cleanup_env_vars();

        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("voice.yaml");
        fs::write(&config_path, "session:\n  vad_threshold: 1.5\n").unwrap();

        let err = VoiceConfig::from_file(&config_path).unwrap_err();
        assert!(err.to_string().contains("vad_threshold"));
    }

    #[test]
    fn test_validate_ranges() {
        let mut config = VoiceConfig::default();
        assert!(config.validate().is_ok());

        config.vad_threshold = 0.0;
        assert!(config.validate().is_err());
        config.vad_threshold = 1.0;
        assert!(config.validate().is_ok());

        config.turn_detection.threshold = 0.0;
        assert!(config.validate().is_err());
        config.turn_detection.threshold = 0.5;

        config.frame_size = 0;
        assert!(config.validate().is_err());
        config.frame_size = 1024;

        config.thinking_delay_ms = 60_001;
        assert!(matches!(
            config.validate(),
            Err(VoiceError::InvalidConfiguration(msg)) if msg.contains("thinking_delay_ms")
        ));
    }

    #[test]
    fn test_api_key_per_provider() {
        let mut config = VoiceConfig::default();
        config.openai_api_key = Some("sk".to_string());
        config.gemini_api_key = Some(String::new());

        assert_eq!(config.api_key().unwrap(), "sk");

        config.provider = RealtimeProvider::Gemini;
        assert!(matches!(
            config.api_key(),
            Err(VoiceError::MissingCredential(name)) if name == "gemini"
        ));
    }
}
