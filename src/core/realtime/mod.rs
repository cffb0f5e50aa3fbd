//! Realtime speech-to-speech provider module.
//!
//! Providers are described by a [`ProviderAdapter`] and driven over a shared
//! WebSocket [`Transport`]. The voice session owns the connection, so adding a
//! provider means writing an adapter and registering it in
//! [`create_provider_adapter`].
//!
//! # Supported Providers
//!
//! - **OpenAI Realtime API** - server-side VAD, 24kHz PCM16 both ways
//! - **Gemini Live API** - client-side VAD, 16kHz in and 24kHz out
//!
//! # Example
//!
//! ```rust,ignore
//! use realtime_voice::core::realtime::{create_provider_adapter, ProviderConfig, RealtimeProvider};
//!
//! let provider = RealtimeProvider::parse("gemini").unwrap();
//! let adapter = create_provider_adapter(provider, &ProviderConfig::default())?;
//! let request = adapter.connect_request(&api_key)?;
//! ```

mod base;
pub mod gemini;
pub mod openai;
mod transport;

pub use base::{
    AudioChunk, BoxedProviderAdapter, ProviderAdapter, ProviderConfig, ProviderEvent,
    RealtimeError, RealtimeResult, ServerVadSettings, TranscriptRole, TurnDetectionMode,
};
pub use gemini::{GEMINI_LIVE_URL, GeminiLiveAdapter, GeminiVoice};
pub use openai::{
    OPENAI_REALTIME_SAMPLE_RATE, OPENAI_REALTIME_URL, OpenAIRealtimeAdapter, OpenAIRealtimeModel,
    OpenAIRealtimeVoice,
};
pub use transport::{Transport, TransportEvent, ensure_crypto_provider};

/// Supported realtime providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RealtimeProvider {
    /// OpenAI Realtime API
    #[default]
    OpenAI,
    /// Google Gemini Live API
    Gemini,
}

impl RealtimeProvider {
    /// Parse provider from string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Some(RealtimeProvider::OpenAI),
            "gemini" | "google" => Some(RealtimeProvider::Gemini),
            _ => None,
        }
    }

    /// Voices the provider accepts, in the spelling its API expects.
    pub fn known_voices(&self) -> Vec<&'static str> {
        match self {
            RealtimeProvider::OpenAI => OpenAIRealtimeVoice::all()
                .iter()
                .map(OpenAIRealtimeVoice::as_str)
                .collect(),
            RealtimeProvider::Gemini => GeminiVoice::all().iter().map(GeminiVoice::as_str).collect(),
        }
    }
}

impl std::fmt::Display for RealtimeProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RealtimeProvider::OpenAI => write!(f, "openai"),
            RealtimeProvider::Gemini => write!(f, "gemini"),
        }
    }
}

/// Factory function to create a provider adapter.
pub fn create_provider_adapter(
    provider: RealtimeProvider,
    config: &ProviderConfig,
) -> RealtimeResult<BoxedProviderAdapter> {
    match provider {
        RealtimeProvider::OpenAI => Ok(Box::new(OpenAIRealtimeAdapter::new(config)?)),
        RealtimeProvider::Gemini => Ok(Box::new(GeminiLiveAdapter::new(config)?)),
    }
}

/// Create a provider adapter from its name.
pub fn create_provider_adapter_by_name(
    provider: &str,
    config: &ProviderConfig,
) -> RealtimeResult<BoxedProviderAdapter> {
    let provider = RealtimeProvider::parse(provider).ok_or_else(|| {
        RealtimeError::InvalidConfiguration(format!(
            "Unsupported realtime provider: {provider}. Supported providers: {}",
            get_supported_realtime_providers().join(", ")
        ))
    })?;
    create_provider_adapter(provider, config)
}

/// Get list of supported realtime providers.
pub fn get_supported_realtime_providers() -> Vec<&'static str> {
    vec!["openai", "gemini"]
}
