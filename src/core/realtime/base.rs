//! Base traits and types for realtime speech-to-speech providers.
//!
//! A provider is described by a [`ProviderAdapter`]: a small, synchronous
//! capability set that knows how to build the connection request, the
//! handshake, outbound audio frames and cancellation messages, and how to map
//! inbound wire messages onto the shared [`ProviderEvent`] vocabulary. The
//! voice session drives the connection and the state machine itself, so the
//! same session code serves every provider.
//!
//! # Audio Format
//!
//! PCM 16-bit signed little-endian, mono, base64 on the wire. Input rate is
//! provider specific (16kHz or 24kHz); output is 24kHz for every provider.

use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur during realtime operations.
#[derive(Debug, Error)]
pub enum RealtimeError {
    /// Connection to the provider failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Authentication failed
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// WebSocket error
    #[error("WebSocket error: {0}")]
    WebSocketError(String),

    /// Provider-specific error
    #[error("Provider error: {0}")]
    ProviderError(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Connection closed by the provider
    #[error("Connection closed: {0}")]
    ConnectionClosed(String),

    /// Not connected
    #[error("Not connected")]
    NotConnected,
}

/// Result type for realtime operations.
pub type RealtimeResult<T> = Result<T, RealtimeError>;

impl From<serde_json::Error> for RealtimeError {
    fn from(e: serde_json::Error) -> Self {
        RealtimeError::SerializationError(e.to_string())
    }
}

// =============================================================================
// Configuration Types
// =============================================================================

/// Server-side turn detection parameters (providers with server VAD only).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerVadSettings {
    /// Activation threshold (0.0 to 1.0)
    pub threshold: f32,
    /// Audio kept from before speech was detected (ms)
    pub prefix_padding_ms: u32,
    /// Trailing silence that ends the user's turn (ms)
    pub silence_duration_ms: u32,
    /// Whether the provider starts a response automatically at turn end
    pub create_response: bool,
}

impl Default for ServerVadSettings {
    fn default() -> Self {
        Self {
            threshold: 0.5,
            prefix_padding_ms: 300,
            silence_duration_ms: 1500,
            create_response: true,
        }
    }
}

/// Per-session provider configuration, fixed before the handshake.
///
/// Unset fields fall back to the provider's defaults.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProviderConfig {
    /// Model identifier
    pub model: Option<String>,
    /// Voice identifier
    pub voice: Option<String>,
    /// System instructions for the assistant
    pub instructions: Option<String>,
    /// WebSocket endpoint override (proxies, tests)
    pub endpoint: Option<String>,
    /// Model used to transcribe user audio, where supported
    pub transcription_model: Option<String>,
    /// Server VAD parameters, where supported
    pub turn_detection: ServerVadSettings,
}

// =============================================================================
// Shared Event Vocabulary
// =============================================================================

/// Role of the speaker in a transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranscriptRole {
    /// User speech transcript
    User,
    /// Assistant speech transcript
    Assistant,
}

impl fmt::Display for TranscriptRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TranscriptRole::User => write!(f, "user"),
            TranscriptRole::Assistant => write!(f, "assistant"),
        }
    }
}

/// Who decides when the user's turn starts and ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnDetectionMode {
    /// The provider runs VAD and sends speech started/stopped events
    Server,
    /// The client computes speech/silence from microphone frame energy
    Client,
}

/// An immutable unit of decoded audio from the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioChunk {
    /// Raw PCM 16-bit little-endian mono samples
    pub data: Bytes,
    /// Sample rate in Hz
    pub sample_rate: u32,
}

impl AudioChunk {
    /// Number of samples in the chunk.
    pub fn samples(&self) -> usize {
        self.data.len() / 2
    }
}

/// Provider wire events mapped onto the effects every session applies.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderEvent {
    /// The provider accepted the handshake
    SetupAcknowledged,
    /// Server VAD detected the start of user speech
    SpeechStarted,
    /// Server VAD detected the end of user speech
    SpeechStopped,
    /// A new AI response began
    ResponseStarted,
    /// A chunk of synthesized speech
    AudioDelta(AudioChunk),
    /// Partial transcript text, appended to the accumulator for `role`
    TranscriptDelta { role: TranscriptRole, text: String },
    /// Complete transcript text, replacing the accumulator for `role`
    TranscriptFinal { role: TranscriptRole, text: String },
    /// The provider interrupted its own output
    Interrupted,
    /// The in-flight response was cancelled
    ResponseCancelled,
    /// The provider finished generating the current turn
    TurnComplete,
    /// The provider announced it will close the connection soon
    GoAway,
    /// Protocol-level error; ends the session
    FatalError(String),
}

// =============================================================================
// Adapter Trait
// =============================================================================

/// Provider-specific protocol knowledge.
///
/// Everything here is pure: adapters never touch the network or the audio
/// devices. The session sends what the adapter builds and feeds it what the
/// transport receives.
pub trait ProviderAdapter: Send + Sync {
    /// Short provider name used in logs.
    fn name(&self) -> &'static str;

    /// Builds the WebSocket upgrade request, including authentication.
    fn connect_request(&self, credential: &str) -> RealtimeResult<http::Request<()>>;

    /// The configuration message sent as the first frame after connecting.
    fn handshake_message(&self) -> RealtimeResult<String>;

    /// Wraps one PCM16 microphone frame in the provider's append message.
    fn encode_audio_frame(&self, pcm: &[u8]) -> RealtimeResult<String>;

    /// Message asking the provider to stop the in-flight response, if the
    /// protocol has one.
    fn cancel_message(&self) -> Option<String>;

    /// Maps one inbound message onto shared events.
    ///
    /// Unknown or malformed messages produce no events.
    fn decode_event(&self, raw: &str) -> Vec<ProviderEvent>;

    /// Microphone sample rate the provider expects.
    fn input_sample_rate(&self) -> u32;

    /// Rate of the synthesized audio.
    fn output_sample_rate(&self) -> u32 {
        24000
    }

    fn turn_detection(&self) -> TurnDetectionMode;

    /// Whether AI audio arriving while the user is still speaking is held back
    /// until the thinking delay ends instead of being played.
    fn buffers_during_user_speech(&self) -> bool;
}

/// Boxed adapter, as returned by the provider factory.
pub type BoxedProviderAdapter = Box<dyn ProviderAdapter>;

impl<T: ProviderAdapter + ?Sized> ProviderAdapter for Box<T> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn connect_request(&self, credential: &str) -> RealtimeResult<http::Request<()>> {
        (**self).connect_request(credential)
    }

    fn handshake_message(&self) -> RealtimeResult<String> {
        (**self).handshake_message()
    }

    fn encode_audio_frame(&self, pcm: &[u8]) -> RealtimeResult<String> {
        (**self).encode_audio_frame(pcm)
    }

    fn cancel_message(&self) -> Option<String> {
        (**self).cancel_message()
    }

    fn decode_event(&self, raw: &str) -> Vec<ProviderEvent> {
        (**self).decode_event(raw)
    }

    fn input_sample_rate(&self) -> u32 {
        (**self).input_sample_rate()
    }

    fn output_sample_rate(&self) -> u32 {
        (**self).output_sample_rate()
    }

    fn turn_detection(&self) -> TurnDetectionMode {
        (**self).turn_detection()
    }

    fn buffers_during_user_speech(&self) -> bool {
        (**self).buffers_during_user_speech()
    }
}

/// Parses the `rate=` parameter of an `audio/pcm;rate=NNNN` mime type.
pub(crate) fn sample_rate_from_mime(mime: &str) -> Option<u32> {
    mime.split(';')
        .skip(1)
        .filter_map(|param| param.trim().split_once('='))
        .find(|(key, _)| key.trim().eq_ignore_ascii_case("rate"))
        .and_then(|(_, value)| value.trim().parse().ok())
}
