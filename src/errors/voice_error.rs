//! Session-level error type.
//!
//! Provider and transport failures are reported as [`RealtimeError`] by the
//! realtime layer and wrapped here so that callers of a voice session only
//! ever deal with one error type.

use thiserror::Error;

use crate::core::realtime::RealtimeError;

/// Errors surfaced by a voice session.
#[derive(Debug, Error)]
pub enum VoiceError {
    /// Microphone or speaker could not be opened (missing device, permission denied,
    /// unsupported format)
    #[error("Audio device unavailable: {0}")]
    DeviceAcquisition(String),

    /// Connect failure, protocol-level error event or unexpected close
    #[error("Transport error: {0}")]
    Transport(#[from] RealtimeError),

    /// A received audio chunk could not be decoded into samples
    #[error("Failed to decode audio chunk: {0}")]
    PlaybackDecode(String),

    /// `start()` was called before `init()` supplied a credential
    #[error("No credential configured for provider {0}")]
    MissingCredential(String),

    /// Invalid session configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

/// Result type for voice session operations.
pub type VoiceResult<T> = Result<T, VoiceError>;

impl VoiceError {
    /// Whether the error ends the session.
    ///
    /// Decode failures only cost a single chunk and never tear the session down.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, VoiceError::PlaybackDecode(_))
    }
}
