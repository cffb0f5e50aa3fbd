//! OpenAI Realtime API WebSocket message types.
//!
//! All events are JSON-encoded and sent over WebSocket.
//!
//! # Protocol Overview
//!
//! Client events (sent to server):
//! - session.update - Configure the session (sent once, first)
//! - input_audio_buffer.append - Append microphone audio
//! - response.cancel - Cancel the in-flight response
//!
//! Server events (received from server), everything else is ignored:
//! - session.created / session.updated
//! - input_audio_buffer.speech_started / speech_stopped
//! - response.created / response.done / response.cancelled
//! - response.output_audio.delta (legacy: response.audio.delta)
//! - response.output_audio_transcript.delta (legacy: response.audio_transcript.delta)
//! - conversation.item.input_audio_transcription.delta / completed
//! - error

use base64::prelude::*;
use serde::{Deserialize, Serialize};

// =============================================================================
// Session Configuration
// =============================================================================

/// Session configuration for the `session.update` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Always "realtime"
    #[serde(rename = "type")]
    pub session_type: String,

    /// Response modalities
    pub output_modalities: Vec<String>,

    /// System instructions for the assistant
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,

    /// Audio input and output settings
    pub audio: AudioConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    pub input: AudioInputConfig,
    pub output: AudioOutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioInputConfig {
    /// Audio format of appended input
    pub format: AudioFormat,

    /// Input audio transcription configuration
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcription: Option<InputAudioTranscription>,

    /// Turn detection configuration
    pub turn_detection: TurnDetection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioOutputConfig {
    /// Voice for audio output
    pub voice: String,

    /// Format of synthesized audio
    pub format: AudioFormat,
}

/// PCM audio format descriptor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AudioFormat {
    /// MIME-like type, "audio/pcm"
    #[serde(rename = "type")]
    pub format_type: String,
    /// Sample rate in Hz
    pub rate: u32,
}

impl AudioFormat {
    pub fn pcm(rate: u32) -> Self {
        Self {
            format_type: "audio/pcm".to_string(),
            rate,
        }
    }
}

/// Input audio transcription configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputAudioTranscription {
    /// Transcription model (e.g., "whisper-1")
    pub model: String,
}

/// Turn detection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TurnDetection {
    /// Server-side VAD
    #[serde(rename = "server_vad")]
    ServerVad {
        /// Activation threshold
        threshold: f32,
        /// Audio prefix padding in ms
        prefix_padding_ms: u32,
        /// Silence duration in ms
        silence_duration_ms: u32,
        /// Whether to create response on turn end
        create_response: bool,
    },
}

// =============================================================================
// Client Events
// =============================================================================

/// Client events sent to the OpenAI Realtime API.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    /// Update session configuration
    #[serde(rename = "session.update")]
    SessionUpdate {
        /// Session configuration
        session: SessionConfig,
    },

    /// Append audio to input buffer
    #[serde(rename = "input_audio_buffer.append")]
    InputAudioBufferAppend {
        /// Base64-encoded audio data
        audio: String,
    },

    /// Cancel the current response
    #[serde(rename = "response.cancel")]
    ResponseCancel,
}

impl ClientEvent {
    /// Create an audio append event from raw PCM bytes.
    pub fn audio_append(audio: &[u8]) -> Self {
        ClientEvent::InputAudioBufferAppend {
            audio: BASE64_STANDARD.encode(audio),
        }
    }

    /// Serialize to the JSON text frame.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

// =============================================================================
// Server Events
// =============================================================================

/// Error payload of the `error` event.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiError {
    /// Error type
    #[serde(rename = "type", default)]
    pub error_type: String,
    /// Error code
    #[serde(default)]
    pub code: Option<String>,
    /// Human-readable message
    #[serde(default)]
    pub message: String,
}

/// Summary of a finished response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResponseInfo {
    #[serde(default)]
    pub id: Option<String>,
    /// completed, cancelled, failed or incomplete
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub status_details: Option<serde_json::Value>,
}

/// Server events received from the OpenAI Realtime API.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    /// Error occurred
    #[serde(rename = "error")]
    Error {
        /// Error details
        #[serde(default)]
        error: ApiError,
    },

    /// Session created
    #[serde(rename = "session.created")]
    SessionCreated,

    /// Session updated
    #[serde(rename = "session.updated")]
    SessionUpdated,

    /// Speech started (VAD detected speech)
    #[serde(rename = "input_audio_buffer.speech_started")]
    SpeechStarted,

    /// Speech stopped (VAD detected silence)
    #[serde(rename = "input_audio_buffer.speech_stopped")]
    SpeechStopped,

    /// Response generation started
    #[serde(rename = "response.created")]
    ResponseCreated,

    /// Audio data chunk
    #[serde(rename = "response.output_audio.delta", alias = "response.audio.delta")]
    AudioDelta {
        /// Base64-encoded PCM16
        delta: String,
    },

    /// Assistant transcript chunk
    #[serde(
        rename = "response.output_audio_transcript.delta",
        alias = "response.audio_transcript.delta"
    )]
    AudioTranscriptDelta {
        /// Transcript text chunk
        delta: String,
    },

    /// User transcript chunk
    #[serde(rename = "conversation.item.input_audio_transcription.delta")]
    InputTranscriptionDelta {
        /// Transcript text chunk
        delta: String,
    },

    /// User transcript complete
    #[serde(rename = "conversation.item.input_audio_transcription.completed")]
    InputTranscriptionCompleted {
        /// Full transcript of the user turn
        transcript: String,
    },

    /// Response cancelled
    #[serde(rename = "response.cancelled")]
    ResponseCancelled,

    /// Response complete
    #[serde(rename = "response.done")]
    ResponseDone {
        #[serde(default)]
        response: ResponseInfo,
    },

    /// Any event type this client does not act on
    #[serde(other)]
    Unknown,
}

// =============================================================================
// Tests
// =============================================================================
