//! OpenAI Realtime API module.
//!
//! Speech-to-speech over OpenAI's Realtime WebSocket API.
//!
//! # Turn Detection
//!
//! The server runs VAD and reports `input_audio_buffer.speech_started` /
//! `speech_stopped`; the handshake carries the VAD thresholds.
//!
//! # Supported Voices
//!
//! alloy, ash, ballad, coral, echo, sage, shimmer, verse
//!
//! # Audio Format
//!
//! Input and output audio is PCM 16-bit signed little-endian at 24kHz.
//!
//! # Example
//!
//! ```rust,ignore
//! use realtime_voice::core::realtime::{OpenAIRealtimeAdapter, ProviderConfig};
//!
//! let adapter = OpenAIRealtimeAdapter::new(&ProviderConfig {
//!     voice: Some("verse".to_string()),
//!     instructions: Some("You are a helpful assistant.".to_string()),
//!     ..Default::default()
//! })?;
//! ```

mod adapter;
mod config;
mod messages;

pub use adapter::OpenAIRealtimeAdapter;
pub use config::{
    OPENAI_DEFAULT_TRANSCRIPTION_MODEL, OPENAI_REALTIME_SAMPLE_RATE, OPENAI_REALTIME_URL,
    OpenAIRealtimeConfig, OpenAIRealtimeModel, OpenAIRealtimeVoice,
};
pub use messages::{ClientEvent, ServerEvent};
