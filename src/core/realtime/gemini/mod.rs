//! Gemini Live API module.
//!
//! Speech-to-speech over Google's bidirectional `BidiGenerateContent` stream.
//!
//! # Turn Detection
//!
//! None on the server side; speech boundaries come from local frame energy.
//!
//! # Supported Voices
//!
//! Puck, Charon, Kore, Fenrir, Aoede
//!
//! # Audio Format
//!
//! PCM 16-bit little-endian; 16kHz in, 24kHz out.

mod adapter;
mod config;
mod messages;

pub use adapter::GeminiLiveAdapter;
pub use config::{
    GEMINI_DEFAULT_MODEL, GEMINI_INPUT_SAMPLE_RATE, GEMINI_LIVE_URL, GEMINI_OUTPUT_SAMPLE_RATE,
    GeminiLiveConfig, GeminiVoice,
};
pub use messages::{RealtimeInputMessage, ServerMessage, SetupMessage};
