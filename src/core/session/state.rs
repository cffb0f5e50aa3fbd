//! Conversational state shown to the presentation layer.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Exactly one value is current per session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VoiceState {
    /// Idle, waiting for the user
    #[default]
    AtRest,
    /// The user is talking
    UserSpeaking,
    /// The user's turn ended and the AI has not started talking yet
    Thinking,
    /// AI audio is playing
    AiSpeaking,
}

impl VoiceState {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoiceState::AtRest => "at-rest",
            VoiceState::UserSpeaking => "user-speaking",
            VoiceState::Thinking => "thinking",
            VoiceState::AiSpeaking => "ai-speaking",
        }
    }
}

impl fmt::Display for VoiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
