//! Presentation callbacks.
//!
//! All callbacks run synchronously on the session task, in the order the
//! underlying events happened. Keep them short.

use std::fmt;
use std::sync::Arc;

use super::state::VoiceState;
use crate::core::realtime::TranscriptRole;

/// Fired on every state transition.
pub type StateChangeCallback = Arc<dyn Fn(VoiceState) + Send + Sync>;

/// Fired with a human-readable message on fatal transport or device failures.
pub type ErrorCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Fired with auxiliary progress text ("connecting", "thinking", ...).
pub type StatusCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Fired with the full accumulated text whenever a transcript changes.
pub type TranscriptCallback = Arc<dyn Fn(TranscriptRole, &str) + Send + Sync>;

#[derive(Clone, Default)]
pub struct SessionCallbacks {
    pub on_state_change: Option<StateChangeCallback>,
    pub on_error: Option<ErrorCallback>,
    pub on_status_update: Option<StatusCallback>,
    pub on_transcript: Option<TranscriptCallback>,
}

impl SessionCallbacks {
    pub(crate) fn state_changed(&self, state: VoiceState) {
        if let Some(callback) = &self.on_state_change {
            callback(state);
        }
    }

    pub(crate) fn error(&self, message: &str) {
        if let Some(callback) = &self.on_error {
            callback(message);
        }
    }

    pub(crate) fn status(&self, message: &str) {
        if let Some(callback) = &self.on_status_update {
            callback(message);
        }
    }

    pub(crate) fn transcript(&self, role: TranscriptRole, text: &str) {
        if let Some(callback) = &self.on_transcript {
            callback(role, text);
        }
    }
}

impl fmt::Debug for SessionCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionCallbacks")
            .field("on_state_change", &self.on_state_change.is_some())
            .field("on_error", &self.on_error.is_some())
            .field("on_status_update", &self.on_status_update.is_some())
            .field("on_transcript", &self.on_transcript.is_some())
            .finish()
    }
}
