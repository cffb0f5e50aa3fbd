//! Per-turn transcript text.

use crate::core::realtime::TranscriptRole;

/// User and AI transcript of the current turn.
///
/// The user side is cleared when a user turn starts, the AI side when a user
/// turn or an AI response starts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranscriptAccumulator {
    user: String,
    ai: String,
}

impl TranscriptAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn ai(&self) -> &str {
        &self.ai
    }

    pub fn get(&self, role: TranscriptRole) -> &str {
        match role {
            TranscriptRole::User => &self.user,
            TranscriptRole::Assistant => &self.ai,
        }
    }

    /// Appends partial text and returns the accumulated text for `role`.
    pub fn append(&mut self, role: TranscriptRole, text: &str) -> &str {
        let target = self.target(role);
        target.push_str(text);
        target
    }

    /// Replaces the text for `role` with a final transcript.
    pub fn replace(&mut self, role: TranscriptRole, text: &str) -> &str {
        let target = self.target(role);
        target.clear();
        target.push_str(text);
        target
    }

    pub fn clear_role(&mut self, role: TranscriptRole) {
        self.target(role).clear();
    }

    pub fn clear(&mut self) {
        self.user.clear();
        self.ai.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.user.is_empty() && self.ai.is_empty()
    }

    fn target(&mut self, role: TranscriptRole) -> &mut String {
        match role {
            TranscriptRole::User => &mut self.user,
            TranscriptRole::Assistant => &mut self.ai,
        }
    }
}
