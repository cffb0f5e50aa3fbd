//! Voice session: the shared state machine and the actor that drives it.
//!
//! Every provider runs through the same [`VoiceSession`], so the presentation
//! layer only ever sees [`VoiceState`] changes, transcripts and status text,
//! whichever backend is speaking.

mod callbacks;
mod machine;
#[allow(clippy::module_inception)]
mod session;
mod state;
mod timers;
mod transcript;

pub use callbacks::{
    ErrorCallback, SessionCallbacks, StateChangeCallback, StatusCallback, TranscriptCallback,
};
pub use machine::{
    DEFAULT_SILENCE_DEBOUNCE, DEFAULT_THINKING_DELAY, Effect, MachinePolicy, SessionView,
    SharedView, VoiceStateMachine,
};
pub use session::{SessionConfig, SessionEnd, VoiceSession};
pub use state::VoiceState;
pub use timers::{SessionTimers, TimerKind};
pub use transcript::TranscriptAccumulator;
