//! Voice-session state machine.
//!
//! Sans-IO: the machine never touches the socket or the audio devices
//! directly. The session actor feeds it provider events, captured frames,
//! playback completions and timer expiries, one at a time, and then drains the
//! messages it wants sent upstream with [`VoiceStateMachine::take_effects`].
//! Playback goes through the [`PlaybackScheduler`] the actor attaches.
//!
//! Transitions:
//!
//! ```text
//! AtRest ──speech start──▶ UserSpeaking ──silence debounce──▶ Thinking
//!    ▲                          ▲                               │
//!    │                          └──── speech start (any state) ─┤
//!    │                                                          ▼
//!    └──────────── playback drained ◀──────────── AiSpeaking ◀── thinking delay
//! ```

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use super::callbacks::SessionCallbacks;
use super::state::VoiceState;
use super::timers::{SessionTimers, TimerKind};
use super::transcript::TranscriptAccumulator;
use crate::core::audio::{CapturedFrame, PlaybackHandle, PlaybackScheduler};
use crate::core::realtime::{
    AudioChunk, ProviderAdapter, ProviderEvent, TranscriptRole, TurnDetectionMode,
};

/// Default quiet period before a finished user turn enters `Thinking`.
pub const DEFAULT_SILENCE_DEBOUNCE: Duration = Duration::from_millis(1700);

/// Default pause between the start of an AI response and audible playback.
pub const DEFAULT_THINKING_DELAY: Duration = Duration::from_millis(1700);

/// Provider-dependent knobs of the machine.
#[derive(Debug, Clone, PartialEq)]
pub struct MachinePolicy {
    /// Sent upstream when the user interrupts audible AI speech
    pub cancel_message: Option<String>,
    /// Hold AI audio back while the user is still talking
    pub buffers_during_user_speech: bool,
    /// Derive speech boundaries from captured frame energy
    pub client_vad: bool,
    pub silence_debounce: Duration,
    pub thinking_delay: Duration,
}

impl MachinePolicy {
    pub fn for_adapter<P: ProviderAdapter + ?Sized>(
        adapter: &P,
        silence_debounce: Duration,
        thinking_delay: Duration,
    ) -> Self {
        Self {
            cancel_message: adapter.cancel_message(),
            buffers_during_user_speech: adapter.buffers_during_user_speech(),
            client_vad: adapter.turn_detection() == TurnDetectionMode::Client,
            silence_debounce,
            thinking_delay,
        }
    }
}

impl Default for MachinePolicy {
    fn default() -> Self {
        Self {
            cancel_message: None,
            buffers_during_user_speech: false,
            client_vad: false,
            silence_debounce: DEFAULT_SILENCE_DEBOUNCE,
            thinking_delay: DEFAULT_THINKING_DELAY,
        }
    }
}

/// Work the actor must perform after feeding the machine.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Send a text frame upstream
    Send(String),
    /// The provider reported an unrecoverable error
    Fatal(String),
}

/// What readers outside the session task can see.
#[derive(Debug, Clone, Default)]
pub struct SessionView {
    pub state: VoiceState,
    pub transcript: TranscriptAccumulator,
}

pub type SharedView = Arc<RwLock<SessionView>>;

pub struct VoiceStateMachine {
    state: VoiceState,
    user_speaking: bool,
    ai_speaking: bool,
    response_pending: bool,
    buffer: VecDeque<AudioChunk>,
    timers: SessionTimers,
    playback: Option<PlaybackScheduler>,
    policy: MachinePolicy,
    callbacks: SessionCallbacks,
    view: SharedView,
    effects: Vec<Effect>,
}

impl VoiceStateMachine {
    pub fn new(policy: MachinePolicy, callbacks: SessionCallbacks, view: SharedView) -> Self {
        Self {
            state: VoiceState::AtRest,
            user_speaking: false,
            ai_speaking: false,
            response_pending: false,
            buffer: VecDeque::new(),
            timers: SessionTimers::new(),
            playback: None,
            policy,
            callbacks,
            view,
            effects: Vec::new(),
        }
    }

    pub fn attach_playback(&mut self, playback: PlaybackScheduler) {
        self.playback = Some(playback);
    }

    /// Hands the scheduler back so the caller can close the device itself.
    /// Playback events are ignored afterwards.
    pub fn detach_playback(&mut self) -> Option<PlaybackScheduler> {
        self.playback.take()
    }

    pub fn state(&self) -> VoiceState {
        self.state
    }

    pub fn is_user_speaking(&self) -> bool {
        self.user_speaking
    }

    pub fn is_ai_speaking(&self) -> bool {
        self.ai_speaking
    }

    pub fn is_thinking_delay_active(&self) -> bool {
        self.timers.is_armed(TimerKind::ThinkingDelay)
    }

    pub fn buffered_chunks(&self) -> usize {
        self.buffer.len()
    }

    pub fn active_playback(&self) -> usize {
        self.playback.as_ref().map_or(0, PlaybackScheduler::active_count)
    }

    pub fn timers(&self) -> &SessionTimers {
        &self.timers
    }

    pub fn policy(&self) -> &MachinePolicy {
        &self.policy
    }

    /// Waits for the next armed timer. See [`SessionTimers::fired`].
    pub async fn next_timer(&mut self) -> TimerKind {
        self.timers.fired().await
    }

    pub fn take_effects(&mut self) -> Vec<Effect> {
        std::mem::take(&mut self.effects)
    }

    // =========================================================================
    // Inputs
    // =========================================================================

    pub fn handle_event(&mut self, event: ProviderEvent) {
        match event {
            ProviderEvent::SetupAcknowledged => {
                info!("Provider acknowledged session setup");
                self.callbacks.status("setup acknowledged");
            }

            ProviderEvent::SpeechStarted => self.begin_user_turn(),

            ProviderEvent::SpeechStopped => {
                self.user_speaking = false;
                if !self.ai_speaking {
                    self.timers
                        .arm(TimerKind::SilenceDebounce, self.policy.silence_debounce);
                }
            }

            ProviderEvent::ResponseStarted => {
                self.timers.disarm(TimerKind::SilenceDebounce);
                self.stop_playback();
                self.ai_speaking = false;
                self.clear_transcript(TranscriptRole::Assistant);
                self.discard_buffer();
                self.response_pending = true;
                self.begin_thinking();
            }

            ProviderEvent::AudioDelta(chunk) => {
                let hold = self.is_thinking_delay_active()
                    || (self.policy.buffers_during_user_speech && self.user_speaking);
                if hold {
                    self.buffer.push_back(chunk);
                    debug!(chunks = self.buffer.len(), "Buffered AI audio");
                } else {
                    self.play(&chunk);
                }
            }

            ProviderEvent::TranscriptDelta { role, text } => {
                let full = {
                    let mut view = self.view.write();
                    view.transcript.append(role, &text).to_string()
                };
                self.callbacks.transcript(role, &full);
            }

            ProviderEvent::TranscriptFinal { role, text } => {
                let full = {
                    let mut view = self.view.write();
                    view.transcript.replace(role, &text).to_string()
                };
                self.callbacks.transcript(role, &full);
            }

            ProviderEvent::Interrupted | ProviderEvent::ResponseCancelled => {
                self.cancel_output();
                if matches!(self.state, VoiceState::Thinking | VoiceState::AiSpeaking) {
                    self.set_state(VoiceState::AtRest);
                }
            }

            ProviderEvent::TurnComplete => {
                self.response_pending = false;
                let idle = self.playback.as_ref().is_none_or(PlaybackScheduler::is_idle);
                if self.state == VoiceState::Thinking
                    && !self.is_thinking_delay_active()
                    && self.buffer.is_empty()
                    && idle
                {
                    self.set_state(VoiceState::AtRest);
                }
            }

            ProviderEvent::GoAway => {
                warn!("Provider is going away");
                self.callbacks.status("server going away");
            }

            ProviderEvent::FatalError(message) => self.effects.push(Effect::Fatal(message)),
        }
    }

    /// Local voice activity, used only when the provider has no server VAD.
    pub fn on_capture_frame(&mut self, frame: &CapturedFrame) {
        if !self.policy.client_vad || self.ai_speaking {
            return;
        }

        if frame.speech {
            self.timers.disarm(TimerKind::SilenceDebounce);
            if !self.user_speaking && !self.is_thinking_delay_active() {
                self.begin_user_turn();
            }
        } else if self.user_speaking
            && !self.is_thinking_delay_active()
            && !self.timers.is_armed(TimerKind::SilenceDebounce)
        {
            self.timers
                .arm(TimerKind::SilenceDebounce, self.policy.silence_debounce);
        }
    }

    pub fn on_timer(&mut self, kind: TimerKind) {
        debug!(timer = %kind, state = %self.state, "Timer fired");
        self.timers.disarm(kind);
        match kind {
            TimerKind::SilenceDebounce => {
                if self.ai_speaking {
                    return;
                }
                self.begin_thinking();
            }
            TimerKind::ThinkingDelay => self.end_thinking_delay(),
        }
    }

    pub fn on_playback_ended(&mut self, handle: PlaybackHandle) {
        let drained = self
            .playback
            .as_mut()
            .is_some_and(|playback| playback.on_ended(handle));
        if !drained {
            return;
        }

        debug!("Playback drained");
        self.ai_speaking = false;
        if self.state == VoiceState::AiSpeaking {
            let next = if self.user_speaking {
                VoiceState::UserSpeaking
            } else {
                VoiceState::AtRest
            };
            self.set_state(next);
        }
    }

    /// Reports a fatal error and tears everything down.
    pub fn fail(&mut self, message: &str) {
        self.callbacks.error(message);
        self.teardown();
    }

    /// Forces `AtRest`, clears timers and buffers and releases the output
    /// device. Safe to call repeatedly.
    pub fn teardown(&mut self) {
        self.timers.clear();
        self.discard_buffer();
        if let Some(mut playback) = self.playback.take() {
            playback.close();
        }
        self.user_speaking = false;
        self.ai_speaking = false;
        self.response_pending = false;
        self.effects.clear();
        self.set_state(VoiceState::AtRest);
    }

    // =========================================================================
    // Transitions
    // =========================================================================

    /// Interruption: the user's turn always wins over thinking and speaking.
    fn begin_user_turn(&mut self) {
        self.timers.disarm(TimerKind::SilenceDebounce);
        self.timers.disarm(TimerKind::ThinkingDelay);
        self.view.write().transcript.clear();
        self.callbacks.transcript(TranscriptRole::User, "");
        self.callbacks.transcript(TranscriptRole::Assistant, "");
        self.stop_playback();
        self.discard_buffer();

        if self.ai_speaking {
            if let Some(cancel) = &self.policy.cancel_message {
                debug!("Cancelling in-flight response");
                self.effects.push(Effect::Send(cancel.clone()));
            }
        }
        self.ai_speaking = false;
        self.response_pending = false;
        self.user_speaking = true;
        self.set_state(VoiceState::UserSpeaking);
    }

    fn begin_thinking(&mut self) {
        self.user_speaking = false;
        self.timers
            .arm(TimerKind::ThinkingDelay, self.policy.thinking_delay);
        self.set_state(VoiceState::Thinking);
        self.callbacks.status("thinking");
    }

    fn end_thinking_delay(&mut self) {
        if !self.buffer.is_empty() {
            let chunks: Vec<AudioChunk> = self.buffer.drain(..).collect();
            debug!(chunks = chunks.len(), "Flushing buffered AI audio");
            for chunk in &chunks {
                self.play(chunk);
            }
            if self.ai_speaking {
                return;
            }
        }

        if self.response_pending {
            debug!("Thinking delay over, waiting for response audio");
        } else if self.state == VoiceState::Thinking {
            self.set_state(VoiceState::AtRest);
        }
    }

    fn play(&mut self, chunk: &AudioChunk) {
        let Some(playback) = self.playback.as_mut() else {
            warn!("No output device attached, dropping audio chunk");
            return;
        };
        match playback.enqueue(chunk) {
            Ok(_) => {
                if !self.ai_speaking {
                    self.ai_speaking = true;
                }
                if self.state != VoiceState::AiSpeaking {
                    self.set_state(VoiceState::AiSpeaking);
                }
            }
            Err(e) => warn!("Dropping audio chunk: {}", e),
        }
    }

    /// Stops playback, drops buffered audio and ends the thinking delay.
    fn cancel_output(&mut self) {
        self.stop_playback();
        self.discard_buffer();
        self.timers.disarm(TimerKind::ThinkingDelay);
        self.ai_speaking = false;
        self.response_pending = false;
    }

    fn stop_playback(&mut self) {
        if let Some(playback) = self.playback.as_mut() {
            playback.stop_all();
        }
    }

    fn discard_buffer(&mut self) {
        if !self.buffer.is_empty() {
            debug!(chunks = self.buffer.len(), "Discarding buffered AI audio");
            self.buffer.clear();
        }
    }

    fn clear_transcript(&mut self, role: TranscriptRole) {
        self.view.write().transcript.clear_role(role);
        self.callbacks.transcript(role, "");
    }

    fn set_state(&mut self, state: VoiceState) {
        if self.state == state {
            return;
        }
        debug!(from = %self.state, to = %state, "State transition");
        self.state = state;
        self.view.write().state = state;
        self.callbacks.state_changed(state);
    }
}
