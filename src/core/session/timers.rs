//! Single-shot deadlines owned by the session actor.
//!
//! A timer is a deadline rather than a spawned task. Arming replaces the
//! previous deadline and disarming forgets it, so a superseded timer can never
//! fire late.

use std::fmt;
use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// Quiet period after user speech before the turn counts as finished
    SilenceDebounce,
    /// Pause between the start of an AI response and audible playback
    ThinkingDelay,
}

impl fmt::Display for TimerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimerKind::SilenceDebounce => write!(f, "silence-debounce"),
            TimerKind::ThinkingDelay => write!(f, "thinking-delay"),
        }
    }
}

#[derive(Debug, Default)]
pub struct SessionTimers {
    silence: Option<Instant>,
    thinking: Option<Instant>,
}

impl SessionTimers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms `kind` to fire `delay` from now, replacing any pending deadline.
    pub fn arm(&mut self, kind: TimerKind, delay: Duration) {
        self.arm_at(kind, Instant::now() + delay);
    }

    pub fn arm_at(&mut self, kind: TimerKind, deadline: Instant) {
        *self.slot(kind) = Some(deadline);
    }

    pub fn disarm(&mut self, kind: TimerKind) {
        *self.slot(kind) = None;
    }

    pub fn is_armed(&self, kind: TimerKind) -> bool {
        self.deadline(kind).is_some()
    }

    pub fn deadline(&self, kind: TimerKind) -> Option<Instant> {
        match kind {
            TimerKind::SilenceDebounce => self.silence,
            TimerKind::ThinkingDelay => self.thinking,
        }
    }

    pub fn clear(&mut self) {
        self.silence = None;
        self.thinking = None;
    }

    /// The earliest armed timer.
    pub fn next_deadline(&self) -> Option<(TimerKind, Instant)> {
        let silence = self.silence.map(|at| (TimerKind::SilenceDebounce, at));
        let thinking = self.thinking.map(|at| (TimerKind::ThinkingDelay, at));
        match (silence, thinking) {
            (Some(s), Some(t)) => Some(if t.1 < s.1 { t } else { s }),
            (s, t) => s.or(t),
        }
    }

    /// Waits for the earliest armed timer, disarms it and returns its kind.
    ///
    /// Never resolves while nothing is armed. Cancel safe: dropping the future
    /// leaves the deadlines untouched.
    pub async fn fired(&mut self) -> TimerKind {
        match self.next_deadline() {
            Some((kind, deadline)) => {
                tokio::time::sleep_until(deadline).await;
                self.disarm(kind);
                kind
            }
            None => std::future::pending().await,
        }
    }

    fn slot(&mut self, kind: TimerKind) -> &mut Option<Instant> {
        match kind {
            TimerKind::SilenceDebounce => &mut self.silence,
            TimerKind::ThinkingDelay => &mut self.thinking,
        }
    }
}
