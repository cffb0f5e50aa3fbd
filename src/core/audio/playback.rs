//! Gapless scheduling of synthesized speech.
//!
//! Chunks arrive from the network with arbitrary jitter. Each one is placed on
//! the output clock at `max(now, next_play_time)` so it starts exactly where the
//! previous one ends, and the cursor then advances by the chunk's duration.

use std::collections::HashSet;

use tracing::debug;

use super::codec::{pcm16_to_float, resample_linear};
use super::device::{AudioOutput, PlaybackHandle};
use crate::core::realtime::AudioChunk;
use crate::errors::{VoiceError, VoiceResult};

/// Lowest chunk sample rate accepted for playback.
pub const MIN_CHUNK_SAMPLE_RATE: u32 = 8_000;

/// Highest chunk sample rate accepted for playback.
pub const MAX_CHUNK_SAMPLE_RATE: u32 = 192_000;

/// Where a chunk landed on the output clock.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduledChunk {
    pub handle: PlaybackHandle,
    pub start_time: f64,
    pub duration: f64,
}

/// Owns the output device, the play cursor and the set of active chunks.
pub struct PlaybackScheduler {
    output: Box<dyn AudioOutput>,
    next_play_time: f64,
    active: HashSet<PlaybackHandle>,
    closed: bool,
}

impl PlaybackScheduler {
    pub fn new(output: Box<dyn AudioOutput>) -> Self {
        Self {
            output,
            next_play_time: 0.0,
            active: HashSet::new(),
            closed: false,
        }
    }

    /// Decodes a chunk and schedules it right after everything already queued.
    ///
    /// Returns [`crate::errors::VoiceError::PlaybackDecode`] for malformed
    /// payloads; the cursor and active set are left untouched in that case.
    pub fn enqueue(&mut self, chunk: &AudioChunk) -> VoiceResult<ScheduledChunk> {
        if !(MIN_CHUNK_SAMPLE_RATE..=MAX_CHUNK_SAMPLE_RATE).contains(&chunk.sample_rate) {
            return Err(VoiceError::PlaybackDecode(format!(
                "unsupported sample rate {} Hz",
                chunk.sample_rate
            )));
        }
        let samples = pcm16_to_float(&chunk.data)?;
        let device_rate = self.output.sample_rate();
        let samples = resample_linear(&samples, chunk.sample_rate, device_rate);

        let duration = samples.len() as f64 / device_rate as f64;
        let start_time = self.output.current_time().max(self.next_play_time);
        let handle = self.output.schedule(samples, start_time);

        self.next_play_time = start_time + duration;
        self.active.insert(handle);

        debug!(
            handle = %handle,
            start_time,
            duration,
            active = self.active.len(),
            "Scheduled audio chunk"
        );

        Ok(ScheduledChunk {
            handle,
            start_time,
            duration,
        })
    }

    /// Records the natural end of a chunk.
    ///
    /// Returns `true` when this completion emptied the active set. Handles that
    /// are not active (stopped earlier, or from before an interruption) are
    /// ignored and return `false`.
    pub fn on_ended(&mut self, handle: PlaybackHandle) -> bool {
        self.active.remove(&handle) && self.active.is_empty()
    }

    /// Halts every active chunk and resets the cursor to zero.
    pub fn stop_all(&mut self) {
        let stopped = self.active.len();
        for handle in self.active.drain() {
            self.output.stop(handle);
        }
        self.next_play_time = 0.0;
        if stopped > 0 {
            debug!(stopped, "Stopped all playback");
        }
    }

    /// Stops playback and releases the output device. Idempotent.
    pub fn close(&mut self) {
        self.stop_all();
        if !self.closed {
            self.output.close();
            self.closed = true;
        }
    }

    pub fn next_play_time(&self) -> f64 {
        self.next_play_time
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn is_idle(&self) -> bool {
        self.active.is_empty()
    }

    pub fn current_time(&self) -> f64 {
        self.output.current_time()
    }
}

impl Drop for PlaybackScheduler {
    fn drop(&mut self) {
        self.close();
    }
}
