//! Audio device abstractions.
//!
//! A session never talks to cpal directly. It opens its microphone and speaker
//! through [`AudioDevices`], which lets tests substitute scripted devices and
//! keeps the cpal stream threads out of the async code.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use tokio::sync::mpsc;

use crate::errors::VoiceResult;

/// Identifies one scheduled chunk on an [`AudioOutput`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlaybackHandle(pub u64);

impl fmt::Display for PlaybackHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Capture preferences passed to the platform when opening the microphone.
///
/// Not every backend can honour them; cpal has no control over echo
/// cancellation, so there they only feed the log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputProcessing {
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
    pub auto_gain_control: bool,
}

impl Default for InputProcessing {
    fn default() -> Self {
        Self {
            echo_cancellation: true,
            noise_suppression: true,
            auto_gain_control: true,
        }
    }
}

/// An open microphone.
///
/// Blocks of mono `f32` samples at the requested rate are pushed into the
/// channel handed to [`AudioDevices::open_input`] until the input is closed.
pub trait AudioInput: Send {
    /// Sample rate the blocks are delivered at.
    fn sample_rate(&self) -> u32;

    /// Releases the device. Must be safe to call more than once.
    fn close(&mut self);
}

/// An open speaker supporting sample-accurate scheduled playback.
///
/// Every scheduled chunk reports its handle on the `ended` channel given to
/// [`AudioDevices::open_output`] once it has finished playing. Chunks stopped
/// through [`AudioOutput::stop`] do not report.
pub trait AudioOutput: Send {
    /// Current position of the output clock, in seconds.
    fn current_time(&self) -> f64;

    /// Rate the output renders at.
    fn sample_rate(&self) -> u32;

    /// Schedules mono samples (at [`AudioOutput::sample_rate`]) to start at `start_at`
    /// seconds on the output clock.
    fn schedule(&mut self, samples: Vec<f32>, start_at: f64) -> PlaybackHandle;

    /// Stops a chunk. Unknown or already finished handles are ignored.
    fn stop(&mut self, handle: PlaybackHandle);

    /// Releases the device. Must be safe to call more than once.
    fn close(&mut self);
}

/// Factory for the input and output devices of one session.
pub trait AudioDevices: Send + Sync {
    fn open_input(
        &self,
        sample_rate: u32,
        processing: InputProcessing,
        blocks: mpsc::Sender<Vec<f32>>,
    ) -> VoiceResult<Box<dyn AudioInput>>;

    fn open_output(
        &self,
        sample_rate: u32,
        ended: mpsc::UnboundedSender<PlaybackHandle>,
    ) -> VoiceResult<Box<dyn AudioOutput>>;
}

/// Read-only level tap for visualisation.
///
/// Holds the level of the latest captured frame and the latest rendered output
/// block. Cloning shares the same underlying values.
#[derive(Debug, Clone, Default)]
pub struct LevelMeter {
    input: Arc<AtomicU32>,
    output: Arc<AtomicU32>,
}

impl LevelMeter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_input(&self, level: f32) {
        self.input.store(level.to_bits(), Ordering::Relaxed);
    }

    pub fn set_output(&self, level: f32) {
        self.output.store(level.to_bits(), Ordering::Relaxed);
    }

    /// Mean absolute amplitude of the most recent microphone frame.
    pub fn input(&self) -> f32 {
        f32::from_bits(self.input.load(Ordering::Relaxed))
    }

    /// RMS of the most recent block sent to the speaker.
    pub fn output(&self) -> f32 {
        f32::from_bits(self.output.load(Ordering::Relaxed))
    }

    pub fn reset(&self) {
        self.set_input(0.0);
        self.set_output(0.0);
    }
}
