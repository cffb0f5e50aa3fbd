//! Scripted audio devices.
//!
//! [`FakeDevices`] hands the session a microphone the test feeds by hand and a
//! speaker that only records what was scheduled. Playback never ends on its
//! own; the test decides when chunks finish with [`FakeDevices::finish_playback`].

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use realtime_voice::core::audio::{
    AudioDevices, AudioInput, AudioOutput, InputProcessing, PlaybackHandle,
};
use realtime_voice::{VoiceError, VoiceResult};
use tokio::sync::mpsc;

/// One chunk handed to the fake speaker.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledPlayback {
    pub handle: PlaybackHandle,
    pub start_at: f64,
    pub samples: usize,
    pub stopped: bool,
    pub finished: bool,
}

#[derive(Default)]
struct DeviceState {
    microphone: Option<mpsc::Sender<Vec<f32>>>,
    ended: Option<mpsc::UnboundedSender<PlaybackHandle>>,
    scheduled: Vec<ScheduledPlayback>,
    next_handle: u64,
    input_opened: usize,
    input_closed: usize,
    output_opened: usize,
    output_closed: usize,
    output_rate: u32,
}

/// Audio devices driven by the test.
#[derive(Clone, Default)]
pub struct FakeDevices {
    state: Arc<Mutex<DeviceState>>,
    no_microphone: bool,
    /// How long opening and closing the speaker blocks the calling thread
    slow_speaker: Duration,
}

impl FakeDevices {
    pub fn new() -> Self {
        Self::default()
    }

    /// Devices whose microphone cannot be opened.
    pub fn without_microphone() -> Self {
        Self {
            no_microphone: true,
            ..Self::default()
        }
    }

    /// Devices whose speaker blocks for `delay` when opened and closed,
    /// like a backend waiting for its stream thread.
    pub fn with_slow_speaker(delay: Duration) -> Self {
        Self {
            slow_speaker: delay,
            ..Self::default()
        }
    }

    /// Delivers one block of samples from the microphone.
    pub async fn speak(&self, samples: Vec<f32>) {
        let microphone = self.state.lock().microphone.clone();
        if let Some(microphone) = microphone {
            let _ = microphone.send(samples).await;
        }
    }

    /// Reports every chunk still playing as finished.
    pub fn finish_playback(&self) {
        let mut state = self.state.lock();
        let Some(ended) = state.ended.clone() else {
            return;
        };
        for chunk in state
            .scheduled
            .iter_mut()
            .filter(|chunk| !chunk.stopped && !chunk.finished)
        {
            chunk.finished = true;
            let _ = ended.send(chunk.handle);
        }
    }

    pub fn scheduled(&self) -> Vec<ScheduledPlayback> {
        self.state.lock().scheduled.clone()
    }

    pub fn stopped_count(&self) -> usize {
        self.state
            .lock()
            .scheduled
            .iter()
            .filter(|chunk| chunk.stopped)
            .count()
    }

    pub fn output_rate(&self) -> u32 {
        self.state.lock().output_rate
    }

    /// Whether every opened device has been closed again.
    pub fn all_closed(&self) -> bool {
        let state = self.state.lock();
        state.input_closed >= state.input_opened && state.output_closed >= state.output_opened
    }

    pub fn opened(&self) -> (usize, usize) {
        let state = self.state.lock();
        (state.input_opened, state.output_opened)
    }
}

struct FakeInput {
    rate: u32,
    closed: bool,
    state: Arc<Mutex<DeviceState>>,
}

impl AudioInput for FakeInput {
    fn sample_rate(&self) -> u32 {
        self.rate
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            let mut state = self.state.lock();
            state.input_closed += 1;
            state.microphone = None;
        }
    }
}

struct FakeOutput {
    rate: u32,
    closed: bool,
    delay: Duration,
    state: Arc<Mutex<DeviceState>>,
}

impl AudioOutput for FakeOutput {
    fn current_time(&self) -> f64 {
        0.0
    }

    fn sample_rate(&self) -> u32 {
        self.rate
    }

    fn schedule(&mut self, samples: Vec<f32>, start_at: f64) -> PlaybackHandle {
        let mut state = self.state.lock();
        state.next_handle += 1;
        let handle = PlaybackHandle(state.next_handle);
        state.scheduled.push(ScheduledPlayback {
            handle,
            start_at,
            samples: samples.len(),
            stopped: false,
            finished: false,
        });
        handle
    }

    fn stop(&mut self, handle: PlaybackHandle) {
        let mut state = self.state.lock();
        if let Some(chunk) = state
            .scheduled
            .iter_mut()
            .find(|chunk| chunk.handle == handle && !chunk.finished)
        {
            chunk.stopped = true;
        }
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            std::thread::sleep(self.delay);
            let mut state = self.state.lock();
            state.output_closed += 1;
            state.ended = None;
        }
    }
}

impl AudioDevices for FakeDevices {
    fn open_input(
        &self,
        sample_rate: u32,
        _processing: InputProcessing,
        blocks: mpsc::Sender<Vec<f32>>,
    ) -> VoiceResult<Box<dyn AudioInput>> {
        if self.no_microphone {
            return Err(VoiceError::DeviceAcquisition(
                "no input device available".to_string(),
            ));
        }
        let mut state = self.state.lock();
        state.microphone = Some(blocks);
        state.input_opened += 1;
        Ok(Box::new(FakeInput {
            rate: sample_rate,
            closed: false,
            state: self.state.clone(),
        }))
    }

    fn open_output(
        &self,
        sample_rate: u32,
        ended: mpsc::UnboundedSender<PlaybackHandle>,
    ) -> VoiceResult<Box<dyn AudioOutput>> {
        std::thread::sleep(self.slow_speaker);
        let mut state = self.state.lock();
        state.ended = Some(ended);
        state.output_opened += 1;
        state.output_rate = sample_rate;
        Ok(Box::new(FakeOutput {
            rate: sample_rate,
            closed: false,
            delay: self.slow_speaker,
            state: self.state.clone(),
        }))
    }
}
