//! Microphone capture and framing.
//!
//! The device pushes blocks of whatever size its callback produces; the
//! pipeline re-slices them into fixed-size frames, encodes each frame to PCM16
//! and measures its energy for client-side voice activity detection.

use std::collections::VecDeque;

use bytes::Bytes;
use tokio::sync::mpsc;
use tracing::{debug, info};

use super::codec::{float_to_pcm16, mean_abs_amplitude};
use super::device::{AudioDevices, AudioInput, InputProcessing, LevelMeter};
use crate::errors::VoiceResult;

/// Default frame length in samples.
pub const DEFAULT_FRAME_SIZE: usize = 4096;

/// Mean absolute amplitude above which a frame counts as speech.
pub const DEFAULT_SPEECH_THRESHOLD: f32 = 0.01;

/// Device blocks buffered between the audio thread and the session.
const BLOCK_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaptureConfig {
    pub sample_rate: u32,
    pub frame_size: usize,
    pub speech_threshold: f32,
    pub processing: InputProcessing,
}

impl CaptureConfig {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            frame_size: DEFAULT_FRAME_SIZE,
            speech_threshold: DEFAULT_SPEECH_THRESHOLD,
            processing: InputProcessing::default(),
        }
    }
}

/// One fixed-size frame ready for transmission.
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    /// PCM16 little-endian encoding of the frame
    pub pcm: Bytes,
    /// Mean absolute amplitude
    pub energy: f32,
    /// Whether `energy` crossed the speech threshold
    pub speech: bool,
}

/// Re-slices arbitrary sized blocks into frames of exactly `frame_size` samples.
#[derive(Debug)]
pub struct FrameChunker {
    frame_size: usize,
    pending: Vec<f32>,
    ready: VecDeque<Vec<f32>>,
}

impl FrameChunker {
    pub fn new(frame_size: usize) -> Self {
        let frame_size = frame_size.max(1);
        Self {
            frame_size,
            pending: Vec::with_capacity(frame_size),
            ready: VecDeque::new(),
        }
    }

    pub fn push(&mut self, block: &[f32]) {
        let mut rest = block;
        while !rest.is_empty() {
            let take = (self.frame_size - self.pending.len()).min(rest.len());
            self.pending.extend_from_slice(&rest[..take]);
            rest = &rest[take..];
            if self.pending.len() == self.frame_size {
                let frame =
                    std::mem::replace(&mut self.pending, Vec::with_capacity(self.frame_size));
                self.ready.push_back(frame);
            }
        }
    }

    pub fn pop(&mut self) -> Option<Vec<f32>> {
        self.ready.pop_front()
    }

    pub fn buffered_samples(&self) -> usize {
        self.pending.len() + self.ready.len() * self.frame_size
    }
}

/// Energy threshold detector for client-side VAD.
#[derive(Debug, Clone, Copy)]
pub struct EnergyDetector {
    threshold: f32,
}

impl EnergyDetector {
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }

    /// Returns the frame energy and whether it counts as speech.
    pub fn analyze(&self, samples: &[f32]) -> (f32, bool) {
        let energy = mean_abs_amplitude(samples);
        (energy, energy > self.threshold)
    }
}

/// Owns an open microphone and yields encoded frames.
///
/// The frame sequence is infinite while the device is open and ends once the
/// pipeline has been stopped; a stopped pipeline cannot be restarted.
pub struct CapturePipeline {
    input: Option<Box<dyn AudioInput>>,
    blocks: mpsc::Receiver<Vec<f32>>,
    chunker: FrameChunker,
    detector: EnergyDetector,
    meter: LevelMeter,
}

impl CapturePipeline {
    /// Opens the microphone at the configured rate.
    ///
    /// Fails with [`crate::errors::VoiceError::DeviceAcquisition`] when no usable
    /// input device exists.
    pub fn start(
        devices: &dyn AudioDevices,
        config: CaptureConfig,
        meter: LevelMeter,
    ) -> VoiceResult<Self> {
        let (tx, rx) = mpsc::channel(BLOCK_CHANNEL_CAPACITY);
        let input = devices.open_input(config.sample_rate, config.processing, tx)?;

        info!(
            sample_rate = input.sample_rate(),
            frame_size = config.frame_size,
            "Microphone capture started"
        );

        Ok(Self {
            input: Some(input),
            blocks: rx,
            chunker: FrameChunker::new(config.frame_size),
            detector: EnergyDetector::new(config.speech_threshold),
            meter,
        })
    }

    /// Waits for the next complete frame.
    ///
    /// Cancel safe: a block received before cancellation stays in the chunker.
    pub async fn next_frame(&mut self) -> Option<CapturedFrame> {
        loop {
            if let Some(samples) = self.chunker.pop() {
                return Some(self.finish(&samples));
            }
            if self.input.is_none() {
                return None;
            }
            let block = self.blocks.recv().await?;
            self.chunker.push(&block);
        }
    }

    fn finish(&self, samples: &[f32]) -> CapturedFrame {
        let (energy, speech) = self.detector.analyze(samples);
        self.meter.set_input(energy);
        CapturedFrame {
            pcm: float_to_pcm16(samples),
            energy,
            speech,
        }
    }

    /// Releases the microphone. Idempotent.
    pub fn stop(&mut self) {
        if let Some(mut input) = self.input.take() {
            input.close();
            self.blocks.close();
            self.meter.set_input(0.0);
            debug!("Microphone capture stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.input.is_some()
    }
}

impl Drop for CapturePipeline {
    fn drop(&mut self) {
        self.stop();
    }
}
