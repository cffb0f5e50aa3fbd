//! Local audio: sample conversion, microphone capture and scheduled playback.

pub mod capture;
pub mod codec;
pub mod cpal_device;
pub mod device;
pub mod playback;

pub use capture::{
    CaptureConfig, CapturePipeline, CapturedFrame, DEFAULT_FRAME_SIZE, DEFAULT_SPEECH_THRESHOLD,
    EnergyDetector, FrameChunker,
};
pub use cpal_device::{CpalDevices, DeviceList, list_devices};
pub use device::{
    AudioDevices, AudioInput, AudioOutput, InputProcessing, LevelMeter, PlaybackHandle,
};
pub use playback::{PlaybackScheduler, ScheduledChunk};
