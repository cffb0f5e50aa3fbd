//! Audio Test Fixtures
//!
//! Generated microphone blocks, so tests need no audio files and every run
//! sees the same input. Samples are mono `f32` in `[-1.0, 1.0]`, the format
//! audio devices deliver to the capture pipeline.

use std::f32::consts::PI;

/// Microphone rate used by both providers' capture paths in tests.
pub const INPUT_SAMPLE_RATE: u32 = 16000;

/// Samples per captured frame in tests (10ms at 16kHz).
pub const TEST_FRAME_SIZE: usize = 160;

/// Generate silence.
pub fn silence(samples: usize) -> Vec<f32> {
    vec![0.0; samples]
}

/// Generate a sine tone; its mean absolute amplitude is about `0.64 * amplitude`.
pub fn sine(frequency: f32, amplitude: f32, samples: usize) -> Vec<f32> {
    (0..samples)
        .map(|i| amplitude * (2.0 * PI * frequency * i as f32 / INPUT_SAMPLE_RATE as f32).sin())
        .collect()
}

/// One frame that the energy detector classifies as speech.
pub fn speech_frame() -> Vec<f32> {
    sine(440.0, 0.3, TEST_FRAME_SIZE)
}

/// One frame that the energy detector classifies as silence.
pub fn quiet_frame() -> Vec<f32> {
    // Background hiss well under the 0.01 threshold
    sine(1000.0, 0.005, TEST_FRAME_SIZE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_speech_frame_is_loud() {
        let frame = speech_frame();
        let energy = frame.iter().map(|s| s.abs()).sum::<f32>() / frame.len() as f32;
        assert!(energy > 0.1);
    }

    #[test]
    fn test_quiet_frame_is_below_threshold() {
        let frame = quiet_frame();
        let energy = frame.iter().map(|s| s.abs()).sum::<f32>() / frame.len() as f32;
        assert!(energy < 0.01);
        assert_eq!(silence(4), vec![0.0; 4]);
    }
}
