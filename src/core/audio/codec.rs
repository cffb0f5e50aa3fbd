//! Sample format conversions used on both sides of the provider connection.
//!
//! Wire audio is always 16-bit signed little-endian PCM, mono, carried as
//! base64 text inside JSON messages. Devices work in `f32` samples in `[-1, 1]`.

use base64::prelude::*;
use bytes::Bytes;

use crate::errors::{VoiceError, VoiceResult};

/// Converts float samples to 16-bit PCM (little-endian bytes).
///
/// Samples are clamped to `[-1, 1]` first. Negative values scale by 32768 and
/// non-negative values by 32767 so both ends of the i16 range are reachable.
pub fn float_to_pcm16(samples: &[f32]) -> Bytes {
    let mut out = Vec::with_capacity(samples.len() * 2);
    for &sample in samples {
        let s = sample.clamp(-1.0, 1.0);
        let scaled = if s < 0.0 { s * 32768.0 } else { s * 32767.0 };
        let value = scaled as i16;
        out.extend_from_slice(&value.to_le_bytes());
    }
    Bytes::from(out)
}

/// Converts 16-bit little-endian PCM back to float samples.
///
/// An odd byte count means the chunk was truncated or is not PCM16 at all.
pub fn pcm16_to_float(pcm: &[u8]) -> VoiceResult<Vec<f32>> {
    if pcm.len() % 2 != 0 {
        return Err(VoiceError::PlaybackDecode(format!(
            "PCM16 payload has odd length {}",
            pcm.len()
        )));
    }

    Ok(pcm
        .chunks_exact(2)
        .map(|pair| {
            let value = i16::from_le_bytes([pair[0], pair[1]]);
            if value < 0 {
                value as f32 / 32768.0
            } else {
                value as f32 / 32767.0
            }
        })
        .collect())
}

/// Base64-encodes a PCM payload for the wire.
#[inline]
pub fn encode_base64(pcm: &[u8]) -> String {
    BASE64_STANDARD.encode(pcm)
}

/// Decodes a base64 wire payload into raw PCM bytes.
pub fn decode_base64(data: &str) -> VoiceResult<Bytes> {
    BASE64_STANDARD
        .decode(data)
        .map(Bytes::from)
        .map_err(|e| VoiceError::PlaybackDecode(format!("invalid base64 audio: {e}")))
}

/// Mean absolute amplitude of a frame, the energy measure used for local VAD.
pub fn mean_abs_amplitude(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    samples.iter().map(|s| s.abs()).sum::<f32>() / samples.len() as f32
}

/// Root-mean-square level of a block of samples.
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    (samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32).sqrt()
}

/// Linear-interpolation resampler.
///
/// Good enough for speech between the provider rate and whatever rate the
/// local device runs at; returns the input untouched when the rates match.
pub fn resample_linear(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || samples.is_empty() || from_rate == 0 || to_rate == 0 {
        return samples.to_vec();
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let out_len = ((samples.len() as f64) / ratio).round().max(1.0) as usize;
    let last = samples.len() - 1;

    (0..out_len)
        .map(|i| {
            let pos = i as f64 * ratio;
            let idx = (pos.floor() as usize).min(last);
            let next = (idx + 1).min(last);
            let frac = (pos - idx as f64) as f32;
            samples[idx] + (samples[next] - samples[idx]) * frac
        })
        .collect()
}

/// Averages interleaved multi-channel samples down to mono.
pub fn downmix_to_mono(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect()
}
