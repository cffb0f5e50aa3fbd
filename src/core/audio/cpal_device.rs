//! cpal-backed microphone and speaker.
//!
//! `cpal::Stream` is not `Send`, so every stream is built and kept alive on a
//! dedicated thread that parks until the owning handle is closed. The async
//! side only ever sees channels and a shared mixer.

use std::sync::Arc;
use std::sync::mpsc as std_mpsc;
use std::thread::{self, JoinHandle};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, SampleRate, StreamConfig, SupportedStreamConfigRange};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace, warn};

use super::codec::{downmix_to_mono, resample_linear, rms};
use super::device::{
    AudioDevices, AudioInput, AudioOutput, InputProcessing, LevelMeter, PlaybackHandle,
};
use crate::errors::{VoiceError, VoiceResult};

/// Names of the devices the default host exposes.
#[derive(Debug, Clone, Default)]
pub struct DeviceList {
    pub default_input: Option<String>,
    pub default_output: Option<String>,
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
}

/// Enumerates input and output devices on the default host.
pub fn list_devices() -> VoiceResult<DeviceList> {
    let host = cpal::default_host();
    let device_error = |e: cpal::DevicesError| VoiceError::DeviceAcquisition(e.to_string());

    Ok(DeviceList {
        default_input: host.default_input_device().and_then(|d| d.name().ok()),
        default_output: host.default_output_device().and_then(|d| d.name().ok()),
        inputs: host
            .input_devices()
            .map_err(device_error)?
            .filter_map(|d| d.name().ok())
            .collect(),
        outputs: host
            .output_devices()
            .map_err(device_error)?
            .filter_map(|d| d.name().ok())
            .collect(),
    })
}

/// Opens the default input and output devices of the default host.
#[derive(Debug, Clone, Default)]
pub struct CpalDevices {
    meter: LevelMeter,
}

impl CpalDevices {
    pub fn new() -> Self {
        Self::default()
    }

    /// Routes output levels to `meter`.
    pub fn with_level_meter(meter: LevelMeter) -> Self {
        Self { meter }
    }
}

impl AudioDevices for CpalDevices {
    fn open_input(
        &self,
        sample_rate: u32,
        processing: InputProcessing,
        blocks: mpsc::Sender<Vec<f32>>,
    ) -> VoiceResult<Box<dyn AudioInput>> {
        debug!(
            echo_cancellation = processing.echo_cancellation,
            noise_suppression = processing.noise_suppression,
            auto_gain_control = processing.auto_gain_control,
            "Input processing is left to the platform"
        );
        Ok(Box::new(CpalInput::open(sample_rate, blocks)?))
    }

    fn open_output(
        &self,
        sample_rate: u32,
        ended: mpsc::UnboundedSender<PlaybackHandle>,
    ) -> VoiceResult<Box<dyn AudioOutput>> {
        Ok(Box::new(CpalOutput::open(
            sample_rate,
            ended,
            self.meter.clone(),
        )?))
    }
}

/// Picks an f32 config that supports `rate`, preferring mono.
fn pick_config<I>(configs: I, rate: u32) -> Option<StreamConfig>
where
    I: Iterator<Item = SupportedStreamConfigRange>,
{
    let mut candidates: Vec<SupportedStreamConfigRange> = configs
        .filter(|c| {
            c.sample_format() == SampleFormat::F32
                && c.min_sample_rate() <= SampleRate(rate)
                && c.max_sample_rate() >= SampleRate(rate)
        })
        .collect();
    candidates.sort_by_key(|c| c.channels());
    candidates
        .into_iter()
        .next()
        .map(|c| c.with_sample_rate(SampleRate(rate)).config())
}

/// Keeps a stream thread alive until dropped or closed.
struct StreamThread {
    stop: Option<std_mpsc::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl StreamThread {
    /// Runs `build` on a new thread and waits for it to report the stream rate.
    ///
    /// `build` must create and start the stream; the thread then holds it until
    /// [`StreamThread::close`].
    fn spawn<F>(name: &str, build: F) -> VoiceResult<(Self, u32)>
    where
        F: FnOnce() -> Result<(cpal::Stream, u32), String> + Send + 'static,
    {
        let (ready_tx, ready_rx) = std_mpsc::channel::<Result<u32, String>>();
        let (stop_tx, stop_rx) = std_mpsc::channel::<()>();

        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || match build() {
                Ok((stream, rate)) => {
                    let _ = ready_tx.send(Ok(rate));
                    // Returns on close() or when the handle is dropped
                    let _ = stop_rx.recv();
                    drop(stream);
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                }
            })
            .map_err(|e| VoiceError::DeviceAcquisition(e.to_string()))?;

        let rate = ready_rx
            .recv()
            .map_err(|_| VoiceError::DeviceAcquisition(format!("{name} thread exited")))?
            .map_err(VoiceError::DeviceAcquisition)?;

        Ok((
            Self {
                stop: Some(stop_tx),
                handle: Some(handle),
            },
            rate,
        ))
    }

    fn close(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            error!("Audio stream thread panicked");
        }
    }
}

impl Drop for StreamThread {
    fn drop(&mut self) {
        self.close();
    }
}

/// Default microphone delivering mono blocks at the requested rate.
pub struct CpalInput {
    thread: StreamThread,
    sample_rate: u32,
}

impl CpalInput {
    fn open(sample_rate: u32, blocks: mpsc::Sender<Vec<f32>>) -> VoiceResult<Self> {
        let (thread, device_rate) = StreamThread::spawn("voice-capture", move || {
            let host = cpal::default_host();
            let device = host
                .default_input_device()
                .ok_or_else(|| "no input device available".to_string())?;

            let config = match device.supported_input_configs() {
                Ok(configs) => pick_config(configs, sample_rate),
                Err(e) => return Err(e.to_string()),
            };
            let config = match config {
                Some(config) => config,
                // Fall back to the device default and resample in the callback
                None => device
                    .default_input_config()
                    .map_err(|e| e.to_string())?
                    .config(),
            };

            let channels = config.channels as usize;
            let device_rate = config.sample_rate.0;

            info!(
                device = device.name().unwrap_or_default(),
                device_rate,
                target_rate = sample_rate,
                channels,
                "Opening microphone"
            );

            let stream = device
                .build_input_stream(
                    &config,
                    move |data: &[f32], _: &cpal::InputCallbackInfo| {
                        let mono = downmix_to_mono(data, channels);
                        let block = resample_linear(&mono, device_rate, sample_rate);
                        if blocks.try_send(block).is_err() {
                            trace!("Capture block dropped, session not keeping up");
                        }
                    },
                    |err| {
                        error!(error = %err, "Audio capture error");
                    },
                    None,
                )
                .map_err(|e| e.to_string())?;
            stream.play().map_err(|e| e.to_string())?;

            Ok((stream, device_rate))
        })?;

        debug!(device_rate, sample_rate, "Microphone stream running");

        Ok(Self {
            thread,
            sample_rate,
        })
    }
}

impl AudioInput for CpalInput {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn close(&mut self) {
        self.thread.close();
    }
}

struct Voice {
    handle: PlaybackHandle,
    start_frame: u64,
    samples: Vec<f32>,
    position: usize,
}

/// Sums scheduled voices against a frame clock advanced by the render callback.
#[derive(Default)]
struct Mixer {
    clock: u64,
    next_handle: u64,
    voices: Vec<Voice>,
}

impl Mixer {
    /// Renders `frames` mono frames into `out`, returning handles that finished.
    fn render(&mut self, out: &mut [f32]) -> Vec<PlaybackHandle> {
        out.fill(0.0);
        let block_start = self.clock;
        let block_end = block_start + out.len() as u64;

        for voice in &mut self.voices {
            if voice.start_frame >= block_end {
                continue;
            }
            let offset = voice.start_frame.saturating_sub(block_start) as usize;
            let available = voice.samples.len() - voice.position;
            let count = (out.len() - offset).min(available);
            for (slot, sample) in out[offset..offset + count]
                .iter_mut()
                .zip(&voice.samples[voice.position..voice.position + count])
            {
                *slot += sample;
            }
            voice.position += count;
        }

        self.clock = block_end;

        let mut finished = Vec::new();
        self.voices.retain(|voice| {
            if voice.position >= voice.samples.len() {
                finished.push(voice.handle);
                false
            } else {
                true
            }
        });
        finished
    }
}

/// Default speaker with a software mixer for scheduled chunks.
pub struct CpalOutput {
    thread: StreamThread,
    mixer: Arc<Mutex<Mixer>>,
    sample_rate: u32,
}

impl CpalOutput {
    fn open(
        sample_rate: u32,
        ended: mpsc::UnboundedSender<PlaybackHandle>,
        meter: LevelMeter,
    ) -> VoiceResult<Self> {
        let mixer = Arc::new(Mutex::new(Mixer::default()));
        let render_mixer = mixer.clone();

        let (thread, device_rate) = StreamThread::spawn("voice-playback", move || {
            let host = cpal::default_host();
            let device = host
                .default_output_device()
                .ok_or_else(|| "no output device available".to_string())?;

            let config = match device.supported_output_configs() {
                Ok(configs) => pick_config(configs, sample_rate),
                Err(e) => return Err(e.to_string()),
            };
            let config = match config {
                Some(config) => config,
                // Chunks get resampled to whatever the device runs at
                None => device
                    .default_output_config()
                    .map_err(|e| e.to_string())?
                    .config(),
            };

            let channels = config.channels as usize;
            let device_rate = config.sample_rate.0;

            info!(
                device = device.name().unwrap_or_default(),
                device_rate,
                channels,
                "Opening speaker"
            );

            let mut mono = Vec::new();
            let stream = device
                .build_output_stream(
                    &config,
                    move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                        mono.resize(data.len() / channels, 0.0);
                        let finished = render_mixer.lock().render(&mut mono);
                        for (frame, sample) in data.chunks_mut(channels).zip(&mono) {
                            frame.fill(*sample);
                        }
                        meter.set_output(rms(&mono));
                        for handle in finished {
                            let _ = ended.send(handle);
                        }
                    },
                    |err| {
                        error!(error = %err, "Audio playback error");
                    },
                    None,
                )
                .map_err(|e| e.to_string())?;
            stream.play().map_err(|e| e.to_string())?;

            Ok((stream, device_rate))
        })?;

        if device_rate != sample_rate {
            warn!(
                device_rate,
                sample_rate, "Speaker does not support the provider rate, resampling"
            );
        }

        Ok(Self {
            thread,
            mixer,
            sample_rate: device_rate,
        })
    }
}

impl AudioOutput for CpalOutput {
    fn current_time(&self) -> f64 {
        self.mixer.lock().clock as f64 / self.sample_rate as f64
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn schedule(&mut self, samples: Vec<f32>, start_at: f64) -> PlaybackHandle {
        let mut mixer = self.mixer.lock();
        mixer.next_handle += 1;
        let handle = PlaybackHandle(mixer.next_handle);
        let start_frame = (start_at * self.sample_rate as f64).round().max(0.0) as u64;
        // Something scheduled in the past starts on the next rendered block
        let start_frame = start_frame.max(mixer.clock);
        mixer.voices.push(Voice {
            handle,
            start_frame,
            samples,
            position: 0,
        });
        handle
    }

    fn stop(&mut self, handle: PlaybackHandle) {
        self.mixer.lock().voices.retain(|voice| voice.handle != handle);
    }

    fn close(&mut self) {
        self.mixer.lock().voices.clear();
        self.thread.close();
    }
}
