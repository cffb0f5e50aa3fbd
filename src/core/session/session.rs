//! A voice conversation with one provider.
//!
//! [`VoiceSession`] owns the credential and the presentation callbacks. Each
//! `start()` opens the speaker, the microphone and the provider connection
//! and hands them to a single actor task. The actor serialises everything
//! that can happen (provider messages, captured frames, playback completions,
//! timer expiries and the stop request) through one `select!` loop, so the
//! state machine never sees two inputs at once.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, error, info, info_span, warn};
use uuid::Uuid;
use zeroize::Zeroizing;

use super::callbacks::SessionCallbacks;
use super::machine::{
    DEFAULT_SILENCE_DEBOUNCE, DEFAULT_THINKING_DELAY, Effect, MachinePolicy, SessionView,
    SharedView, VoiceStateMachine,
};
use super::state::VoiceState;
use super::transcript::TranscriptAccumulator;
use crate::core::audio::{
    AudioDevices, CaptureConfig, CapturePipeline, DEFAULT_FRAME_SIZE, DEFAULT_SPEECH_THRESHOLD,
    InputProcessing, LevelMeter, PlaybackHandle, PlaybackScheduler,
};
use crate::core::realtime::{
    ProviderAdapter, RealtimeError, TranscriptRole, Transport, TransportEvent,
};
use crate::errors::{VoiceError, VoiceResult};

/// Timing and capture settings of a session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub silence_debounce: Duration,
    pub thinking_delay: Duration,
    /// Mean absolute amplitude above which a frame counts as speech
    pub speech_threshold: f32,
    /// Samples per captured frame
    pub frame_size: usize,
    pub processing: InputProcessing,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            silence_debounce: DEFAULT_SILENCE_DEBOUNCE,
            thinking_delay: DEFAULT_THINKING_DELAY,
            speech_threshold: DEFAULT_SPEECH_THRESHOLD,
            frame_size: DEFAULT_FRAME_SIZE,
            processing: InputProcessing::default(),
        }
    }
}

fn open_devices(
    devices: &dyn AudioDevices,
    output_rate: u32,
    ended: mpsc::UnboundedSender<PlaybackHandle>,
    capture_config: CaptureConfig,
    meter: LevelMeter,
) -> VoiceResult<(PlaybackScheduler, CapturePipeline)> {
    let playback = PlaybackScheduler::new(devices.open_output(output_rate, ended)?);
    // A failed microphone drops, and so closes, the speaker opened above
    let capture = CapturePipeline::start(devices, capture_config, meter)?;
    Ok((playback, capture))
}

/// Closes the microphone and the speaker off the async workers.
async fn release_devices(mut capture: CapturePipeline, playback: Option<PlaybackScheduler>) {
    let release = tokio::task::spawn_blocking(move || {
        capture.stop();
        if let Some(mut playback) = playback {
            playback.close();
        }
    });
    if let Err(e) = release.await {
        error!("Failed to release audio devices: {}", e);
    }
}

/// How a session task ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnd {
    /// `stop()` was called, or nothing was running
    Stopped,
    /// The connection, the microphone or the provider failed
    Failed(String),
}

struct RunningSession {
    id: Uuid,
    stop: Option<oneshot::Sender<()>>,
    task: JoinHandle<SessionEnd>,
}

/// One conversation, generic over the provider protocol.
pub struct VoiceSession<P: ProviderAdapter + 'static> {
    adapter: Arc<P>,
    config: SessionConfig,
    devices: Arc<dyn AudioDevices>,
    meter: LevelMeter,
    credential: Option<Zeroizing<String>>,
    callbacks: SessionCallbacks,
    view: SharedView,
    running: Option<RunningSession>,
}

impl<P: ProviderAdapter + 'static> VoiceSession<P> {
    pub fn new(adapter: P, config: SessionConfig, devices: Arc<dyn AudioDevices>) -> Self {
        Self {
            adapter: Arc::new(adapter),
            config,
            devices,
            meter: LevelMeter::new(),
            credential: None,
            callbacks: SessionCallbacks::default(),
            view: Arc::new(RwLock::new(SessionView::default())),
            running: None,
        }
    }

    /// Shares `meter` with the session instead of a private one.
    ///
    /// The device layer should write output levels into the same meter.
    pub fn with_level_meter(mut self, meter: LevelMeter) -> Self {
        self.meter = meter;
        self
    }

    /// Stores the provider credential used by the next `start()`.
    pub fn init(&mut self, credential: impl Into<String>) {
        self.credential = Some(Zeroizing::new(credential.into()));
    }

    // Callbacks take effect on the next `start()`.

    pub fn on_state_change<F>(&mut self, callback: F) -> &mut Self
    where
        F: Fn(VoiceState) + Send + Sync + 'static,
    {
        self.callbacks.on_state_change = Some(Arc::new(callback));
        self
    }

    pub fn on_error<F>(&mut self, callback: F) -> &mut Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.callbacks.on_error = Some(Arc::new(callback));
        self
    }

    pub fn on_status_update<F>(&mut self, callback: F) -> &mut Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.callbacks.on_status_update = Some(Arc::new(callback));
        self
    }

    pub fn on_transcript<F>(&mut self, callback: F) -> &mut Self
    where
        F: Fn(TranscriptRole, &str) + Send + Sync + 'static,
    {
        self.callbacks.on_transcript = Some(Arc::new(callback));
        self
    }

    pub fn state(&self) -> VoiceState {
        self.view.read().state
    }

    pub fn transcript(&self) -> TranscriptAccumulator {
        self.view.read().transcript.clone()
    }

    pub fn level_meter(&self) -> &LevelMeter {
        &self.meter
    }

    pub fn adapter(&self) -> &P {
        &self.adapter
    }

    /// Whether the session task is alive. Turns false on its own after a
    /// fatal error.
    pub fn is_running(&self) -> bool {
        self.running
            .as_ref()
            .is_some_and(|running| !running.task.is_finished())
    }

    pub fn session_id(&self) -> Option<Uuid> {
        self.running.as_ref().map(|running| running.id)
    }

    /// Opens the devices and the provider connection and starts the session.
    ///
    /// A no-op while already running. Failures are reported through
    /// `on_error` as well as returned; nothing stays open after a failure.
    pub async fn start(&mut self) -> VoiceResult<()> {
        if self.is_running() {
            debug!("Session already running");
            return Ok(());
        }
        // Reap a session that ended on its own
        self.stop().await;

        let id = Uuid::new_v4();
        let span = info_span!("voice_session", session_id = %id, provider = self.adapter.name());

        let (stop_tx, stop_rx) = oneshot::channel();
        match self.open().instrument(span.clone()).await {
            Ok(actor) => {
                let task = tokio::spawn(actor.run(stop_rx).instrument(span));
                self.running = Some(RunningSession {
                    id,
                    stop: Some(stop_tx),
                    task,
                });
                Ok(())
            }
            Err(e) => {
                let _enter = span.enter();
                error!("Failed to start voice session: {}", e);
                self.callbacks.error(&e.to_string());
                self.meter.reset();
                Err(e)
            }
        }
    }

    /// Ends the session. Idempotent and infallible.
    pub async fn stop(&mut self) {
        let Some(mut running) = self.running.take() else {
            return;
        };
        if let Some(stop) = running.stop.take() {
            let _ = stop.send(());
        }
        if let Err(e) = running.task.await {
            warn!(session_id = %running.id, "Session task ended abnormally: {}", e);
            self.view.write().state = VoiceState::AtRest;
        }
    }

    /// Waits until the running session ends on its own.
    ///
    /// Resolves at once with [`SessionEnd::Stopped`] when nothing is running.
    /// Cancel safe, so it can race a shutdown signal in `select!`.
    pub async fn wait_ended(&mut self) -> SessionEnd {
        let Some(running) = self.running.as_mut() else {
            return SessionEnd::Stopped;
        };
        let end = match (&mut running.task).await {
            Ok(end) => end,
            Err(e) => {
                warn!(session_id = %running.id, "Session task ended abnormally: {}", e);
                self.view.write().state = VoiceState::AtRest;
                SessionEnd::Failed(format!("Session task ended abnormally: {e}"))
            }
        };
        self.running = None;
        end
    }

    async fn open(&self) -> VoiceResult<SessionActor<P>> {
        let credential = match &self.credential {
            Some(credential) if !credential.is_empty() => credential,
            _ => return Err(VoiceError::MissingCredential(self.adapter.name().to_string())),
        };

        let request = self.adapter.connect_request(credential)?;
        let handshake = self.adapter.handshake_message()?;

        {
            let mut view = self.view.write();
            view.state = VoiceState::AtRest;
            view.transcript.clear();
        }

        let (ended_tx, ended_rx) = mpsc::unbounded_channel();
        let capture_config = CaptureConfig {
            sample_rate: self.adapter.input_sample_rate(),
            frame_size: self.config.frame_size,
            speech_threshold: self.config.speech_threshold,
            processing: self.config.processing,
        };

        // Device backends block until their stream threads are up
        let (playback, capture) = tokio::task::spawn_blocking({
            let devices = self.devices.clone();
            let output_rate = self.adapter.output_sample_rate();
            let meter = self.meter.clone();
            move || open_devices(&*devices, output_rate, ended_tx, capture_config, meter)
        })
        .await
        .map_err(|e| VoiceError::DeviceAcquisition(format!("device task failed: {e}")))??;

        self.callbacks.status("connecting");
        let transport = match Transport::connect(request, handshake).await {
            Ok(transport) => transport,
            Err(e) => {
                release_devices(capture, Some(playback)).await;
                return Err(e.into());
            }
        };
        info!("Voice session connected");
        self.callbacks.status("connected");

        let policy = MachinePolicy::for_adapter(
            &*self.adapter,
            self.config.silence_debounce,
            self.config.thinking_delay,
        );
        let mut machine = VoiceStateMachine::new(policy, self.callbacks.clone(), self.view.clone());
        machine.attach_playback(playback);

        Ok(SessionActor {
            adapter: self.adapter.clone(),
            machine,
            transport,
            capture,
            ended: ended_rx,
            meter: self.meter.clone(),
            dropped_frames: 0,
        })
    }
}

impl<P: ProviderAdapter + 'static> Drop for VoiceSession<P> {
    fn drop(&mut self) {
        if let Some(running) = self.running.take() {
            running.task.abort();
        }
    }
}

struct SessionActor<P: ProviderAdapter + 'static> {
    adapter: Arc<P>,
    machine: VoiceStateMachine,
    transport: Transport,
    capture: CapturePipeline,
    ended: mpsc::UnboundedReceiver<PlaybackHandle>,
    meter: LevelMeter,
    dropped_frames: u64,
}

impl<P: ProviderAdapter + 'static> SessionActor<P> {
    async fn run(mut self, mut stop: oneshot::Receiver<()>) -> SessionEnd {
        let exit = loop {
            tokio::select! {
                _ = &mut stop => break SessionEnd::Stopped,

                event = self.transport.next_event() => {
                    if let Some(exit) = self.on_transport_event(event) {
                        break exit;
                    }
                }

                frame = self.capture.next_frame() => match frame {
                    Some(frame) => {
                        self.machine.on_capture_frame(&frame);
                        if let Err(e) = self.forward_frame(&frame.pcm) {
                            break SessionEnd::Failed(e.to_string());
                        }
                    }
                    None => break SessionEnd::Failed("Microphone stream ended".to_string()),
                },

                Some(handle) = self.ended.recv() => self.machine.on_playback_ended(handle),

                kind = self.machine.next_timer() => self.machine.on_timer(kind),
            }

            if let Some(exit) = self.apply_effects().await {
                break exit;
            }
        };

        let playback = self.machine.detach_playback();
        match &exit {
            SessionEnd::Stopped => {
                info!("Stopping voice session");
                self.machine.teardown();
            }
            SessionEnd::Failed(message) => {
                error!("Voice session failed: {}", message);
                self.machine.fail(message);
            }
        }

        release_devices(self.capture, playback).await;
        self.transport.close().await;
        self.meter.reset();
        if self.dropped_frames > 0 {
            info!(dropped_frames = self.dropped_frames, "Voice session closed");
        } else {
            info!("Voice session closed");
        }
        exit
    }

    fn on_transport_event(&mut self, event: Option<TransportEvent>) -> Option<SessionEnd> {
        match event {
            Some(TransportEvent::Message(raw)) => {
                for event in self.adapter.decode_event(&raw) {
                    self.machine.handle_event(event);
                }
                None
            }
            Some(TransportEvent::Closed(reason)) => {
                let reason = reason.unwrap_or_else(|| "no reason given".to_string());
                Some(SessionEnd::Failed(
                    RealtimeError::ConnectionClosed(reason).to_string(),
                ))
            }
            Some(TransportEvent::Error(e)) => Some(SessionEnd::Failed(e.to_string())),
            None => Some(SessionEnd::Failed(
                RealtimeError::ConnectionClosed("transport ended".to_string()).to_string(),
            )),
        }
    }

    /// Sends one captured frame upstream, dropping it if the socket is behind.
    fn forward_frame(&mut self, pcm: &[u8]) -> Result<(), RealtimeError> {
        let message = match self.adapter.encode_audio_frame(pcm) {
            Ok(message) => message,
            Err(e) => {
                warn!("Failed to encode audio frame: {}", e);
                return Ok(());
            }
        };
        if !self.transport.send_audio(message)? {
            self.dropped_frames += 1;
            warn!(dropped_frames = self.dropped_frames, "Transport busy, dropped audio frame");
        }
        Ok(())
    }

    async fn apply_effects(&mut self) -> Option<SessionEnd> {
        for effect in self.machine.take_effects() {
            match effect {
                Effect::Send(text) => {
                    if let Err(e) = self.transport.send(text).await {
                        return Some(SessionEnd::Failed(e.to_string()));
                    }
                }
                Effect::Fatal(message) => {
                    return Some(SessionEnd::Failed(
                        RealtimeError::ProviderError(message).to_string(),
                    ));
                }
            }
        }
        None
    }
}
