//! Gemini Live protocol adapter.
//!
//! Client-side VAD: the Live API never reports speech boundaries, so the
//! session derives them from microphone energy. Input is 16kHz, output 24kHz.
//! The API key travels as a query parameter and the setup message must be the
//! first frame on the socket.

use base64::prelude::*;
use bytes::Bytes;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tracing::{debug, warn};
use url::Url;

use super::config::{GEMINI_INPUT_SAMPLE_RATE, GEMINI_OUTPUT_SAMPLE_RATE, GeminiLiveConfig};
use super::messages::{
    Content, GenerationConfig, PrebuiltVoiceConfig, RealtimeInputMessage, ServerMessage, Setup,
    SetupMessage, SpeechConfig, VoiceConfig,
};
use crate::core::realtime::base::sample_rate_from_mime;
use crate::core::realtime::{
    AudioChunk, ProviderAdapter, ProviderConfig, ProviderEvent, RealtimeError, RealtimeResult,
    TranscriptRole, TurnDetectionMode,
};

/// Adapter for the Gemini Live API.
#[derive(Debug, Clone)]
pub struct GeminiLiveAdapter {
    config: GeminiLiveConfig,
}

impl GeminiLiveAdapter {
    pub fn new(config: &ProviderConfig) -> RealtimeResult<Self> {
        let config = GeminiLiveConfig::from(config);
        Url::parse(&config.endpoint).map_err(|e| {
            RealtimeError::InvalidConfiguration(format!("invalid endpoint {}: {e}", config.endpoint))
        })?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &GeminiLiveConfig {
        &self.config
    }

    fn setup_message(&self) -> SetupMessage {
        SetupMessage {
            setup: Setup {
                model: self.config.model.clone(),
                generation_config: GenerationConfig {
                    response_modalities: vec!["audio".to_string()],
                    speech_config: SpeechConfig {
                        voice_config: VoiceConfig {
                            prebuilt_voice_config: PrebuiltVoiceConfig {
                                voice_name: self.config.voice.clone(),
                            },
                        },
                    },
                },
                system_instruction: self.config.instructions.as_deref().map(Content::text),
            },
        }
    }

    fn map_message(message: ServerMessage) -> Vec<ProviderEvent> {
        let mut events = Vec::new();

        if message.setup_complete.is_some() {
            events.push(ProviderEvent::SetupAcknowledged);
        }

        if let Some(content) = message.server_content {
            let parts = content.model_turn.map(|turn| turn.parts).unwrap_or_default();
            for blob in parts.into_iter().filter_map(|part| part.inline_data) {
                if !blob.mime_type.starts_with("audio/pcm") {
                    debug!("Skipping non-audio inline data: {}", blob.mime_type);
                    continue;
                }
                match BASE64_STANDARD.decode(&blob.data) {
                    Ok(audio) => events.push(ProviderEvent::AudioDelta(AudioChunk {
                        data: Bytes::from(audio),
                        sample_rate: sample_rate_from_mime(&blob.mime_type)
                            .unwrap_or(GEMINI_OUTPUT_SAMPLE_RATE),
                    })),
                    Err(e) => warn!("Dropping undecodable audio part: {}", e),
                }
            }

            if let Some(text) = content.output_transcription.and_then(|t| t.text) {
                events.push(ProviderEvent::TranscriptDelta {
                    role: TranscriptRole::Assistant,
                    text,
                });
            }
            if let Some(text) = content.input_transcription.and_then(|t| t.text) {
                events.push(ProviderEvent::TranscriptDelta {
                    role: TranscriptRole::User,
                    text,
                });
            }
            if content.turn_complete {
                events.push(ProviderEvent::TurnComplete);
            }
            if content.interrupted {
                events.push(ProviderEvent::Interrupted);
            }
            if content.generation_complete {
                debug!("Generation complete");
            }
        }

        if let Some(tool_call) = message.tool_call {
            debug!("Ignoring tool call: {}", tool_call);
        }

        if let Some(go_away) = message.go_away {
            warn!("Server signaled disconnect: {}", go_away);
            events.push(ProviderEvent::GoAway);
        }

        events
    }
}

impl ProviderAdapter for GeminiLiveAdapter {
    fn name(&self) -> &'static str {
        "gemini"
    }

    fn connect_request(&self, credential: &str) -> RealtimeResult<http::Request<()>> {
        if credential.is_empty() {
            return Err(RealtimeError::AuthenticationFailed(
                "API key is required".to_string(),
            ));
        }

        let mut url = Url::parse(&self.config.endpoint)
            .map_err(|e| RealtimeError::InvalidConfiguration(e.to_string()))?;
        url.query_pairs_mut().append_pair("key", credential);

        url.as_str()
            .into_client_request()
            .map_err(|e| RealtimeError::ConnectionFailed(e.to_string()))
    }

    fn handshake_message(&self) -> RealtimeResult<String> {
        Ok(serde_json::to_string(&self.setup_message())?)
    }

    fn encode_audio_frame(&self, pcm: &[u8]) -> RealtimeResult<String> {
        Ok(serde_json::to_string(&RealtimeInputMessage::audio(
            pcm,
            GEMINI_INPUT_SAMPLE_RATE,
        ))?)
    }

    fn cancel_message(&self) -> Option<String> {
        // Interruption is driven by the audio stream itself
        None
    }

    fn decode_event(&self, raw: &str) -> Vec<ProviderEvent> {
        match serde_json::from_str::<ServerMessage>(raw) {
            Ok(message) => Self::map_message(message),
            Err(e) => {
                warn!("Ignoring malformed server message: {}", e);
                Vec::new()
            }
        }
    }

    fn input_sample_rate(&self) -> u32 {
        GEMINI_INPUT_SAMPLE_RATE
    }

    fn output_sample_rate(&self) -> u32 {
        GEMINI_OUTPUT_SAMPLE_RATE
    }

    fn turn_detection(&self) -> TurnDetectionMode {
        TurnDetectionMode::Client
    }

    fn buffers_during_user_speech(&self) -> bool {
        true
    }
}
