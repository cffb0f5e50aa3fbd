//! OpenAI Realtime protocol adapter.
//!
//! Server-side VAD, 24kHz PCM16 in both directions, Bearer authentication.

use base64::prelude::*;
use bytes::Bytes;
use http::HeaderValue;
use http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tracing::{debug, trace, warn};
use url::Url;

use super::config::{OPENAI_REALTIME_SAMPLE_RATE, OpenAIRealtimeConfig};
use super::messages::{
    AudioConfig, AudioFormat, AudioInputConfig, AudioOutputConfig, ClientEvent,
    InputAudioTranscription, ServerEvent, SessionConfig, TurnDetection,
};
use crate::core::realtime::{
    AudioChunk, ProviderAdapter, ProviderConfig, ProviderEvent, RealtimeError, RealtimeResult,
    TranscriptRole, TurnDetectionMode,
};

/// Error code returned when cancelling while no response is in flight.
const CANCEL_NOT_ACTIVE: &str = "response_cancel_not_active";

/// Adapter for the OpenAI Realtime API.
#[derive(Debug, Clone)]
pub struct OpenAIRealtimeAdapter {
    config: OpenAIRealtimeConfig,
}

impl OpenAIRealtimeAdapter {
    pub fn new(config: &ProviderConfig) -> RealtimeResult<Self> {
        let config = OpenAIRealtimeConfig::from(config);
        Url::parse(&config.endpoint).map_err(|e| {
            RealtimeError::InvalidConfiguration(format!("invalid endpoint {}: {e}", config.endpoint))
        })?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &OpenAIRealtimeConfig {
        &self.config
    }

    fn build_ws_url(&self) -> RealtimeResult<Url> {
        let mut url = Url::parse(&self.config.endpoint)
            .map_err(|e| RealtimeError::InvalidConfiguration(e.to_string()))?;
        url.query_pairs_mut().append_pair("model", &self.config.model);
        Ok(url)
    }

    fn session_config(&self) -> SessionConfig {
        let vad = self.config.turn_detection;
        SessionConfig {
            session_type: "realtime".to_string(),
            output_modalities: vec!["audio".to_string()],
            instructions: self.config.instructions.clone(),
            audio: AudioConfig {
                input: AudioInputConfig {
                    format: AudioFormat::pcm(OPENAI_REALTIME_SAMPLE_RATE),
                    transcription: Some(InputAudioTranscription {
                        model: self.config.transcription_model.clone(),
                    }),
                    turn_detection: TurnDetection::ServerVad {
                        threshold: vad.threshold,
                        prefix_padding_ms: vad.prefix_padding_ms,
                        silence_duration_ms: vad.silence_duration_ms,
                        create_response: vad.create_response,
                    },
                },
                output: AudioOutputConfig {
                    voice: self.config.voice.clone(),
                    format: AudioFormat::pcm(OPENAI_REALTIME_SAMPLE_RATE),
                },
            },
        }
    }

    /// Maps one parsed server event onto shared events.
    fn map_event(event: ServerEvent) -> Vec<ProviderEvent> {
        match event {
            ServerEvent::SessionCreated | ServerEvent::SessionUpdated => {
                vec![ProviderEvent::SetupAcknowledged]
            }
            ServerEvent::SpeechStarted => vec![ProviderEvent::SpeechStarted],
            ServerEvent::SpeechStopped => vec![ProviderEvent::SpeechStopped],
            ServerEvent::ResponseCreated => vec![ProviderEvent::ResponseStarted],

            ServerEvent::AudioDelta { delta } => match BASE64_STANDARD.decode(&delta) {
                Ok(audio) => vec![ProviderEvent::AudioDelta(AudioChunk {
                    data: Bytes::from(audio),
                    sample_rate: OPENAI_REALTIME_SAMPLE_RATE,
                })],
                Err(e) => {
                    warn!("Dropping undecodable audio delta: {}", e);
                    Vec::new()
                }
            },

            ServerEvent::AudioTranscriptDelta { delta } => vec![ProviderEvent::TranscriptDelta {
                role: TranscriptRole::Assistant,
                text: delta,
            }],
            ServerEvent::InputTranscriptionDelta { delta } => {
                vec![ProviderEvent::TranscriptDelta {
                    role: TranscriptRole::User,
                    text: delta,
                }]
            }
            ServerEvent::InputTranscriptionCompleted { transcript } => {
                vec![ProviderEvent::TranscriptFinal {
                    role: TranscriptRole::User,
                    text: transcript,
                }]
            }

            ServerEvent::ResponseCancelled => vec![ProviderEvent::ResponseCancelled],
            ServerEvent::ResponseDone { response } => {
                if response.status.as_deref() == Some("failed") {
                    warn!(
                        "Response failed: {}",
                        response
                            .status_details
                            .map(|d| d.to_string())
                            .unwrap_or_default()
                    );
                } else {
                    debug!("Response done: {:?}", response.status);
                }
                vec![ProviderEvent::TurnComplete]
            }

            ServerEvent::Error { error } => {
                if error.code.as_deref() == Some(CANCEL_NOT_ACTIVE) {
                    debug!("Ignoring cancel for inactive response");
                    Vec::new()
                } else {
                    vec![ProviderEvent::FatalError(format!(
                        "{} ({})",
                        error.message,
                        error.code.unwrap_or(error.error_type)
                    ))]
                }
            }

            ServerEvent::Unknown => {
                trace!("Unhandled server event");
                Vec::new()
            }
        }
    }
}

impl ProviderAdapter for OpenAIRealtimeAdapter {
    fn name(&self) -> &'static str {
        "openai"
    }

    fn connect_request(&self, credential: &str) -> RealtimeResult<http::Request<()>> {
        if credential.is_empty() {
            return Err(RealtimeError::AuthenticationFailed(
                "API key is required".to_string(),
            ));
        }

        let url = self.build_ws_url()?;
        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|e| RealtimeError::ConnectionFailed(e.to_string()))?;

        let auth = HeaderValue::from_str(&format!("Bearer {credential}"))
            .map_err(|e| RealtimeError::AuthenticationFailed(e.to_string()))?;
        request.headers_mut().insert(AUTHORIZATION, auth);

        Ok(request)
    }

    fn handshake_message(&self) -> RealtimeResult<String> {
        Ok(ClientEvent::SessionUpdate {
            session: self.session_config(),
        }
        .to_json()?)
    }

    fn encode_audio_frame(&self, pcm: &[u8]) -> RealtimeResult<String> {
        Ok(ClientEvent::audio_append(pcm).to_json()?)
    }

    fn cancel_message(&self) -> Option<String> {
        ClientEvent::ResponseCancel.to_json().ok()
    }

    fn decode_event(&self, raw: &str) -> Vec<ProviderEvent> {
        match serde_json::from_str::<ServerEvent>(raw) {
            Ok(event) => Self::map_event(event),
            Err(e) => {
                warn!("Ignoring malformed server event: {}", e);
                Vec::new()
            }
        }
    }

    fn input_sample_rate(&self) -> u32 {
        OPENAI_REALTIME_SAMPLE_RATE
    }

    fn output_sample_rate(&self) -> u32 {
        OPENAI_REALTIME_SAMPLE_RATE
    }

    fn turn_detection(&self) -> TurnDetectionMode {
        TurnDetectionMode::Server
    }

    fn buffers_during_user_speech(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn adapter() -> OpenAIRealtimeAdapter {
        OpenAIRealtimeAdapter::new(&ProviderConfig {
            instructions: Some("Be brief.".to_string()),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_connect_request_carries_bearer_and_model() {
        let request = adapter().connect_request("sk-test").unwrap();
        assert_eq!(
            request.uri().to_string(),
            "wss://api.openai.com/v1/realtime?model=gpt-4o-realtime-preview"
        );
        assert_eq!(
            request.headers().get(AUTHORIZATION).unwrap(),
            "Bearer sk-test"
        );
    }

    #[test]
    fn test_connect_request_requires_key() {
        assert!(matches!(
            adapter().connect_request(""),
            Err(RealtimeError::AuthenticationFailed(_))
        ));
    }

    #[test]
    fn test_invalid_endpoint_rejected() {
        let result = OpenAIRealtimeAdapter::new(&ProviderConfig {
            endpoint: Some("not a url".to_string()),
            ..Default::default()
        });
        assert!(matches!(result, Err(RealtimeError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_handshake_shape() {
        let json: Value = serde_json::from_str(&adapter().handshake_message().unwrap()).unwrap();
        assert_eq!(json["type"], "session.update");
        let session = &json["session"];
        assert_eq!(session["type"], "realtime");
        assert_eq!(session["output_modalities"][0], "audio");
        assert_eq!(session["instructions"], "Be brief.");
        assert_eq!(session["audio"]["input"]["transcription"]["model"], "whisper-1");

        let vad = &session["audio"]["input"]["turn_detection"];
        assert_eq!(vad["type"], "server_vad");
        assert_eq!(vad["threshold"], 0.5);
        assert_eq!(vad["prefix_padding_ms"], 300);
        assert_eq!(vad["silence_duration_ms"], 1500);
        assert_eq!(vad["create_response"], true);

        let output = &session["audio"]["output"];
        assert_eq!(output["voice"], "alloy");
        assert_eq!(output["format"]["type"], "audio/pcm");
        assert_eq!(output["format"]["rate"], 24000);
    }

    #[test]
    fn test_handshake_sends_unlisted_voice() {
        let adapter = OpenAIRealtimeAdapter::new(&ProviderConfig {
            voice: Some("marin".to_string()),
            ..Default::default()
        })
        .unwrap();
        let json: Value = serde_json::from_str(&adapter.handshake_message().unwrap()).unwrap();
        assert_eq!(json["session"]["audio"]["output"]["voice"], "marin");
    }

    #[test]
    fn test_encode_audio_frame() {
        let json: Value =
            serde_json::from_str(&adapter().encode_audio_frame(&[1, 0, 2, 0]).unwrap()).unwrap();
        assert_eq!(json["type"], "input_audio_buffer.append");
        assert_eq!(json["audio"], BASE64_STANDARD.encode([1u8, 0, 2, 0]));
    }

    #[test]
    fn test_cancel_message() {
        assert_eq!(
            adapter().cancel_message().as_deref(),
            Some(r#"{"type":"response.cancel"}"#)
        );
    }

    #[test]
    fn test_decode_speech_and_response_events() {
        let adapter = adapter();
        assert_eq!(
            adapter.decode_event(r#"{"type":"input_audio_buffer.speech_started","audio_start_ms":10,"item_id":"i"}"#),
            vec![ProviderEvent::SpeechStarted]
        );
        assert_eq!(
            adapter.decode_event(r#"{"type":"input_audio_buffer.speech_stopped"}"#),
            vec![ProviderEvent::SpeechStopped]
        );
        assert_eq!(
            adapter.decode_event(r#"{"type":"response.created","response":{"id":"r"}}"#),
            vec![ProviderEvent::ResponseStarted]
        );
        assert_eq!(
            adapter.decode_event(r#"{"type":"response.done","response":{"status":"completed"}}"#),
            vec![ProviderEvent::TurnComplete]
        );
        assert_eq!(
            adapter.decode_event(r#"{"type":"response.cancelled"}"#),
            vec![ProviderEvent::ResponseCancelled]
        );
        assert_eq!(
            adapter.decode_event(r#"{"type":"session.created","session":{"id":"s"}}"#),
            vec![ProviderEvent::SetupAcknowledged]
        );
    }

    #[test]
    fn test_decode_audio_delta() {
        let delta = BASE64_STANDARD.encode([1u8, 0, 255, 255]);
        let events = adapter()
            .decode_event(&format!(r#"{{"type":"response.output_audio.delta","delta":"{delta}"}}"#));
        assert_eq!(
            events,
            vec![ProviderEvent::AudioDelta(AudioChunk {
                data: Bytes::from_static(&[1, 0, 255, 255]),
                sample_rate: 24000,
            })]
        );

        let bad = adapter().decode_event(r#"{"type":"response.audio.delta","delta":"@@@"}"#);
        assert!(bad.is_empty());
    }

    #[test]
    fn test_decode_transcripts() {
        let adapter = adapter();
        assert_eq!(
            adapter.decode_event(r#"{"type":"response.audio_transcript.delta","delta":"Hel"}"#),
            vec![ProviderEvent::TranscriptDelta {
                role: TranscriptRole::Assistant,
                text: "Hel".to_string()
            }]
        );
        assert_eq!(
            adapter.decode_event(
                r#"{"type":"conversation.item.input_audio_transcription.completed","transcript":"hi there"}"#
            ),
            vec![ProviderEvent::TranscriptFinal {
                role: TranscriptRole::User,
                text: "hi there".to_string()
            }]
        );
    }

    #[test]
    fn test_decode_errors() {
        let adapter = adapter();
        let benign = adapter.decode_event(
            r#"{"type":"error","error":{"type":"invalid_request_error","code":"response_cancel_not_active","message":"x"}}"#,
        );
        assert!(benign.is_empty());

        let fatal = adapter.decode_event(
            r#"{"type":"error","error":{"type":"server_error","message":"boom"}}"#,
        );
        assert_eq!(
            fatal,
            vec![ProviderEvent::FatalError("boom (server_error)".to_string())]
        );
    }

    #[test]
    fn test_unknown_and_malformed_ignored() {
        let adapter = adapter();
        assert!(adapter.decode_event(r#"{"type":"rate_limits.updated"}"#).is_empty());
        assert!(adapter.decode_event("not json").is_empty());
        assert!(adapter.decode_event(r#"{"no_type":true}"#).is_empty());
    }
}
