//! Mock Realtime Provider Server
//!
//! A local WebSocket server standing in for the OpenAI Realtime and Gemini
//! Live endpoints. It records every text frame the client sends and lets the
//! test push scripted server events or close the connection at any point.
//! Connections are served one after another, so a session can be restarted
//! against the same server.

// Not every test uses every helper
#![allow(dead_code)]

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;

/// How long helpers wait for the client before giving up.
pub const RECEIVE_TIMEOUT: Duration = Duration::from_secs(3);

/// Something the test wants the server to do.
enum ServerAction {
    Send(String),
    Close(String),
}

/// Scripted realtime provider.
pub struct MockRealtimeServer {
    url: String,
    actions: mpsc::UnboundedSender<ServerAction>,
    received: mpsc::UnboundedReceiver<String>,
    connections: mpsc::UnboundedReceiver<String>,
    task: JoinHandle<()>,
}

impl MockRealtimeServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind mock server");
        let addr = listener.local_addr().expect("Failed to get local address");

        let (action_tx, mut action_rx) = mpsc::unbounded_channel::<ServerAction>();
        let (received_tx, received_rx) = mpsc::unbounded_channel::<String>();
        let (connection_tx, connection_rx) = mpsc::unbounded_channel::<String>();

        let task = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let mut uri = String::new();
                let callback = |request: &Request, response: Response| {
                    uri = request.uri().to_string();
                    Ok::<_, ErrorResponse>(response)
                };
                let Ok(ws) = accept_hdr_async(stream, callback).await else {
                    continue;
                };
                let _ = connection_tx.send(uri);
                let (mut write, mut read) = ws.split();

                loop {
                    tokio::select! {
                        msg = read.next() => match msg {
                            Some(Ok(Message::Text(text))) => {
                                let _ = received_tx.send(text.as_str().to_owned());
                            }
                            Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                            Some(Ok(_)) => {}
                        },
                        action = action_rx.recv() => match action {
                            Some(ServerAction::Send(text)) => {
                                if write.send(Message::Text(text.into())).await.is_err() {
                                    break;
                                }
                            }
                            Some(ServerAction::Close(reason)) => {
                                let frame = CloseFrame {
                                    code: CloseCode::Away,
                                    reason: reason.into(),
                                };
                                let _ = write.send(Message::Close(Some(frame))).await;
                                break;
                            }
                            None => return,
                        },
                    }
                }
            }
        });

        Self {
            url: format!("ws://{addr}"),
            actions: action_tx,
            received: received_rx,
            connections: connection_rx,
            task,
        }
    }

    /// Endpoint to put into `ProviderConfig::endpoint`.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Pushes one server event to the connected client.
    pub fn send_json(&self, value: Value) {
        let _ = self.actions.send(ServerAction::Send(value.to_string()));
    }

    /// Closes the current connection from the server side.
    pub fn close(&self, reason: &str) {
        let _ = self.actions.send(ServerAction::Close(reason.to_string()));
    }

    /// Request URI (path and query) of the next accepted connection.
    pub async fn next_connection(&mut self) -> Option<String> {
        tokio::time::timeout(RECEIVE_TIMEOUT, self.connections.recv())
            .await
            .ok()
            .flatten()
    }

    /// Next text frame sent by the client, parsed as JSON.
    pub async fn next_message(&mut self) -> Option<Value> {
        let text = tokio::time::timeout(RECEIVE_TIMEOUT, self.received.recv())
            .await
            .ok()
            .flatten()?;
        serde_json::from_str(&text).ok()
    }

    /// Skips client frames until one matches `predicate`.
    pub async fn wait_for<F>(&mut self, predicate: F) -> Option<Value>
    where
        F: Fn(&Value) -> bool,
    {
        loop {
            let message = self.next_message().await?;
            if predicate(&message) {
                return Some(message);
            }
        }
    }

    /// Skips client frames until one has the given OpenAI event `type`.
    pub async fn wait_for_type(&mut self, event_type: &str) -> Option<Value> {
        self.wait_for(|message| message["type"] == event_type).await
    }

    /// Every frame received so far that has not been consumed yet.
    pub fn drain(&mut self) -> Vec<Value> {
        let mut messages = Vec::new();
        while let Ok(text) = self.received.try_recv() {
            if let Ok(value) = serde_json::from_str(&text) {
                messages.push(value);
            }
        }
        messages
    }
}

impl Drop for MockRealtimeServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

// =============================================================================
// Scripted server events
// =============================================================================

pub mod openai {
    use base64::prelude::*;
    use serde_json::{Value, json};

    pub fn session_created() -> Value {
        json!({"type": "session.created", "session": {"id": "sess_mock"}})
    }

    pub fn speech_started() -> Value {
        json!({"type": "input_audio_buffer.speech_started", "audio_start_ms": 100})
    }

    pub fn speech_stopped() -> Value {
        json!({"type": "input_audio_buffer.speech_stopped", "audio_end_ms": 900})
    }

    pub fn response_created() -> Value {
        json!({"type": "response.created", "response": {"id": "resp_mock"}})
    }

    /// `samples` 16-bit samples of silence at the output rate.
    pub fn audio_delta(samples: usize) -> Value {
        let pcm = vec![0u8; samples * 2];
        json!({"type": "response.output_audio.delta", "delta": BASE64_STANDARD.encode(pcm)})
    }

    pub fn transcript_delta(text: &str) -> Value {
        json!({"type": "response.output_audio_transcript.delta", "delta": text})
    }

    pub fn input_transcription_completed(text: &str) -> Value {
        json!({
            "type": "conversation.item.input_audio_transcription.completed",
            "transcript": text
        })
    }

    pub fn response_done() -> Value {
        json!({"type": "response.done", "response": {"status": "completed"}})
    }

    pub fn error(message: &str) -> Value {
        json!({"type": "error", "error": {"type": "invalid_request_error", "message": message}})
    }
}

pub mod gemini {
    use base64::prelude::*;
    use serde_json::{Value, json};

    pub fn setup_complete() -> Value {
        json!({"setupComplete": {}})
    }

    /// `samples` 16-bit samples of silence at 24kHz.
    pub fn audio(samples: usize) -> Value {
        let pcm = vec![0u8; samples * 2];
        json!({
            "serverContent": {
                "modelTurn": {
                    "parts": [{
                        "inlineData": {
                            "mimeType": "audio/pcm;rate=24000",
                            "data": BASE64_STANDARD.encode(pcm)
                        }
                    }]
                }
            }
        })
    }

    pub fn output_transcription(text: &str) -> Value {
        json!({"serverContent": {"outputTranscription": {"text": text}}})
    }

    pub fn interrupted() -> Value {
        json!({"serverContent": {"interrupted": true}})
    }

    pub fn turn_complete() -> Value {
        json!({"serverContent": {"turnComplete": true}})
    }
}
