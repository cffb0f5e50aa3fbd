//! WebSocket transport shared by every provider.
//!
//! One connection task owns the socket. Outbound text goes through a bounded
//! channel; inbound frames come back as [`TransportEvent`]s in arrival order.
//! There is no reconnection: once the socket closes the transport is done and
//! a new session has to connect again.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use super::base::{RealtimeError, RealtimeResult};

/// Channel capacity for outbound messages (audio frames and control events).
const WS_CHANNEL_CAPACITY: usize = 256;

/// Channel capacity for inbound messages waiting for the session.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// How long `close()` waits for the socket to shut down cleanly.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Something that happened on the connection.
#[derive(Debug)]
pub enum TransportEvent {
    /// A text frame, or a binary frame holding UTF-8 JSON
    Message(String),
    /// The peer closed the connection, with its reason if it gave one
    Closed(Option<String>),
    /// The connection failed
    Error(RealtimeError),
}

/// Installs the ring crypto provider for rustls if none is installed yet.
pub fn ensure_crypto_provider() {
    // Fails only when a provider is already installed
    let _ = rustls::crypto::ring::default_provider().install_default();
}

/// An open provider connection.
pub struct Transport {
    outbound: mpsc::Sender<String>,
    events: mpsc::Receiver<TransportEvent>,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl Transport {
    /// Connects and sends `handshake` as the very first frame.
    pub async fn connect(request: http::Request<()>, handshake: String) -> RealtimeResult<Self> {
        ensure_crypto_provider();

        let uri = request.uri().clone();
        let (ws_stream, _response) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(|e| RealtimeError::ConnectionFailed(e.to_string()))?;

        info!(host = uri.host().unwrap_or_default(), "Connected to realtime provider");

        let (mut ws_sink, mut ws_stream) = ws_stream.split();

        ws_sink
            .send(Message::Text(handshake.into()))
            .await
            .map_err(|e| RealtimeError::WebSocketError(e.to_string()))?;

        let (tx, mut rx) = mpsc::channel::<String>(WS_CHANNEL_CAPACITY);
        let (event_tx, event_rx) = mpsc::channel::<TransportEvent>(EVENT_CHANNEL_CAPACITY);
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => {
                        debug!("Closing provider connection");
                        let _ = ws_sink.send(Message::Close(None)).await;
                        let _ = ws_sink.close().await;
                        break;
                    }

                    // Handle outgoing messages
                    Some(text) = rx.recv() => {
                        if let Err(e) = ws_sink.send(Message::Text(text.into())).await {
                            error!("Failed to send WebSocket message: {}", e);
                            let _ = event_tx
                                .send(TransportEvent::Error(RealtimeError::WebSocketError(e.to_string())))
                                .await;
                            break;
                        }
                    }

                    // Handle incoming messages
                    msg = ws_stream.next() => {
                        let event = match msg {
                            Some(Ok(Message::Text(text))) => TransportEvent::Message(text.as_str().to_owned()),
                            Some(Ok(Message::Binary(data))) => match String::from_utf8(data.to_vec()) {
                                Ok(text) => TransportEvent::Message(text),
                                Err(_) => {
                                    warn!("Ignoring non UTF-8 binary frame ({} bytes)", data.len());
                                    continue;
                                }
                            },
                            Some(Ok(Message::Ping(data))) => {
                                if let Err(e) = ws_sink.send(Message::Pong(data)).await {
                                    error!("Failed to send pong: {}", e);
                                }
                                continue;
                            }
                            Some(Ok(Message::Close(frame))) => {
                                info!("WebSocket closed by server");
                                let reason = frame
                                    .map(|f| format!("{} {}", u16::from(f.code), f.reason.as_str()))
                                    .filter(|r| !r.trim().is_empty());
                                let _ = event_tx.send(TransportEvent::Closed(reason)).await;
                                break;
                            }
                            Some(Ok(_)) => continue,
                            Some(Err(e)) => {
                                error!("WebSocket error: {}", e);
                                let _ = event_tx
                                    .send(TransportEvent::Error(RealtimeError::WebSocketError(e.to_string())))
                                    .await;
                                break;
                            }
                            None => {
                                let _ = event_tx.send(TransportEvent::Closed(None)).await;
                                break;
                            }
                        };

                        if event_tx.send(event).await.is_err() {
                            // Session is gone
                            break;
                        }
                    }
                }
            }
        });

        Ok(Self {
            outbound: tx,
            events: event_rx,
            shutdown: Some(shutdown_tx),
            task: Some(task),
        })
    }

    /// Queues a control message, waiting for channel capacity.
    pub async fn send(&self, text: String) -> RealtimeResult<()> {
        self.outbound
            .send(text)
            .await
            .map_err(|_| RealtimeError::NotConnected)
    }

    /// Queues a live audio frame without waiting.
    ///
    /// Returns `Ok(false)` when the frame was dropped because the socket is
    /// not keeping up.
    pub fn send_audio(&self, text: String) -> RealtimeResult<bool> {
        match self.outbound.try_send(text) {
            Ok(()) => Ok(true),
            Err(mpsc::error::TrySendError::Full(_)) => Ok(false),
            Err(mpsc::error::TrySendError::Closed(_)) => Err(RealtimeError::NotConnected),
        }
    }

    /// Next inbound event; `None` once the connection task has finished and
    /// every event has been consumed.
    pub async fn next_event(&mut self) -> Option<TransportEvent> {
        self.events.recv().await
    }

    /// Closes the socket. Idempotent.
    pub async fn close(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(task) = self.task.take() {
            match tokio::time::timeout(CLOSE_TIMEOUT, task).await {
                Ok(_) => debug!("Provider connection closed"),
                Err(_) => warn!("Timed out closing provider connection"),
            }
        }
        self.events.close();
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
