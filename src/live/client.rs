use std::time::Duration;

use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

use super::messages::{RealtimeInputMessage, ServerMessage, SetupMessage};
use super::session::{InboundEvent, LiveConfig, LiveSession, OutboundMessage, SessionTransport};
use crate::error::{VoiceError, VoiceResult};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Default bidirectional streaming endpoint
pub const DEFAULT_ENDPOINT: &str =
    "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent";

/// WebSocket transport for live sessions
pub struct LiveClient {
    handshake_timeout: Duration,
}

impl Default for LiveClient {
    fn default() -> Self {
        Self {
            handshake_timeout: Duration::from_secs(10),
        }
    }
}

impl LiveClient {
    pub fn new(handshake_timeout: Duration) -> Self {
        Self { handshake_timeout }
    }

    async fn open(&self, config: &LiveConfig) -> VoiceResult<Socket> {
        info!("Connecting live session to {} (voice {})", config.endpoint, config.voice);

        let (mut socket, _response) = connect_async(config.url())
            .await
            .map_err(|e| VoiceError::Connect(format!("WebSocket connect failed: {}", e)))?;

        let setup = serde_json::to_string(&SetupMessage::from_config(config))
            .map_err(|e| VoiceError::Connect(format!("failed to encode setup: {}", e)))?;

        socket
            .send(Message::Text(setup))
            .await
            .map_err(|e| VoiceError::Connect(format!("failed to send setup: {}", e)))?;

        tokio::time::timeout(self.handshake_timeout, await_setup_complete(&mut socket))
            .await
            .map_err(|_| VoiceError::Connect("timed out waiting for session setup".to_string()))??;

        Ok(socket)
    }
}

#[async_trait::async_trait]
impl SessionTransport for LiveClient {
    async fn connect(&self, config: &LiveConfig) -> VoiceResult<LiveSession> {
        let socket = self.open(config).await?;
        let session_id = uuid::Uuid::new_v4().to_string();
        let (write, read) = socket.split();

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        tokio::spawn(write_loop(write, outbound_rx, events_tx.clone()));
        let reader = tokio::spawn(read_loop(read, events_tx));

        info!("Live session {} established", session_id);

        Ok(LiveSession::new(session_id, outbound_tx, events_rx).with_tasks(vec![reader]))
    }

    fn name(&self) -> &str {
        "live WebSocket"
    }
}

async fn await_setup_complete(socket: &mut Socket) -> VoiceResult<()> {
    while let Some(message) = socket.next().await {
        let message = message.map_err(|e| VoiceError::Connect(format!("handshake failed: {}", e)))?;
        match message {
            Message::Close(frame) => {
                let reason = frame.map(|f| f.reason.to_string()).unwrap_or_default();
                return Err(VoiceError::Connect(format!("session refused: {}", reason)));
            }
            other => {
                if let Some(parsed) = parse_server_message(&other) {
                    if parsed.is_setup_complete() {
                        debug!("Live session setup complete");
                        return Ok(());
                    }
                }
            }
        }
    }
    Err(VoiceError::Connect("connection closed during handshake".to_string()))
}

fn parse_server_message(message: &Message) -> Option<ServerMessage> {
    let payload: &[u8] = match message {
        Message::Text(text) => text.as_bytes(),
        Message::Binary(bytes) => bytes,
        _ => return None,
    };

    match serde_json::from_slice::<ServerMessage>(payload) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            warn!("Failed to parse live session message: {}", e);
            None
        }
    }
}

/// Drain the outbound queue onto the socket, in submission order
async fn write_loop(
    mut write: SplitSink<Socket, Message>,
    mut outbound_rx: mpsc::UnboundedReceiver<OutboundMessage>,
    events_tx: mpsc::UnboundedSender<InboundEvent>,
) {
    while let Some(message) = outbound_rx.recv().await {
        match message {
            OutboundMessage::Frame(blob) => {
                let json = match serde_json::to_string(&RealtimeInputMessage::audio(blob)) {
                    Ok(json) => json,
                    Err(e) => {
                        error!("Failed to encode audio frame: {}", e);
                        continue;
                    }
                };
                if let Err(e) = write.send(Message::Text(json)).await {
                    error!("Failed to send audio frame: {}", e);
                    let _ = events_tx.send(InboundEvent::Error(format!("send failed: {}", e)));
                    return;
                }
            }
            OutboundMessage::Close => {
                if let Err(e) = write.send(Message::Close(None)).await {
                    debug!("Close frame not delivered: {}", e);
                }
                break;
            }
        }
    }
    let _ = write.close().await;
    debug!("Live session writer stopped");
}

async fn read_loop(mut read: SplitStream<Socket>, events_tx: mpsc::UnboundedSender<InboundEvent>) {
    while let Some(message) = read.next().await {
        match message {
            Ok(Message::Close(frame)) => {
                if let Some(frame) = frame {
                    info!("Live session closed by remote: {} {}", frame.code, frame.reason);
                }
                let _ = events_tx.send(InboundEvent::Closed);
                return;
            }
            Ok(other) => {
                let Some(parsed) = parse_server_message(&other) else {
                    continue;
                };
                if parsed.go_away.is_some() {
                    warn!("Live session will be terminated by the remote side soon");
                }
                for event in parsed.into_events() {
                    if events_tx.send(event).is_err() {
                        return;
                    }
                }
            }
            Err(e) => {
                error!("Live session receive failed: {}", e);
                let _ = events_tx.send(InboundEvent::Error(e.to_string()));
                return;
            }
        }
    }
    let _ = events_tx.send(InboundEvent::Closed);
}
