use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::info;

use crate::audio::EncodedBlob;
use crate::error::{VoiceError, VoiceResult};

/// Default prebuilt voice
pub const DEFAULT_VOICE: &str = "Kore";

/// Connect-time configuration for a live session
#[derive(Debug, Clone)]
pub struct LiveConfig {
    /// WebSocket endpoint
    pub endpoint: String,
    /// Model identifier, with or without the `models/` prefix
    pub model: String,
    /// API key appended as the `key` query parameter
    pub api_key: String,
    /// Prebuilt voice name
    pub voice: String,
    /// System behaviour instruction
    pub system_instruction: String,
    /// Request transcripts of the spoken reply
    pub output_transcription: bool,
}

impl LiveConfig {
    pub fn model_path(&self) -> String {
        if self.model.starts_with("models/") {
            self.model.clone()
        } else {
            format!("models/{}", self.model)
        }
    }

    /// Endpoint with credentials attached
    pub fn url(&self) -> String {
        if self.api_key.is_empty() {
            return self.endpoint.clone();
        }
        let separator = if self.endpoint.contains('?') { '&' } else { '?' };
        format!("{}{}key={}", self.endpoint, separator, self.api_key)
    }
}

/// Lifecycle of one transport session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    Idle,
    Connecting,
    Active,
    Closed,
    Error,
}

impl TransportState {
    pub fn is_terminal(self) -> bool {
        matches!(self, TransportState::Closed | TransportState::Error)
    }
}

/// Events delivered by the remote session
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    /// Synthesized speech (base64 PCM16)
    AudioChunk(EncodedBlob),
    /// Incremental transcript of the spoken reply
    TranscriptDelta(String),
    TurnComplete,
    /// The remote side cut its reply short (barge-in)
    Interrupted,
    Closed,
    Error(String),
}

/// Messages consumed by a transport's writer
#[derive(Debug)]
pub enum OutboundMessage {
    Frame(EncodedBlob),
    Close,
}

/// Connects live sessions
#[async_trait::async_trait]
pub trait SessionTransport: Send + Sync {
    /// Open a session. Fails with `VoiceError::Connect`; nothing stays
    /// open on failure.
    async fn connect(&self, config: &LiveConfig) -> VoiceResult<LiveSession>;

    fn name(&self) -> &str;
}

/// One open live session
///
/// Outbound frames go to a writer through an unbounded queue, so sending
/// never waits on the network. Inbound events arrive on `events`.
pub struct LiveSession {
    id: String,
    state: TransportState,
    outbound: mpsc::UnboundedSender<OutboundMessage>,
    events: mpsc::UnboundedReceiver<InboundEvent>,
    tasks: Vec<JoinHandle<()>>,
}

impl LiveSession {
    /// Wrap the channels of an already-connected transport
    pub fn new(
        id: String,
        outbound: mpsc::UnboundedSender<OutboundMessage>,
        events: mpsc::UnboundedReceiver<InboundEvent>,
    ) -> Self {
        Self {
            id,
            state: TransportState::Active,
            outbound,
            events,
            tasks: Vec::new(),
        }
    }

    /// Tie inbound tasks to the session; they are aborted on close or drop.
    /// Writers are not listed here: they exit once the outbound queue closes.
    pub fn with_tasks(mut self, tasks: Vec<JoinHandle<()>>) -> Self {
        self.tasks = tasks;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> TransportState {
        self.state
    }

    /// Queue one encoded frame. Only valid while active.
    pub fn send_frame(&self, blob: EncodedBlob) -> VoiceResult<()> {
        if self.state != TransportState::Active {
            return Err(VoiceError::Transport(format!(
                "cannot send on a {:?} session",
                self.state
            )));
        }
        self.outbound
            .send(OutboundMessage::Frame(blob))
            .map_err(|_| VoiceError::Transport("session writer has stopped".to_string()))
    }

    /// Next inbound event; `None` once the transport is gone
    pub async fn next_event(&mut self) -> Option<InboundEvent> {
        self.events.recv().await
    }

    /// Record a terminal state reported by the remote side
    pub fn mark(&mut self, state: TransportState) {
        if !self.state.is_terminal() {
            self.state = state;
        }
    }

    /// Close the session. A no-op when already closed.
    pub fn close(&mut self) {
        if self.state == TransportState::Closed {
            return;
        }
        if self.state == TransportState::Active {
            // The writer sends a close frame and exits on its own
            let _ = self.outbound.send(OutboundMessage::Close);
        }
        self.state = TransportState::Closed;
        self.events.close();
        for task in self.tasks.drain(..) {
            task.abort();
        }
        info!("Live session {} closed", self.id);
    }
}

impl Drop for LiveSession {
    fn drop(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}
