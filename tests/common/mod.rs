// Test doubles shared by the integration tests
//
// - RecordingOutput: manual clock, records play/stop calls
// - ScriptedCapture: capture backend fed by the test
// - ScriptedTransport: live sessions whose channels the test holds
// - TestDevices: hands out the doubles above

#![allow(dead_code)]

use std::sync::Arc;

use cognitive_companion::audio::{AudioBackend, AudioFrame, PcmBuffer};
use cognitive_companion::error::{VoiceError, VoiceResult};
use cognitive_companion::live::{InboundEvent, LiveConfig, LiveSession, OutboundMessage, SessionTransport};
use cognitive_companion::playback::{AudioOutput, BufferId};
use cognitive_companion::session::AudioDevices;
use parking_lot::Mutex;
use tokio::sync::{mpsc, Notify};

// ============================================================================
// Output
// ============================================================================

#[derive(Debug, Default)]
pub struct OutputLog {
    pub now: f64,
    pub played: Vec<(BufferId, f64, f64)>,
    pub stopped: Vec<(BufferId, f64)>,
    pub closed: usize,
}

/// Output device with a clock the test advances by hand
#[derive(Clone, Default)]
pub struct RecordingOutput {
    pub log: Arc<Mutex<OutputLog>>,
}

impl RecordingOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_now(&self, now: f64) {
        self.log.lock().now = now;
    }

    pub fn played(&self) -> Vec<(BufferId, f64, f64)> {
        self.log.lock().played.clone()
    }

    pub fn stopped_ids(&self) -> Vec<BufferId> {
        self.log.lock().stopped.iter().map(|(id, _)| *id).collect()
    }
}

impl AudioOutput for RecordingOutput {
    fn now(&self) -> f64 {
        self.log.lock().now
    }

    fn play(&mut self, id: BufferId, buffer: &PcmBuffer, start_at: f64) {
        self.log.lock().played.push((id, start_at, buffer.duration_secs()));
    }

    fn stop(&mut self, id: BufferId) {
        let mut log = self.log.lock();
        let now = log.now;
        log.stopped.push((id, now));
    }

    fn close(&mut self) {
        self.log.lock().closed += 1;
    }
}

/// Mono buffer of `secs` seconds at 24kHz
pub fn silence(secs: f64) -> PcmBuffer {
    PcmBuffer::mono(vec![0.0; (secs * 24000.0).round() as usize], 24000)
}

// ============================================================================
// Capture
// ============================================================================

#[derive(Default)]
pub struct CaptureState {
    pub sender: Option<mpsc::Sender<AudioFrame>>,
    pub starts: usize,
    pub stops: usize,
    pub fail: bool,
}

#[derive(Clone, Default)]
pub struct ScriptedCapture {
    pub state: Arc<Mutex<CaptureState>>,
}

impl ScriptedCapture {
    /// Push a frame as if the microphone produced it
    pub async fn push(&self, samples: Vec<f32>, sequence: u64) {
        let sender = self.state.lock().sender.clone();
        if let Some(sender) = sender {
            let frame = AudioFrame {
                samples,
                sample_rate: 16000,
                sequence,
                timestamp_ms: sequence * 256,
            };
            let _ = sender.send(frame).await;
        }
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().sender.is_some()
    }
}

#[async_trait::async_trait]
impl AudioBackend for ScriptedCapture {
    async fn start(&mut self) -> VoiceResult<mpsc::Receiver<AudioFrame>> {
        let mut state = self.state.lock();
        if state.fail {
            return Err(VoiceError::Acquisition("permission denied".to_string()));
        }
        let (tx, rx) = mpsc::channel(32);
        state.sender = Some(tx);
        state.starts += 1;
        Ok(rx)
    }

    async fn stop(&mut self) -> VoiceResult<()> {
        let mut state = self.state.lock();
        if state.sender.take().is_some() {
            state.stops += 1;
        }
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.state.lock().sender.is_some()
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

// ============================================================================
// Transport
// ============================================================================

/// The remote end of a scripted session
pub struct RemoteEnd {
    pub outbound: mpsc::UnboundedReceiver<OutboundMessage>,
    pub events: mpsc::UnboundedSender<InboundEvent>,
}

#[derive(Default)]
pub struct TransportState {
    pub remotes: Vec<RemoteEnd>,
    pub connects: usize,
    pub fail: bool,
}

#[derive(Clone, Default)]
pub struct ScriptedTransport {
    pub state: Arc<Mutex<TransportState>>,
    /// When set, connect waits for a notification before completing
    pub gate: Option<Arc<Notify>>,
}

impl ScriptedTransport {
    pub fn gated() -> (Self, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        let transport = Self {
            state: Arc::default(),
            gate: Some(Arc::clone(&gate)),
        };
        (transport, gate)
    }

    /// Remote end of the most recent session
    pub fn take_remote(&self) -> RemoteEnd {
        self.state.lock().remotes.pop().expect("no session connected")
    }

    pub fn connects(&self) -> usize {
        self.state.lock().connects
    }
}

#[async_trait::async_trait]
impl SessionTransport for ScriptedTransport {
    async fn connect(&self, _config: &LiveConfig) -> VoiceResult<LiveSession> {
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }

        let mut state = self.state.lock();
        state.connects += 1;
        if state.fail {
            return Err(VoiceError::Connect("handshake rejected".to_string()));
        }

        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (ev_tx, ev_rx) = mpsc::unbounded_channel();
        state.remotes.push(RemoteEnd {
            outbound: out_rx,
            events: ev_tx,
        });
        Ok(LiveSession::new(format!("session-{}", state.connects), out_tx, ev_rx))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

// ============================================================================
// Devices
// ============================================================================

#[derive(Clone, Default)]
pub struct TestDevices {
    pub capture: ScriptedCapture,
    pub output: RecordingOutput,
    pub fail_output: bool,
    pub ended_tx: Arc<Mutex<Option<mpsc::UnboundedSender<BufferId>>>>,
}

impl TestDevices {
    /// Report a buffer as finished, as the device callback would
    pub fn finish(&self, id: BufferId) {
        if let Some(tx) = self.ended_tx.lock().as_ref() {
            let _ = tx.send(id);
        }
    }
}

#[async_trait::async_trait]
impl AudioDevices for TestDevices {
    fn capture_backend(&self) -> Box<dyn AudioBackend> {
        Box::new(self.capture.clone())
    }

    async fn open_output(&self, ended_tx: mpsc::UnboundedSender<BufferId>) -> VoiceResult<Box<dyn AudioOutput>> {
        if self.fail_output {
            return Err(VoiceError::Acquisition("no output device".to_string()));
        }
        *self.ended_tx.lock() = Some(ended_tx);
        Ok(Box::new(self.output.clone()))
    }
}
