//! Voice session controller
//!
//! One controller owns every piece of mutable voice state: the capture
//! backend, the output device, the playback scheduler and the live session.
//! All of it is mutated from a single task, which multiplexes capture frames,
//! inbound session events, playback completions and UI commands.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, error, info, warn};

use super::config::VoiceSessionConfig;
use super::devices::AudioDevices;
use super::state::{VoiceSnapshot, VoiceStatus};
use super::stats::{SessionCounters, VoiceStats};
use crate::audio::{decode_audio_data, AudioBackend, AudioFrame, CapturePipeline, EncodedBlob};
use crate::error::{VoiceError, VoiceResult};
use crate::live::{InboundEvent, LiveSession, SessionTransport, TransportState};
use crate::playback::{AudioOutput, BufferId, PlaybackScheduler};

/// Requests handled by the controller task
#[derive(Debug)]
pub enum Command {
    Start(oneshot::Sender<VoiceResult<String>>),
    Stop(oneshot::Sender<Option<VoiceStats>>),
    Stats(oneshot::Sender<Option<VoiceStats>>),
}

/// Something happened on one of the active session's sources
#[derive(Debug)]
pub enum SessionEvent {
    /// Next captured frame; `None` once capture has ended
    Frame(Option<AudioFrame>),
    /// Next remote event; `None` once the transport is gone
    Inbound(Option<InboundEvent>),
    /// A playback buffer finished naturally
    PlaybackEnded(BufferId),
}

/// Devices acquired for a session that is still connecting
struct AcquiredDevices {
    capture: Box<dyn AudioBackend>,
    frames: mpsc::Receiver<AudioFrame>,
    output: Box<dyn AudioOutput>,
    ended_rx: mpsc::UnboundedReceiver<BufferId>,
}

impl AcquiredDevices {
    async fn release(mut self) {
        if let Err(e) = self.capture.stop().await {
            error!("Failed to stop {} capture: {}", self.capture.name(), e);
        }
        self.output.close();
    }
}

/// Everything owned by a live session
struct ActiveSession {
    live: LiveSession,
    capture: Box<dyn AudioBackend>,
    frames: Option<mpsc::Receiver<AudioFrame>>,
    output: Box<dyn AudioOutput>,
    ended_rx: mpsc::UnboundedReceiver<BufferId>,
    counters: SessionCounters,
}

pub struct VoiceController {
    config: VoiceSessionConfig,
    devices: Arc<dyn AudioDevices>,
    transport: Arc<dyn SessionTransport>,
    pipeline: CapturePipeline,
    scheduler: PlaybackScheduler,
    session: Option<ActiveSession>,
    last_stats: Option<VoiceStats>,
    snapshot_tx: watch::Sender<VoiceSnapshot>,
    level_rx: watch::Receiver<f32>,
}

impl VoiceController {
    pub fn new(
        config: VoiceSessionConfig,
        devices: Arc<dyn AudioDevices>,
        transport: Arc<dyn SessionTransport>,
    ) -> Self {
        let (snapshot_tx, _) = watch::channel(VoiceSnapshot::default());
        let (level_tx, level_rx) = watch::channel(0.0f32);
        let scheduler = PlaybackScheduler::new(config.max_active_buffers);

        Self {
            config,
            devices,
            transport,
            pipeline: CapturePipeline::new(level_tx),
            scheduler,
            session: None,
            last_stats: None,
            snapshot_tx,
            level_rx,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<VoiceSnapshot> {
        self.snapshot_tx.subscribe()
    }

    /// Loudness of the most recent captured frame
    pub fn level(&self) -> watch::Receiver<f32> {
        self.level_rx.clone()
    }

    pub fn snapshot(&self) -> VoiceSnapshot {
        self.snapshot_tx.borrow().clone()
    }

    pub fn status(&self) -> VoiceStatus {
        self.snapshot_tx.borrow().status
    }

    pub fn scheduler(&self) -> &PlaybackScheduler {
        &self.scheduler
    }

    pub fn has_session(&self) -> bool {
        self.session.is_some()
    }

    /// Start a session: acquire devices, then connect
    ///
    /// Rejected while a session is connecting or active. On failure every
    /// acquired resource is released and the status becomes `Error`.
    pub async fn start(&mut self) -> VoiceResult<String> {
        let devices = self.acquire().await?;
        let transport = Arc::clone(&self.transport);
        let live_config = self.config.live.clone();
        let result = transport.connect(&live_config).await;
        self.complete_start(devices, result).await
    }

    /// Tear everything down. Always ends in `Idle`; safe to call repeatedly.
    pub async fn stop(&mut self) -> Option<VoiceStats> {
        let stats = self.teardown().await;
        self.publish(|s| {
            s.status = VoiceStatus::Idle;
            s.reason = None;
            s.speaking = false;
            s.session_id = None;
        });
        stats
    }

    /// Current session statistics, or those of the last finished session
    pub fn stats(&self) -> Option<VoiceStats> {
        match &self.session {
            Some(active) => Some(active.counters.to_stats(active.live.id(), true, self.scheduler.evicted())),
            None => self.last_stats.clone(),
        }
    }

    /// Wait for the next event from the active session's sources
    ///
    /// Never resolves while no session is active.
    pub async fn next_event(&mut self) -> SessionEvent {
        let Some(active) = self.session.as_mut() else {
            return std::future::pending().await;
        };

        tokio::select! {
            frame = recv_frame(&mut active.frames) => SessionEvent::Frame(frame),
            event = active.live.next_event() => SessionEvent::Inbound(event),
            Some(id) = active.ended_rx.recv() => SessionEvent::PlaybackEnded(id),
        }
    }

    pub async fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Frame(Some(frame)) => self.on_frame(frame).await,
            SessionEvent::Frame(None) => {
                if let Some(active) = self.session.as_mut() {
                    warn!("{} capture ended; no more audio will be sent", active.capture.name());
                    active.frames = None;
                }
            }
            SessionEvent::Inbound(Some(event)) => self.on_inbound(event).await,
            SessionEvent::Inbound(None) => self.on_inbound(InboundEvent::Closed).await,
            SessionEvent::PlaybackEnded(id) => self.on_playback_ended(id),
        }
    }

    /// Run the controller until every command sender is dropped
    pub async fn run(mut self, mut commands: mpsc::Receiver<Command>) {
        info!("Voice controller started");
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command, &mut commands).await,
                    None => break,
                },
                event = self.next_event() => self.handle_event(event).await,
            }
        }
        self.stop().await;
        info!("Voice controller stopped");
    }

    async fn handle_command(&mut self, command: Command, commands: &mut mpsc::Receiver<Command>) {
        match command {
            Command::Start(reply) => {
                let result = self.start_interruptible(commands).await;
                let _ = reply.send(result);
            }
            Command::Stop(reply) => {
                let _ = reply.send(self.stop().await);
            }
            Command::Stats(reply) => {
                let _ = reply.send(self.stats());
            }
        }
    }

    /// `start()` that keeps answering commands while the handshake runs:
    /// further starts are rejected and a stop abandons the attempt.
    async fn start_interruptible(&mut self, commands: &mut mpsc::Receiver<Command>) -> VoiceResult<String> {
        let devices = self.acquire().await?;
        let transport = Arc::clone(&self.transport);
        let live_config = self.config.live.clone();
        let connect = transport.connect(&live_config);
        tokio::pin!(connect);

        loop {
            tokio::select! {
                result = &mut connect => return self.complete_start(devices, result).await,
                Some(command) = commands.recv() => match command {
                    Command::Start(reply) => {
                        let _ = reply.send(Err(VoiceError::AlreadyRunning));
                    }
                    Command::Stats(reply) => {
                        let _ = reply.send(self.stats());
                    }
                    Command::Stop(reply) => {
                        info!("Voice session start cancelled");
                        devices.release().await;
                        let stats = self.stop().await;
                        let _ = reply.send(stats);
                        return Err(VoiceError::Connect("cancelled".to_string()));
                    }
                },
            }
        }
    }

    /// Guard, mark connecting and open both devices (microphone first)
    async fn acquire(&mut self) -> VoiceResult<AcquiredDevices> {
        if self.status().is_running() || self.session.is_some() {
            warn!("Voice session already running, start rejected");
            return Err(VoiceError::AlreadyRunning);
        }

        info!("Starting voice session");
        self.publish(|s| {
            *s = VoiceSnapshot {
                status: VoiceStatus::Connecting,
                ..VoiceSnapshot::default()
            };
        });

        let mut capture = self.devices.capture_backend();
        let frames = match capture.start().await {
            Ok(frames) => frames,
            Err(e) => {
                error!("Failed to acquire {}: {}", capture.name(), e);
                self.fail(&e);
                return Err(e);
            }
        };

        let (ended_tx, ended_rx) = mpsc::unbounded_channel();
        let output = match self.devices.open_output(ended_tx).await {
            Ok(output) => output,
            Err(e) => {
                error!("Failed to open output device: {}", e);
                if let Err(stop_err) = capture.stop().await {
                    error!("Failed to release {}: {}", capture.name(), stop_err);
                }
                self.fail(&e);
                return Err(e);
            }
        };

        Ok(AcquiredDevices {
            capture,
            frames,
            output,
            ended_rx,
        })
    }

    async fn complete_start(
        &mut self,
        devices: AcquiredDevices,
        result: VoiceResult<LiveSession>,
    ) -> VoiceResult<String> {
        let live = match result {
            Ok(live) => live,
            Err(e) => {
                error!("Failed to connect live session: {}", e);
                devices.release().await;
                self.fail(&e);
                return Err(e);
            }
        };

        let AcquiredDevices {
            capture,
            mut frames,
            output,
            ended_rx,
        } = devices;

        // Audio captured during the handshake is stale
        let mut stale = 0usize;
        while frames.try_recv().is_ok() {
            stale += 1;
        }
        if stale > 0 {
            debug!("Discarded {} frames captured while connecting", stale);
        }

        let session_id = live.id().to_string();
        self.scheduler = PlaybackScheduler::new(self.config.max_active_buffers);
        self.session = Some(ActiveSession {
            live,
            capture,
            frames: Some(frames),
            output,
            ended_rx,
            counters: SessionCounters::new(),
        });

        self.publish(|s| {
            s.status = VoiceStatus::Active;
            s.reason = None;
            s.session_id = Some(session_id.clone());
        });

        info!("Voice session {} active", session_id);
        Ok(session_id)
    }

    async fn on_frame(&mut self, frame: AudioFrame) {
        let Some(active) = self.session.as_mut() else {
            return;
        };

        match self.pipeline.forward(&frame, &active.live) {
            Ok(()) => active.counters.frames_sent += 1,
            Err(e) if !e.is_fatal() => {
                warn!("Skipping capture frame {}: {}", frame.sequence, e);
            }
            Err(e) => {
                error!("Failed to forward capture frame {}: {}", frame.sequence, e);
                self.abort_session(e).await;
            }
        }
    }

    async fn on_inbound(&mut self, event: InboundEvent) {
        match event {
            InboundEvent::AudioChunk(blob) => self.on_audio_chunk(blob),
            InboundEvent::TranscriptDelta(text) => {
                self.publish(|s| s.transcript.push_str(&text));
            }
            InboundEvent::TurnComplete => {
                if let Some(active) = self.session.as_mut() {
                    active.counters.turns_completed += 1;
                }
                debug!("Model turn complete");
            }
            InboundEvent::Interrupted => self.on_interrupted(),
            InboundEvent::Closed => {
                if self.session.is_none() {
                    return;
                }
                info!("Live session closed by remote");
                if let Some(active) = self.session.as_mut() {
                    active.live.mark(TransportState::Closed);
                }
                self.stop().await;
            }
            InboundEvent::Error(cause) => {
                error!("Live session error: {}", cause);
                if let Some(active) = self.session.as_mut() {
                    active.live.mark(TransportState::Error);
                }
                self.abort_session(VoiceError::Transport(cause)).await;
            }
        }
    }

    /// Decode and schedule one chunk; a bad chunk is dropped, not fatal
    fn on_audio_chunk(&mut self, blob: EncodedBlob) {
        let Some(active) = self.session.as_mut() else {
            return;
        };

        let rate = blob.sample_rate().unwrap_or(self.config.output_sample_rate);
        let buffer = match blob
            .bytes()
            .and_then(|bytes| decode_audio_data(&bytes, rate, self.config.output_channels))
        {
            Ok(buffer) => buffer,
            Err(e) => {
                active.counters.decode_errors += 1;
                warn!("Dropping inbound audio chunk: {}", e);
                return;
            }
        };

        let scheduled = self.scheduler.schedule(active.output.as_mut(), &buffer);
        active.counters.chunks_played += 1;
        debug!(
            "Scheduled buffer {} at {:.3}s for {:.3}s",
            scheduled.id, scheduled.start_at, scheduled.duration
        );

        let speaking = self.scheduler.is_speaking();
        self.publish(|s| s.speaking = speaking);
    }

    fn on_interrupted(&mut self) {
        let Some(active) = self.session.as_mut() else {
            return;
        };
        let stopped = self.scheduler.interrupt(active.output.as_mut());
        active.counters.interruptions += 1;
        info!("Playback interrupted ({} buffers stopped)", stopped);
        self.publish(|s| s.speaking = false);
    }

    fn on_playback_ended(&mut self, id: BufferId) {
        if self.scheduler.on_ended(id) {
            debug!("Speech playback finished");
            self.publish(|s| s.speaking = false);
        }
    }

    /// Session-fatal failure: release everything and show the error
    async fn abort_session(&mut self, error: VoiceError) {
        self.teardown().await;
        self.fail(&error);
    }

    fn fail(&self, error: &VoiceError) {
        let reason = error.user_message().to_string();
        self.publish(|s| {
            s.status = VoiceStatus::Error;
            s.reason = Some(reason.clone());
            s.speaking = false;
            s.session_id = None;
        });
    }

    /// Release capture, transport, playback and output for the active session
    async fn teardown(&mut self) -> Option<VoiceStats> {
        let mut active = self.session.take()?;
        let session_id = active.live.id().to_string();
        info!("Tearing down voice session {}", session_id);

        if let Err(e) = active.capture.stop().await {
            error!("Failed to stop {} capture: {}", active.capture.name(), e);
        }
        active.frames = None;

        active.live.close();
        self.scheduler.reset(active.output.as_mut());
        active.output.close();
        self.pipeline.reset();

        let stats = active.counters.to_stats(&session_id, false, self.scheduler.evicted());
        info!(
            "Voice session {} ended after {:.1}s ({} frames sent, {} chunks played)",
            session_id, stats.duration_secs, stats.frames_sent, stats.chunks_played
        );
        self.last_stats = Some(stats.clone());
        Some(stats)
    }

    fn publish(&self, update: impl FnOnce(&mut VoiceSnapshot)) {
        self.snapshot_tx.send_modify(update);
    }
}

async fn recv_frame(frames: &mut Option<mpsc::Receiver<AudioFrame>>) -> Option<AudioFrame> {
    match frames {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
