use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use super::config::VoiceSessionConfig;
use super::controller::{Command, VoiceController};
use super::devices::AudioDevices;
use super::state::VoiceSnapshot;
use super::stats::VoiceStats;
use crate::error::{VoiceError, VoiceResult};
use crate::live::SessionTransport;

const COMMAND_CAPACITY: usize = 16;

/// Cloneable front end to a running `VoiceController`
#[derive(Clone)]
pub struct VoiceHandle {
    commands: mpsc::Sender<Command>,
    snapshot: watch::Receiver<VoiceSnapshot>,
    level: watch::Receiver<f32>,
}

impl VoiceHandle {
    /// Spawn a controller task and return a handle to it
    pub fn spawn(
        config: VoiceSessionConfig,
        devices: Arc<dyn AudioDevices>,
        transport: Arc<dyn SessionTransport>,
    ) -> (Self, JoinHandle<()>) {
        let controller = VoiceController::new(config, devices, transport);
        let (commands, rx) = mpsc::channel(COMMAND_CAPACITY);
        let handle = Self {
            commands,
            snapshot: controller.subscribe(),
            level: controller.level(),
        };
        let task = tokio::spawn(controller.run(rx));
        (handle, task)
    }

    /// Start a session; resolves with its id once it is active
    pub async fn start(&self) -> VoiceResult<String> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Start(tx)).await?;
        rx.await.map_err(|_| VoiceError::ControllerGone)?
    }

    /// Stop the session (if any) and return its final statistics
    pub async fn stop(&self) -> VoiceResult<Option<VoiceStats>> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Stop(tx)).await?;
        rx.await.map_err(|_| VoiceError::ControllerGone)
    }

    pub async fn stats(&self) -> VoiceResult<Option<VoiceStats>> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Stats(tx)).await?;
        rx.await.map_err(|_| VoiceError::ControllerGone)
    }

    pub fn snapshot(&self) -> VoiceSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Watch every snapshot change
    pub fn subscribe(&self) -> watch::Receiver<VoiceSnapshot> {
        self.snapshot.clone()
    }

    /// Loudness (RMS) of the latest captured frame
    pub fn level(&self) -> f32 {
        *self.level.borrow()
    }

    async fn send(&self, command: Command) -> VoiceResult<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| VoiceError::ControllerGone)
    }
}
