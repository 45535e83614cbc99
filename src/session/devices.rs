use tokio::sync::mpsc;

use crate::audio::{AudioBackend, AudioBackendConfig, AudioBackendFactory, AudioSource};
use crate::error::VoiceResult;
use crate::playback::{AudioOutput, BufferId, CpalOutput};

/// Opens the capture and playback devices for each session
#[async_trait::async_trait]
pub trait AudioDevices: Send + Sync {
    /// A fresh, not yet started capture backend
    fn capture_backend(&self) -> Box<dyn AudioBackend>;

    /// Open the output device; finished buffers are reported on `ended_tx`
    async fn open_output(&self, ended_tx: mpsc::UnboundedSender<BufferId>) -> VoiceResult<Box<dyn AudioOutput>>;
}

/// Devices of the local machine
#[derive(Debug, Clone)]
pub struct SystemDevices {
    pub source: AudioSource,
    pub capture: AudioBackendConfig,
    /// Output device name (None = system default)
    pub output_device: Option<String>,
}

impl Default for SystemDevices {
    fn default() -> Self {
        Self {
            source: AudioSource::Microphone,
            capture: AudioBackendConfig::default(),
            output_device: None,
        }
    }
}

#[async_trait::async_trait]
impl AudioDevices for SystemDevices {
    fn capture_backend(&self) -> Box<dyn AudioBackend> {
        AudioBackendFactory::create(self.source.clone(), self.capture.clone())
    }

    async fn open_output(&self, ended_tx: mpsc::UnboundedSender<BufferId>) -> VoiceResult<Box<dyn AudioOutput>> {
        let output = CpalOutput::open(self.output_device.clone(), ended_tx).await?;
        Ok(Box::new(output))
    }
}
