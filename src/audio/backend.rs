use std::path::PathBuf;

use tokio::sync::mpsc;

use crate::error::VoiceResult;

/// One captured block of mono float samples
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Samples in [-1, 1]
    pub samples: Vec<f32>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Capture order, starting at 0 for every session
    pub sequence: u64,
    /// Timestamp in milliseconds since capture started
    pub timestamp_ms: u64,
}

impl AudioFrame {
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Configuration for audio capture backends
#[derive(Debug, Clone)]
pub struct AudioBackendConfig {
    /// Rate frames are delivered at (device audio is resampled to it)
    pub sample_rate: u32,
    /// Samples per delivered frame
    pub frame_size: usize,
    /// Input device name (None = system default)
    pub device: Option<String>,
    /// Frames buffered between the device and the consumer
    pub channel_capacity: usize,
}

impl Default for AudioBackendConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000, // Live session input rate
            frame_size: 4096,   // ~256ms per frame
            device: None,
            channel_capacity: 32,
        }
    }
}

impl AudioBackendConfig {
    /// Nominal time between frames; never zero, even for a degenerate config
    pub fn frame_interval(&self) -> std::time::Duration {
        let frame_size = self.frame_size.max(1) as f64;
        std::time::Duration::from_secs_f64(frame_size / self.sample_rate.max(1) as f64)
    }
}

/// Audio capture backend trait
///
/// Implementations:
/// - Microphone: cpal input device
/// - File: WAV file replayed in real time (offline runs, tests)
#[async_trait::async_trait]
pub trait AudioBackend: Send + Sync {
    /// Acquire the device and start capturing
    ///
    /// Returns a channel receiver that will receive fixed-size frames.
    /// Fails with `VoiceError::Acquisition` if the device cannot be opened.
    async fn start(&mut self) -> VoiceResult<mpsc::Receiver<AudioFrame>>;

    /// Stop capturing and release the device. Safe to call repeatedly.
    async fn stop(&mut self) -> VoiceResult<()>;

    /// Check if backend is currently capturing
    fn is_capturing(&self) -> bool;

    /// Get backend name for logging
    fn name(&self) -> &str;
}

/// Audio backend factory
pub struct AudioBackendFactory;

impl AudioBackendFactory {
    /// Create audio backend for the given source
    pub fn create(source: AudioSource, config: AudioBackendConfig) -> Box<dyn AudioBackend> {
        match source {
            AudioSource::Microphone => Box::new(super::microphone::MicrophoneBackend::new(config)),
            AudioSource::File(path) => Box::new(super::file::FileBackend::new(path, config)),
        }
    }
}

/// Audio source type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioSource {
    /// Microphone input
    Microphone,
    /// WAV file input
    File(PathBuf),
}
