use std::path::{Path, PathBuf};

use hound::{SampleFormat, WavReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::backend::{AudioBackend, AudioBackendConfig, AudioFrame};
use super::codec::i16_to_sample;
use super::dsp::{downmix, resample_linear};
use crate::error::{VoiceError, VoiceResult};

pub struct AudioFile {
    pub path: String,
    pub duration_seconds: f64,
    pub sample_rate: u32,
    pub channels: u16,
    /// Interleaved samples in [-1, 1]
    pub samples: Vec<f32>,
}

impl AudioFile {
    pub fn open(path: impl AsRef<Path>) -> VoiceResult<Self> {
        let path = path.as_ref();
        info!("Opening audio file: {}", path.display());

        let reader = WavReader::open(path)
            .map_err(|e| VoiceError::Acquisition(format!("failed to open WAV file {}: {}", path.display(), e)))?;

        let spec = reader.spec();
        let samples: Vec<f32> = match (spec.sample_format, spec.bits_per_sample) {
            (SampleFormat::Int, 16) => reader
                .into_samples::<i16>()
                .map(|s| s.map(i16_to_sample))
                .collect::<Result<Vec<_>, _>>(),
            (SampleFormat::Float, 32) => reader.into_samples::<f32>().collect::<Result<Vec<_>, _>>(),
            (format, bits) => {
                return Err(VoiceError::Acquisition(format!(
                    "unsupported WAV sample format: {:?} {}-bit",
                    format, bits
                )))
            }
        }
        .map_err(|e| VoiceError::Acquisition(format!("failed to read audio samples: {}", e)))?;

        let duration_seconds = samples.len() as f64 / (spec.sample_rate as f64 * spec.channels as f64);

        info!(
            "Audio file loaded: {:.1}s, {}Hz, {} channels, {} samples",
            duration_seconds,
            spec.sample_rate,
            spec.channels,
            samples.len()
        );

        Ok(Self {
            path: path.display().to_string(),
            duration_seconds,
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            samples,
        })
    }

    /// Mono samples at `target_rate`
    pub fn to_mono(&self, target_rate: u32) -> Vec<f32> {
        let mono = downmix(&self.samples, self.channels as usize);
        resample_linear(&mono, self.sample_rate, target_rate)
    }
}

/// Replays a WAV file as capture frames
///
/// The last partial frame is zero-padded so every frame has `frame_size`
/// samples. The frame channel closes once the file is exhausted.
pub struct FileBackend {
    path: PathBuf,
    config: AudioBackendConfig,
    realtime: bool,
    task: Option<JoinHandle<()>>,
}

impl FileBackend {
    pub fn new(path: impl Into<PathBuf>, config: AudioBackendConfig) -> Self {
        Self {
            path: path.into(),
            config,
            realtime: true,
            task: None,
        }
    }

    /// Deliver frames as fast as the consumer accepts them
    pub fn without_pacing(mut self) -> Self {
        self.realtime = false;
        self
    }
}

#[async_trait::async_trait]
impl AudioBackend for FileBackend {
    async fn start(&mut self) -> VoiceResult<mpsc::Receiver<AudioFrame>> {
        if self.is_capturing() {
            return Err(VoiceError::Acquisition("file backend already capturing".to_string()));
        }

        let file = AudioFile::open(&self.path)?;
        let samples = file.to_mono(self.config.sample_rate);
        let (tx, rx) = mpsc::channel(self.config.channel_capacity);

        let frame_size = self.config.frame_size.max(1);
        let sample_rate = self.config.sample_rate;
        let mut ticker = self.realtime.then(|| tokio::time::interval(self.config.frame_interval()));

        self.task = Some(tokio::spawn(async move {
            for (sequence, chunk) in samples.chunks(frame_size).enumerate() {
                if let Some(ticker) = ticker.as_mut() {
                    ticker.tick().await;
                }

                let mut frame_samples = chunk.to_vec();
                frame_samples.resize(frame_size, 0.0);

                let sequence = sequence as u64;
                let frame = AudioFrame {
                    samples: frame_samples,
                    sample_rate,
                    sequence,
                    timestamp_ms: sequence * frame_size as u64 * 1000 / sample_rate as u64,
                };

                if tx.send(frame).await.is_err() {
                    debug!("File capture consumer went away");
                    return;
                }
            }
            debug!("File capture reached end of input");
        }));

        info!("File capture started: {}", self.path.display());
        Ok(rx)
    }

    async fn stop(&mut self) -> VoiceResult<()> {
        if let Some(task) = self.task.take() {
            task.abort();
            info!("File capture stopped: {}", self.path.display());
        }
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.task.as_ref().map(|t| !t.is_finished()).unwrap_or(false)
    }

    fn name(&self) -> &str {
        "WAV file"
    }
}

impl Drop for FileBackend {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
