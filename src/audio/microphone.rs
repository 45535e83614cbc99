//! Microphone capture via cpal
//!
//! cpal streams are not `Send`, so the stream lives on a dedicated thread
//! that owns it until the backend is stopped or dropped.

use std::thread::JoinHandle;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, FromSample, Sample, SampleFormat, SizedSample, Stream, StreamConfig};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use super::backend::{AudioBackend, AudioBackendConfig, AudioFrame};
use super::dsp::{downmix, Reframer, StreamResampler};
use crate::error::{VoiceError, VoiceResult};

/// Microphone backend
pub struct MicrophoneBackend {
    config: AudioBackendConfig,
    worker: Option<CaptureWorker>,
    device_name: String,
}

impl MicrophoneBackend {
    pub fn new(config: AudioBackendConfig) -> Self {
        Self {
            config,
            worker: None,
            device_name: String::from("microphone"),
        }
    }
}

#[async_trait::async_trait]
impl AudioBackend for MicrophoneBackend {
    async fn start(&mut self) -> VoiceResult<mpsc::Receiver<AudioFrame>> {
        if self.worker.is_some() {
            return Err(VoiceError::Acquisition("microphone already capturing".to_string()));
        }

        let (frame_tx, frame_rx) = mpsc::channel(self.config.channel_capacity);
        let (ready_tx, ready_rx) = oneshot::channel();
        let (stop_tx, stop_rx) = oneshot::channel();
        let config = self.config.clone();

        let thread = std::thread::Builder::new()
            .name("companion-capture".to_string())
            .spawn(move || run_capture_thread(config, frame_tx, ready_tx, stop_rx))
            .map_err(|e| VoiceError::Acquisition(format!("failed to spawn capture thread: {}", e)))?;

        let worker = CaptureWorker {
            stop_tx: Some(stop_tx),
            thread: Some(thread),
        };

        match ready_rx.await {
            Ok(Ok(name)) => {
                info!("Microphone capture started on {}", name);
                self.device_name = name;
                self.worker = Some(worker);
                Ok(frame_rx)
            }
            Ok(Err(e)) => {
                worker.shutdown().await;
                Err(e)
            }
            Err(_) => {
                worker.shutdown().await;
                Err(VoiceError::Acquisition("capture thread exited during startup".to_string()))
            }
        }
    }

    async fn stop(&mut self) -> VoiceResult<()> {
        if let Some(worker) = self.worker.take() {
            info!("Stopping microphone capture");
            worker.shutdown().await;
        }
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.worker.is_some()
    }

    fn name(&self) -> &str {
        &self.device_name
    }
}

/// Handle to the thread that keeps the cpal stream alive
struct CaptureWorker {
    stop_tx: Option<oneshot::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl CaptureWorker {
    fn signal(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
    }

    /// Stop the thread and wait for it to release the device, off the runtime
    async fn shutdown(mut self) {
        self.signal();
        if let Some(thread) = self.thread.take() {
            match tokio::task::spawn_blocking(move || thread.join()).await {
                Ok(Ok(())) => {}
                _ => error!("Capture thread panicked"),
            }
        }
    }
}

impl Drop for CaptureWorker {
    // The thread drops the stream and exits on its own once signalled
    fn drop(&mut self) {
        self.signal();
    }
}

fn run_capture_thread(
    config: AudioBackendConfig,
    frame_tx: mpsc::Sender<AudioFrame>,
    ready_tx: oneshot::Sender<VoiceResult<String>>,
    stop_rx: oneshot::Receiver<()>,
) {
    let stream = match open_input_stream(&config, frame_tx) {
        Ok((stream, name)) => {
            let _ = ready_tx.send(Ok(name));
            stream
        }
        Err(e) => {
            let _ = ready_tx.send(Err(e));
            return;
        }
    };

    // Returns on explicit stop or when the backend is dropped
    let _ = stop_rx.blocking_recv();
    drop(stream);
    debug!("Capture thread exiting");
}

fn select_input_device(name: Option<&str>) -> VoiceResult<Device> {
    let host = cpal::default_host();
    match name {
        Some(wanted) => host
            .input_devices()
            .map_err(|e| VoiceError::Acquisition(format!("failed to enumerate input devices: {}", e)))?
            .find(|d| d.name().map(|n| n == wanted).unwrap_or(false))
            .ok_or_else(|| VoiceError::Acquisition(format!("input device not found: {}", wanted))),
        None => host
            .default_input_device()
            .ok_or_else(|| VoiceError::Acquisition("no default input device available".to_string())),
    }
}

fn open_input_stream(
    config: &AudioBackendConfig,
    frame_tx: mpsc::Sender<AudioFrame>,
) -> VoiceResult<(Stream, String)> {
    let device = select_input_device(config.device.as_deref())?;
    let name = device.name().unwrap_or_else(|_| "unknown".into());

    let supported = device
        .default_input_config()
        .map_err(|e| VoiceError::Acquisition(format!("failed to get input config: {}", e)))?;

    let native_rate = supported.sample_rate().0;
    let channels = supported.channels();
    let stream_config: StreamConfig = supported.config();

    info!(
        "Input device {}: {}Hz, {} channels, {:?} (delivering {}Hz mono)",
        name,
        native_rate,
        channels,
        supported.sample_format(),
        config.sample_rate
    );

    let sink = FrameSink {
        tx: frame_tx,
        reframer: Reframer::new(config.frame_size),
        channels: channels as usize,
        resampler: StreamResampler::new(native_rate, config.sample_rate),
        target_rate: config.sample_rate,
        sequence: 0,
        dropped: 0,
    };

    let stream = match supported.sample_format() {
        SampleFormat::F32 => build_stream::<f32>(&device, &stream_config, sink)?,
        SampleFormat::I16 => build_stream::<i16>(&device, &stream_config, sink)?,
        SampleFormat::U16 => build_stream::<u16>(&device, &stream_config, sink)?,
        other => {
            return Err(VoiceError::Acquisition(format!(
                "unsupported input sample format: {:?}",
                other
            )))
        }
    };

    stream
        .play()
        .map_err(|e| VoiceError::Acquisition(format!("failed to start input stream: {}", e)))?;

    Ok((stream, name))
}

fn build_stream<T>(device: &Device, config: &StreamConfig, mut sink: FrameSink) -> VoiceResult<Stream>
where
    T: SizedSample,
    f32: FromSample<T>,
{
    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                let floats: Vec<f32> = data.iter().map(|s| s.to_sample::<f32>()).collect();
                sink.push(&floats);
            },
            |err| error!("Audio input stream error: {}", err),
            None,
        )
        .map_err(|e| VoiceError::Acquisition(format!("failed to build input stream: {}", e)))
}

/// Callback-side state: downmix, resample and re-frame device audio
struct FrameSink {
    tx: mpsc::Sender<AudioFrame>,
    reframer: Reframer,
    channels: usize,
    resampler: StreamResampler,
    target_rate: u32,
    sequence: u64,
    dropped: u64,
}

impl FrameSink {
    fn push(&mut self, interleaved: &[f32]) {
        let mono = downmix(interleaved, self.channels);
        let resampled = self.resampler.process(&mono);

        for samples in self.reframer.push(&resampled) {
            let timestamp_ms = self.sequence * samples.len() as u64 * 1000 / self.target_rate as u64;
            let frame = AudioFrame {
                samples,
                sample_rate: self.target_rate,
                sequence: self.sequence,
                timestamp_ms,
            };
            self.sequence += 1;

            // Never block the audio callback
            if self.tx.try_send(frame).is_err() {
                self.dropped += 1;
                warn!("Capture consumer lagging, dropped frame ({} total)", self.dropped);
            }
        }
    }
}
