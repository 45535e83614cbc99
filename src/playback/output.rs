//! Output devices driven by the playback scheduler
//!
//! The scheduler only needs a clock and the ability to start a buffer at a
//! given time or stop it early. `CpalOutput` provides both on top of a cpal
//! output stream: scheduled voices are mixed in the device callback and the
//! clock counts frames actually rendered.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, FromSample, SizedSample, Stream, StreamConfig};
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info};

use crate::audio::dsp::resample_linear;
use crate::audio::PcmBuffer;
use crate::error::{VoiceError, VoiceResult};

/// Identifies one scheduled buffer for the lifetime of a session
pub type BufferId = u64;

/// Output clock plus buffer start/stop control
pub trait AudioOutput: Send {
    /// Current output clock time in seconds
    fn now(&self) -> f64;

    /// Start `buffer` at output time `start_at`
    ///
    /// The output reports the id on its ended channel once playback
    /// finishes naturally. Stopped buffers are not reported.
    fn play(&mut self, id: BufferId, buffer: &PcmBuffer, start_at: f64);

    /// Stop a buffer immediately, whether playing or still pending
    fn stop(&mut self, id: BufferId);

    /// Stop everything and release the device. Safe to call repeatedly.
    fn close(&mut self);
}

/// A buffer placed on the output timeline
struct Voice {
    id: BufferId,
    start_frame: u64,
    samples: Vec<f32>,
}

impl Voice {
    fn end_frame(&self) -> u64 {
        self.start_frame + self.samples.len() as u64
    }
}

#[derive(Default)]
struct Timeline {
    voices: Vec<Voice>,
    /// Output time and frame at which the most recently placed voice ends
    tail: Option<(f64, u64)>,
}

impl Timeline {
    /// Put `samples` on the timeline at `start_at`
    ///
    /// A voice starting exactly where the previous one ends continues from
    /// its end frame, so rounding never opens a gap or an overlap between
    /// back-to-back buffers.
    fn place(&mut self, id: BufferId, samples: Vec<f32>, start_at: f64, end_at: f64, sample_rate: u32) {
        let start_frame = match self.tail {
            Some((tail_at, tail_frame)) if (tail_at - start_at).abs() < 1e-9 => tail_frame,
            _ => (start_at.max(0.0) * sample_rate as f64).round() as u64,
        };
        let voice = Voice {
            id,
            start_frame,
            samples,
        };
        self.tail = Some((end_at, voice.end_frame()));
        self.voices.push(voice);
    }

    fn clear(&mut self) {
        self.voices.clear();
        self.tail = None;
    }
}

/// cpal-backed output device
pub struct CpalOutput {
    timeline: Arc<Mutex<Timeline>>,
    position: Arc<AtomicU64>,
    sample_rate: u32,
    worker: Option<OutputWorker>,
}

impl CpalOutput {
    /// Open the named output device (or the default one)
    pub async fn open(device: Option<String>, ended_tx: mpsc::UnboundedSender<BufferId>) -> VoiceResult<Self> {
        let timeline = Arc::new(Mutex::new(Timeline::default()));
        let position = Arc::new(AtomicU64::new(0));
        let (ready_tx, ready_rx) = oneshot::channel();
        let (stop_tx, stop_rx) = oneshot::channel();

        let shared = RenderState {
            timeline: Arc::clone(&timeline),
            position: Arc::clone(&position),
            ended_tx,
        };

        let thread = std::thread::Builder::new()
            .name("companion-playback".to_string())
            .spawn(move || run_output_thread(device, shared, ready_tx, stop_rx))
            .map_err(|e| VoiceError::Acquisition(format!("failed to spawn playback thread: {}", e)))?;

        let worker = OutputWorker {
            stop_tx: Some(stop_tx),
            thread: Some(thread),
        };

        match ready_rx.await {
            Ok(Ok(sample_rate)) => Ok(Self {
                timeline,
                position,
                sample_rate,
                worker: Some(worker),
            }),
            Ok(Err(e)) => {
                worker.join().await;
                Err(e)
            }
            Err(_) => {
                worker.join().await;
                Err(VoiceError::Acquisition("playback thread exited during startup".to_string()))
            }
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

impl AudioOutput for CpalOutput {
    fn now(&self) -> f64 {
        self.position.load(Ordering::Acquire) as f64 / self.sample_rate as f64
    }

    fn play(&mut self, id: BufferId, buffer: &PcmBuffer, start_at: f64) {
        let samples = resample_linear(&buffer.to_mono(), buffer.sample_rate, self.sample_rate);
        let end_at = start_at + buffer.duration_secs();
        self.timeline.lock().place(id, samples, start_at, end_at, self.sample_rate);
    }

    fn stop(&mut self, id: BufferId) {
        self.timeline.lock().voices.retain(|v| v.id != id);
    }

    fn close(&mut self) {
        self.timeline.lock().clear();
        if let Some(mut worker) = self.worker.take() {
            // The thread drops the stream on its own; close may run on the runtime
            worker.signal();
            info!("Playback device released");
        }
    }
}

impl Drop for CpalOutput {
    fn drop(&mut self) {
        self.close();
    }
}

struct OutputWorker {
    stop_tx: Option<oneshot::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl OutputWorker {
    fn signal(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
    }

    /// Signal and wait for the thread without blocking the runtime
    async fn join(mut self) {
        self.signal();
        if let Some(thread) = self.thread.take() {
            match tokio::task::spawn_blocking(move || thread.join()).await {
                Ok(Ok(())) => {}
                _ => error!("Playback thread panicked"),
            }
        }
    }
}

/// State shared between the scheduler side and the device callback
struct RenderState {
    timeline: Arc<Mutex<Timeline>>,
    position: Arc<AtomicU64>,
    ended_tx: mpsc::UnboundedSender<BufferId>,
}

impl RenderState {
    /// Mix every voice overlapping this block into `out` (interleaved)
    fn render(&self, out: &mut [f32], channels: usize) {
        let frames = out.len() / channels.max(1);
        let base = self.position.load(Ordering::Acquire);
        let end = base + frames as u64;

        let mut timeline = self.timeline.lock();
        for (i, frame) in out.chunks_mut(channels.max(1)).enumerate() {
            let t = base + i as u64;
            let mut acc = 0.0f32;
            for voice in timeline.voices.iter() {
                if t >= voice.start_frame {
                    if let Some(s) = voice.samples.get((t - voice.start_frame) as usize) {
                        acc += *s;
                    }
                }
            }
            frame.fill(acc.clamp(-1.0, 1.0));
        }

        let ended_tx = &self.ended_tx;
        timeline.voices.retain(|voice| {
            let finished = voice.end_frame() <= end;
            if finished {
                let _ = ended_tx.send(voice.id);
            }
            !finished
        });
        drop(timeline);

        self.position.store(end, Ordering::Release);
    }
}

fn run_output_thread(
    device: Option<String>,
    shared: RenderState,
    ready_tx: oneshot::Sender<VoiceResult<u32>>,
    stop_rx: oneshot::Receiver<()>,
) {
    let stream = match open_output_stream(device.as_deref(), shared) {
        Ok((stream, sample_rate)) => {
            let _ = ready_tx.send(Ok(sample_rate));
            stream
        }
        Err(e) => {
            let _ = ready_tx.send(Err(e));
            return;
        }
    };

    let _ = stop_rx.blocking_recv();
    drop(stream);
    debug!("Playback thread exiting");
}

fn select_output_device(name: Option<&str>) -> VoiceResult<Device> {
    let host = cpal::default_host();
    match name {
        Some(wanted) => host
            .output_devices()
            .map_err(|e| VoiceError::Acquisition(format!("failed to enumerate output devices: {}", e)))?
            .find(|d| d.name().map(|n| n == wanted).unwrap_or(false))
            .ok_or_else(|| VoiceError::Acquisition(format!("output device not found: {}", wanted))),
        None => host
            .default_output_device()
            .ok_or_else(|| VoiceError::Acquisition("no default output device available".to_string())),
    }
}

fn open_output_stream(name: Option<&str>, shared: RenderState) -> VoiceResult<(Stream, u32)> {
    let device = select_output_device(name)?;
    let device_name = device.name().unwrap_or_else(|_| "unknown".into());

    let supported = device
        .default_output_config()
        .map_err(|e| VoiceError::Acquisition(format!("failed to get output config: {}", e)))?;

    let sample_rate = supported.sample_rate().0;
    let stream_config: StreamConfig = supported.config();

    info!(
        "Output device {}: {}Hz, {} channels, {:?}",
        device_name,
        sample_rate,
        stream_config.channels,
        supported.sample_format()
    );

    let stream = match supported.sample_format() {
        cpal::SampleFormat::F32 => build_stream::<f32>(&device, &stream_config, shared)?,
        cpal::SampleFormat::I16 => build_stream::<i16>(&device, &stream_config, shared)?,
        cpal::SampleFormat::U16 => build_stream::<u16>(&device, &stream_config, shared)?,
        other => {
            return Err(VoiceError::Acquisition(format!(
                "unsupported output sample format: {:?}",
                other
            )))
        }
    };

    stream
        .play()
        .map_err(|e| VoiceError::Acquisition(format!("failed to start output stream: {}", e)))?;

    Ok((stream, sample_rate))
}

fn build_stream<T>(device: &Device, config: &StreamConfig, shared: RenderState) -> VoiceResult<Stream>
where
    T: SizedSample + FromSample<f32>,
{
    let channels = config.channels as usize;
    let mut scratch: Vec<f32> = Vec::new();

    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                scratch.resize(data.len(), 0.0);
                shared.render(&mut scratch, channels);
                for (out, s) in data.iter_mut().zip(scratch.iter()) {
                    *out = T::from_sample(*s);
                }
            },
            |err| error!("Audio output stream error: {}", err),
            None,
        )
        .map_err(|e| VoiceError::Acquisition(format!("failed to build output stream: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render_state() -> (RenderState, mpsc::UnboundedReceiver<BufferId>) {
        let (ended_tx, ended_rx) = mpsc::unbounded_channel();
        let state = RenderState {
            timeline: Arc::new(Mutex::new(Timeline::default())),
            position: Arc::new(AtomicU64::new(0)),
            ended_tx,
        };
        (state, ended_rx)
    }

    #[test]
    fn test_render_mixes_and_reports_ended_voice() {
        let (state, mut ended_rx) = render_state();
        state.timeline.lock().voices.push(Voice {
            id: 7,
            start_frame: 2,
            samples: vec![0.5, 0.25],
        });

        let mut out = vec![0.0; 4];
        state.render(&mut out, 1);

        assert_eq!(out, vec![0.0, 0.0, 0.5, 0.25]);
        assert_eq!(state.position.load(Ordering::Acquire), 4);
        assert_eq!(ended_rx.try_recv().unwrap(), 7);
        assert!(state.timeline.lock().voices.is_empty());
    }

    #[test]
    fn test_render_duplicates_mono_to_all_channels() {
        let (state, _ended_rx) = render_state();
        state.timeline.lock().voices.push(Voice {
            id: 1,
            start_frame: 0,
            samples: vec![0.5, 0.5, 0.5],
        });

        let mut out = vec![0.0; 4];
        state.render(&mut out, 2);

        assert_eq!(out, vec![0.5, 0.5, 0.5, 0.5]);
        assert_eq!(state.timeline.lock().voices.len(), 1, "voice still has one frame left");
    }

    #[test]
    fn test_back_to_back_voices_are_contiguous() {
        let mut timeline = Timeline::default();
        let buffer = PcmBuffer::mono(vec![0.1; 1001], 24_000);

        // Cursor arithmetic as the scheduler does it: each start is the previous end
        let mut start_at = 0.0;
        for id in 0..5 {
            let samples = resample_linear(&buffer.to_mono(), buffer.sample_rate, 44_100);
            let end_at = start_at + buffer.duration_secs();
            timeline.place(id, samples, start_at, end_at, 44_100);
            start_at = end_at;
        }

        for pair in timeline.voices.windows(2) {
            assert_eq!(
                pair[1].start_frame,
                pair[0].end_frame(),
                "voice {} should start where voice {} ends",
                pair[1].id,
                pair[0].id
            );
        }
    }

    #[test]
    fn test_placement_after_gap_uses_clock_time() {
        let mut timeline = Timeline::default();
        timeline.place(1, vec![0.0; 100], 0.0, 0.01, 10_000);
        timeline.place(2, vec![0.0; 100], 0.5, 0.51, 10_000);
        assert_eq!(timeline.voices[1].start_frame, 5000);

        timeline.clear();
        timeline.place(3, vec![0.0; 10], 0.51, 0.511, 10_000);
        assert_eq!(timeline.voices[0].start_frame, 5100);
    }

    #[test]
    fn test_close_returns_while_thread_winds_down() {
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let thread = std::thread::spawn(move || {
            let _ = stop_rx.blocking_recv();
            std::thread::sleep(std::time::Duration::from_millis(500));
        });
        let mut output = CpalOutput {
            timeline: Arc::new(Mutex::new(Timeline::default())),
            position: Arc::new(AtomicU64::new(0)),
            sample_rate: 48_000,
            worker: Some(OutputWorker {
                stop_tx: Some(stop_tx),
                thread: Some(thread),
            }),
        };

        let started = std::time::Instant::now();
        output.close();
        assert!(started.elapsed() < std::time::Duration::from_millis(250));
        assert!(output.worker.is_none());
    }

    #[test]
    #[ignore = "Requires audio hardware"]
    fn test_open_default_output() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let (ended_tx, _ended_rx) = mpsc::unbounded_channel();
            let mut output = CpalOutput::open(None, ended_tx).await.unwrap();
            assert!(output.sample_rate() > 0);
            output.close();
        });
    }
}
