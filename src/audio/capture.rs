//! Capture pipeline: loudness metering, encoding and outbound forwarding

use tokio::sync::watch;
use tracing::debug;

use super::backend::AudioFrame;
use super::codec::EncodedBlob;
use super::dsp::rms;
use crate::error::VoiceResult;
use crate::live::LiveSession;

/// Turns captured frames into outbound blobs
///
/// The loudness of the latest frame is published on a watch channel, so
/// readers only ever observe the most recent value.
pub struct CapturePipeline {
    level_tx: watch::Sender<f32>,
    frames_forwarded: u64,
}

impl CapturePipeline {
    pub fn new(level_tx: watch::Sender<f32>) -> Self {
        Self {
            level_tx,
            frames_forwarded: 0,
        }
    }

    /// Meter and encode one frame
    pub fn process(&self, frame: &AudioFrame) -> EncodedBlob {
        self.level_tx.send_replace(rms(&frame.samples));
        EncodedBlob::from_samples(&frame.samples, frame.sample_rate)
    }

    /// Meter, encode and hand the frame to the session without waiting on
    /// the remote side
    pub fn forward(&mut self, frame: &AudioFrame, session: &LiveSession) -> VoiceResult<()> {
        let blob = self.process(frame);
        session.send_frame(blob)?;
        self.frames_forwarded += 1;
        if self.frames_forwarded % 100 == 0 {
            debug!("Forwarded {} capture frames", self.frames_forwarded);
        }
        Ok(())
    }

    /// Clear the published level (session ended)
    pub fn reset(&mut self) {
        self.level_tx.send_replace(0.0);
        self.frames_forwarded = 0;
    }

    pub fn frames_forwarded(&self) -> u64 {
        self.frames_forwarded
    }
}
