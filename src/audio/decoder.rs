//! Rebuild playable buffers from raw PCM16 bytes

use super::codec::i16_to_sample;
use crate::error::{VoiceError, VoiceResult};

/// A decoded block of float samples, one vector per channel
#[derive(Debug, Clone, PartialEq)]
pub struct PcmBuffer {
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// De-interleaved channel data
    pub channels: Vec<Vec<f32>>,
}

impl PcmBuffer {
    /// Mono buffer from already-decoded samples
    pub fn mono(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            sample_rate,
            channels: vec![samples],
        }
    }

    /// Number of sample frames (samples per channel)
    pub fn frames(&self) -> usize {
        self.channels.first().map(Vec::len).unwrap_or(0)
    }

    /// Playback length in seconds
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / self.sample_rate as f64
    }

    pub fn is_empty(&self) -> bool {
        self.frames() == 0
    }

    /// Mix all channels down to one
    pub fn to_mono(&self) -> Vec<f32> {
        match self.channels.len() {
            0 => Vec::new(),
            1 => self.channels[0].clone(),
            n => (0..self.frames())
                .map(|i| self.channels.iter().map(|c| c[i]).sum::<f32>() / n as f32)
                .collect(),
        }
    }
}

/// Interpret `bytes` as interleaved little-endian PCM16 and split it into
/// `channel_count` float channels tagged with `sample_rate`.
pub fn decode_audio_data(bytes: &[u8], sample_rate: u32, channel_count: u16) -> VoiceResult<PcmBuffer> {
    if channel_count == 0 {
        return Err(VoiceError::Decode("channel count must be at least 1".to_string()));
    }

    let channel_count = channel_count as usize;
    let frame_bytes = 2 * channel_count;
    if bytes.len() % frame_bytes != 0 {
        return Err(VoiceError::Decode(format!(
            "{} bytes is not a whole number of {}-channel PCM16 frames",
            bytes.len(),
            channel_count
        )));
    }

    let frames = bytes.len() / frame_bytes;
    let mut channels = vec![Vec::with_capacity(frames); channel_count];

    for (i, pair) in bytes.chunks_exact(2).enumerate() {
        let sample = i16::from_le_bytes([pair[0], pair[1]]);
        channels[i % channel_count].push(i16_to_sample(sample));
    }

    Ok(PcmBuffer {
        sample_rate,
        channels,
    })
}
