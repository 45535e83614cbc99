//! PCM16 wire codec
//!
//! Float samples travel as base64 of little-endian signed 16-bit PCM.
//! Negative samples scale by 32768 and positive by 32767 so that both
//! ends of [-1, 1] map onto the full `i16` range.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::error::{VoiceError, VoiceResult};

/// Convert one float sample to PCM16, clamping out-of-range input
pub fn sample_to_i16(sample: f32) -> i16 {
    let s = if sample.is_nan() { 0.0 } else { sample.clamp(-1.0, 1.0) };
    let scaled = if s < 0.0 { s * 32768.0 } else { s * 32767.0 };
    scaled.round() as i16
}

/// Convert one PCM16 sample back to float
pub fn i16_to_sample(sample: i16) -> f32 {
    sample as f32 / 32768.0
}

/// Serialize float samples as little-endian PCM16 bytes
pub fn samples_to_pcm16(samples: &[f32]) -> Vec<u8> {
    samples
        .iter()
        .flat_map(|&s| sample_to_i16(s).to_le_bytes())
        .collect()
}

/// Encode float samples into the base64 PCM16 wire form. Never fails.
pub fn encode(samples: &[f32]) -> String {
    STANDARD.encode(samples_to_pcm16(samples))
}

/// Recover raw bytes from a base64 payload
///
/// PCM-to-float conversion is left to [`super::decoder::decode_audio_data`].
pub fn decode(data: &str) -> VoiceResult<Vec<u8>> {
    STANDARD
        .decode(data.trim())
        .map_err(|e| VoiceError::Decode(format!("malformed base64: {}", e)))
}

/// Default rate assumed for inbound audio whose mime type names none
pub const DEFAULT_OUTPUT_RATE: u32 = 24000;

/// Base64 PCM16 payload plus its mime type, e.g. `audio/pcm;rate=16000`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedBlob {
    pub data: String,
    pub mime_type: String,
}

impl EncodedBlob {
    /// Encode mono float samples captured at `sample_rate`
    pub fn from_samples(samples: &[f32], sample_rate: u32) -> Self {
        Self {
            data: encode(samples),
            mime_type: pcm_mime_type(sample_rate),
        }
    }

    /// Rate declared by the mime type's `rate=` parameter
    pub fn sample_rate(&self) -> Option<u32> {
        parse_rate(&self.mime_type)
    }

    /// Raw PCM16 bytes
    pub fn bytes(&self) -> VoiceResult<Vec<u8>> {
        decode(&self.data)
    }
}

pub fn pcm_mime_type(sample_rate: u32) -> String {
    format!("audio/pcm;rate={}", sample_rate)
}

/// Extract `rate=N` from a mime type such as `audio/pcm;rate=24000`
pub fn parse_rate(mime_type: &str) -> Option<u32> {
    mime_type
        .split(';')
        .skip(1)
        .filter_map(|param| param.trim().split_once('='))
        .find(|(key, _)| key.trim().eq_ignore_ascii_case("rate"))
        .and_then(|(_, value)| value.trim().parse().ok())
}
