use crate::chat::prompts::SYSTEM_INSTRUCTION;
use crate::live::{LiveConfig, DEFAULT_ENDPOINT, DEFAULT_VOICE};
use crate::playback::DEFAULT_MAX_ACTIVE_BUFFERS;

/// Default live model
pub const DEFAULT_LIVE_MODEL: &str = "gemini-2.5-flash-native-audio-preview-12-2025";

/// Configuration for a voice session
#[derive(Debug, Clone)]
pub struct VoiceSessionConfig {
    /// Remote session settings
    pub live: LiveConfig,

    /// Rate assumed for inbound audio when its mime type names none
    pub output_sample_rate: u32,

    /// Channel count of inbound audio
    pub output_channels: u16,

    /// Cap on scheduled playback buffers before the oldest is dropped
    pub max_active_buffers: usize,
}

impl Default for VoiceSessionConfig {
    fn default() -> Self {
        Self {
            live: LiveConfig {
                endpoint: DEFAULT_ENDPOINT.to_string(),
                model: DEFAULT_LIVE_MODEL.to_string(),
                api_key: String::new(),
                voice: DEFAULT_VOICE.to_string(),
                system_instruction: SYSTEM_INSTRUCTION.to_string(),
                output_transcription: true,
            },
            output_sample_rate: 24000,
            output_channels: 1,
            max_active_buffers: DEFAULT_MAX_ACTIVE_BUFFERS,
        }
    }
}
