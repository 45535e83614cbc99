use anyhow::{ensure, Context, Result};
use serde::Deserialize;
use std::path::PathBuf;

use crate::audio::{AudioBackendConfig, AudioSource};
use crate::chat::prompts::SYSTEM_INSTRUCTION;
use crate::live::{LiveConfig, DEFAULT_ENDPOINT, DEFAULT_VOICE};
use crate::playback::DEFAULT_MAX_ACTIVE_BUFFERS;
use crate::session::{SystemDevices, VoiceSessionConfig, DEFAULT_LIVE_MODEL};

/// Environment variables with this prefix override file settings,
/// e.g. `COMPANION__LIVE__API_KEY`
pub const ENV_PREFIX: &str = "COMPANION";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub service: ServiceConfig,
    pub live: LiveSettings,
    pub audio: AudioConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "cognitive-companion".to_string(),
            http: HttpConfig::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 3030,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LiveSettings {
    pub endpoint: String,
    pub model: String,
    pub voice: String,
    pub api_key: String,
    pub system_instruction: String,
}

impl Default for LiveSettings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_LIVE_MODEL.to_string(),
            voice: DEFAULT_VOICE.to_string(),
            api_key: String::new(),
            system_instruction: SYSTEM_INSTRUCTION.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub input_sample_rate: u32,
    pub frame_size: usize,
    pub output_sample_rate: u32,
    pub output_channels: u16,
    pub max_active_buffers: usize,
    /// Capture device name (None = system default)
    pub input_device: Option<String>,
    pub output_device: Option<String>,
    /// Stream a WAV file instead of the microphone
    pub input_file: Option<PathBuf>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            input_sample_rate: 16000,
            frame_size: 4096,
            output_sample_rate: 24000,
            output_channels: 1,
            max_active_buffers: DEFAULT_MAX_ACTIVE_BUFFERS,
            input_device: None,
            output_device: None,
            input_file: None,
        }
    }
}

impl Config {
    /// Load `path` (extension optional, file optional) plus environment overrides
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()
            .with_context(|| format!("failed to read configuration from {}", path))?;

        let config: Self = settings.try_deserialize().context("malformed configuration")?;
        config
            .validate()
            .with_context(|| format!("invalid configuration in {}", path))?;
        Ok(config)
    }

    /// Reject audio settings the capture and playback paths cannot run with
    pub fn validate(&self) -> Result<()> {
        let audio = &self.audio;
        ensure!(audio.input_sample_rate > 0, "audio.input_sample_rate must be greater than zero");
        ensure!(audio.frame_size > 0, "audio.frame_size must be greater than zero");
        ensure!(audio.output_sample_rate > 0, "audio.output_sample_rate must be greater than zero");
        ensure!(audio.output_channels > 0, "audio.output_channels must be greater than zero");
        ensure!(audio.max_active_buffers > 0, "audio.max_active_buffers must be greater than zero");
        Ok(())
    }

    pub fn session_config(&self) -> VoiceSessionConfig {
        VoiceSessionConfig {
            live: LiveConfig {
                endpoint: self.live.endpoint.clone(),
                model: self.live.model.clone(),
                api_key: self.live.api_key.clone(),
                voice: self.live.voice.clone(),
                system_instruction: self.live.system_instruction.clone(),
                output_transcription: true,
            },
            output_sample_rate: self.audio.output_sample_rate,
            output_channels: self.audio.output_channels,
            max_active_buffers: self.audio.max_active_buffers,
        }
    }

    pub fn devices(&self) -> SystemDevices {
        let source = match &self.audio.input_file {
            Some(path) => AudioSource::File(path.clone()),
            None => AudioSource::Microphone,
        };

        SystemDevices {
            source,
            capture: AudioBackendConfig {
                sample_rate: self.audio.input_sample_rate,
                frame_size: self.audio.frame_size,
                device: self.audio.input_device.clone(),
                ..AudioBackendConfig::default()
            },
            output_device: self.audio.output_device.clone(),
        }
    }
}
