use serde::{Deserialize, Serialize};

/// User-visible status of voice mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoiceStatus {
    Idle,
    Connecting,
    Active,
    Error,
}

impl VoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoiceStatus::Idle => "idle",
            VoiceStatus::Connecting => "connecting",
            VoiceStatus::Active => "active",
            VoiceStatus::Error => "error",
        }
    }

    /// A session is being set up or is live
    pub fn is_running(&self) -> bool {
        matches!(self, VoiceStatus::Connecting | VoiceStatus::Active)
    }
}

/// Everything a UI needs to render voice mode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceSnapshot {
    pub status: VoiceStatus,
    /// Short human-readable reason when `status` is `Error`
    pub reason: Option<String>,
    /// Transcript of the spoken replies so far
    pub transcript: String,
    /// Synthesized speech is playing or queued
    pub speaking: bool,
    pub session_id: Option<String>,
}

impl Default for VoiceSnapshot {
    fn default() -> Self {
        Self {
            status: VoiceStatus::Idle,
            reason: None,
            transcript: String::new(),
            speaking: false,
            session_id: None,
        }
    }
}
