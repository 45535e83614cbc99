use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Statistics about a voice session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceStats {
    /// Session identifier
    pub session_id: String,

    /// Whether the session is still running
    pub is_active: bool,

    /// When the session became active
    pub started_at: DateTime<Utc>,

    /// Total duration in seconds
    pub duration_secs: f64,

    /// Captured frames handed to the transport
    pub frames_sent: u64,

    /// Inbound audio chunks scheduled for playback
    pub chunks_played: u64,

    /// Chunks dropped because the playback backlog was full
    pub chunks_dropped: u64,

    /// Inbound chunks that failed to decode
    pub decode_errors: u64,

    /// Barge-in events received
    pub interruptions: u64,

    /// Completed model turns
    pub turns_completed: u64,
}

/// Running counters for the active session
#[derive(Debug, Clone)]
pub(crate) struct SessionCounters {
    pub started_at: DateTime<Utc>,
    pub frames_sent: u64,
    pub chunks_played: u64,
    pub decode_errors: u64,
    pub interruptions: u64,
    pub turns_completed: u64,
}

impl SessionCounters {
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            frames_sent: 0,
            chunks_played: 0,
            decode_errors: 0,
            interruptions: 0,
            turns_completed: 0,
        }
    }

    pub fn to_stats(&self, session_id: &str, is_active: bool, chunks_dropped: u64) -> VoiceStats {
        let duration = Utc::now().signed_duration_since(self.started_at);
        VoiceStats {
            session_id: session_id.to_string(),
            is_active,
            started_at: self.started_at,
            duration_secs: duration.num_milliseconds() as f64 / 1000.0,
            frames_sent: self.frames_sent,
            chunks_played: self.chunks_played,
            chunks_dropped,
            decode_errors: self.decode_errors,
            interruptions: self.interruptions,
            turns_completed: self.turns_completed,
        }
    }
}
