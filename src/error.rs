//! Error types for the voice engine

use thiserror::Error;

/// Everything that can go wrong while running a voice session
#[derive(Debug, Error)]
pub enum VoiceError {
    /// Microphone or output device could not be opened (permission, hardware)
    #[error("audio device unavailable: {0}")]
    Acquisition(String),

    /// Remote session handshake failed
    #[error("failed to connect live session: {0}")]
    Connect(String),

    /// Send/receive failure or an error reported by the remote session
    #[error("live session transport failed: {0}")]
    Transport(String),

    /// Malformed audio payload
    #[error("invalid audio payload: {0}")]
    Decode(String),

    /// `start()` while a session is connecting or active
    #[error("a voice session is already running")]
    AlreadyRunning,

    /// The controller task has shut down
    #[error("voice controller is not running")]
    ControllerGone,
}

impl VoiceError {
    /// Short reason suitable for showing to a user
    pub fn user_message(&self) -> &'static str {
        match self {
            VoiceError::Acquisition(_) => "Please check your microphone permissions and try again.",
            VoiceError::Connect(_) => "Could not reach the voice service.",
            VoiceError::Transport(_) => "The conversation was interrupted.",
            VoiceError::Decode(_) => "Received audio could not be played.",
            VoiceError::AlreadyRunning => "A conversation is already in progress.",
            VoiceError::ControllerGone => "Voice mode is unavailable.",
        }
    }

    /// Whether this error ends the session it occurred in
    pub fn is_fatal(&self) -> bool {
        !matches!(self, VoiceError::Decode(_) | VoiceError::AlreadyRunning)
    }
}

pub type VoiceResult<T> = Result<T, VoiceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_errors_do_not_end_session() {
        assert!(!VoiceError::Decode("odd length".to_string()).is_fatal());
        assert!(!VoiceError::AlreadyRunning.is_fatal());
        assert!(VoiceError::Transport("writer stopped".to_string()).is_fatal());
        assert!(VoiceError::Acquisition("no device".to_string()).is_fatal());
    }
}
