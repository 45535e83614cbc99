use crate::session::VoiceHandle;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Front end to the voice controller task
    pub voice: VoiceHandle,
}

impl AppState {
    pub fn new(voice: VoiceHandle) -> Self {
        Self { voice }
    }
}
