pub mod audio;
pub mod chat;
pub mod config;
pub mod error;
pub mod http;
pub mod live;
pub mod playback;
pub mod session;

pub use audio::{
    AudioBackend, AudioBackendConfig, AudioBackendFactory, AudioFile, AudioFrame, AudioSource, CapturePipeline,
    EncodedBlob, PcmBuffer,
};
pub use config::Config;
pub use error::{VoiceError, VoiceResult};
pub use http::{create_router, AppState};
pub use live::{InboundEvent, LiveClient, LiveConfig, LiveSession, SessionTransport};
pub use playback::{AudioOutput, BufferId, CpalOutput, PlaybackScheduler};
pub use session::{
    AudioDevices, SystemDevices, VoiceController, VoiceHandle, VoiceSessionConfig, VoiceSnapshot, VoiceStats,
    VoiceStatus,
};
