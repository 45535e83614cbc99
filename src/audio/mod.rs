pub mod backend;
pub mod capture;
pub mod codec;
pub mod decoder;
pub mod dsp;
pub mod file;
pub mod microphone;

pub use backend::{AudioBackend, AudioBackendConfig, AudioBackendFactory, AudioFrame, AudioSource};
pub use capture::CapturePipeline;
pub use codec::{decode, encode, EncodedBlob};
pub use decoder::{decode_audio_data, PcmBuffer};
pub use file::{AudioFile, FileBackend};
pub use microphone::MicrophoneBackend;
