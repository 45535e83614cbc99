//! Voice session management
//!
//! This module ties capture, transport and playback together:
//! - `VoiceController` owns one session at a time and runs it from a single task
//! - `VoiceHandle` sends start/stop commands and observes snapshots
//! - `AudioDevices` opens the microphone and speaker for each session
//! - Session statistics and UI-facing state

mod config;
mod controller;
mod devices;
mod handle;
mod state;
mod stats;

pub use config::{VoiceSessionConfig, DEFAULT_LIVE_MODEL};
pub use controller::{Command, SessionEvent, VoiceController};
pub use devices::{AudioDevices, SystemDevices};
pub use handle::VoiceHandle;
pub use state::{VoiceSnapshot, VoiceStatus};
pub use stats::VoiceStats;
