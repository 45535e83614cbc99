//! Playback of inbound speech

pub mod output;
pub mod scheduler;

pub use output::{AudioOutput, BufferId, CpalOutput};
pub use scheduler::{PlaybackScheduler, ScheduledBuffer, DEFAULT_MAX_ACTIVE_BUFFERS};
