//! Gapless playback scheduling
//!
//! Every buffer starts at `max(clock, next_start)` and pushes the cursor by
//! its duration, so back-to-back buffers never overlap and never leave a gap
//! while delivery keeps pace with real time. Interruption stops everything
//! and pulls the cursor back to the clock.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use super::output::{AudioOutput, BufferId};
use crate::audio::PcmBuffer;

/// Default cap on simultaneously scheduled buffers
pub const DEFAULT_MAX_ACTIVE_BUFFERS: usize = 512;

/// Where a buffer landed on the output timeline
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduledBuffer {
    pub id: BufferId,
    pub start_at: f64,
    pub duration: f64,
}

impl ScheduledBuffer {
    pub fn end_at(&self) -> f64 {
        self.start_at + self.duration
    }
}

#[derive(Debug)]
pub struct PlaybackScheduler {
    next_start: f64,
    active: BTreeMap<BufferId, ScheduledBuffer>,
    next_id: BufferId,
    max_active: usize,
    evicted: u64,
}

impl Default for PlaybackScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ACTIVE_BUFFERS)
    }
}

impl PlaybackScheduler {
    pub fn new(max_active: usize) -> Self {
        Self {
            next_start: 0.0,
            active: BTreeMap::new(),
            next_id: 0,
            max_active: max_active.max(1),
            evicted: 0,
        }
    }

    /// Schedule a decoded buffer right after everything already queued
    ///
    /// A zero-length buffer completes immediately: it never enters the
    /// active set and does not move the cursor.
    pub fn schedule(&mut self, output: &mut dyn AudioOutput, buffer: &PcmBuffer) -> ScheduledBuffer {
        let id = self.next_id;
        self.next_id += 1;

        let start_at = self.next_start.max(output.now());
        let duration = buffer.duration_secs();
        let scheduled = ScheduledBuffer {
            id,
            start_at,
            duration,
        };

        if buffer.is_empty() {
            debug!("Skipping empty playback buffer {}", id);
            return scheduled;
        }

        if self.active.len() >= self.max_active {
            self.evict_oldest(output);
        }

        output.play(id, buffer, start_at);
        self.next_start = start_at + duration;
        self.active.insert(id, scheduled);

        scheduled
    }

    /// Natural end of a buffer. Returns true when this ended the speech.
    pub fn on_ended(&mut self, id: BufferId) -> bool {
        self.active.remove(&id).is_some() && self.active.is_empty()
    }

    /// Barge-in: stop every buffer and restart the cursor at the clock
    ///
    /// Returns the number of buffers that were stopped.
    pub fn interrupt(&mut self, output: &mut dyn AudioOutput) -> usize {
        let stopped = self.stop_all(output);
        self.next_start = output.now();
        if stopped > 0 {
            debug!("Interrupted playback, {} buffers stopped", stopped);
        }
        stopped
    }

    /// Drop all scheduling state at the end of a session
    pub fn reset(&mut self, output: &mut dyn AudioOutput) {
        self.stop_all(output);
        self.next_start = 0.0;
    }

    /// Forget all buffers without touching an output (the device is gone)
    pub fn clear(&mut self) {
        self.active.clear();
        self.next_start = 0.0;
    }

    fn stop_all(&mut self, output: &mut dyn AudioOutput) -> usize {
        let stopped = self.active.len();
        for id in std::mem::take(&mut self.active).into_keys() {
            output.stop(id);
        }
        stopped
    }

    fn evict_oldest(&mut self, output: &mut dyn AudioOutput) {
        if let Some((id, _)) = self.active.pop_first() {
            output.stop(id);
            self.evicted += 1;
            warn!(
                "Playback backlog above {} buffers, dropped buffer {} ({} dropped so far)",
                self.max_active, id, self.evicted
            );
        }
    }

    /// True while any buffer is playing or waiting to play
    pub fn is_speaking(&self) -> bool {
        !self.active.is_empty()
    }

    pub fn next_start_time(&self) -> f64 {
        self.next_start
    }

    pub fn active_len(&self) -> usize {
        self.active.len()
    }

    pub fn active_ids(&self) -> Vec<BufferId> {
        self.active.keys().copied().collect()
    }

    /// Buffers dropped because the backlog cap was reached
    pub fn evicted(&self) -> u64 {
        self.evicted
    }
}
