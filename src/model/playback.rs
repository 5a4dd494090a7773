//! Playback-related types and position tracking

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::Instant;

use super::track::TrackDescriptor;
use super::types::{PlaybackState, RepeatMode};

/// Position clock for a source, extrapolated from the last known anchor
#[derive(Clone, Debug)]
pub struct PlaybackTiming {
    pub position_ms: u64,
    pub last_update: Instant,
    pub is_playing: bool,
    /// 0 when the length is unknown
    pub duration_ms: u64,
}

impl PlaybackTiming {
    pub fn new(duration: Option<Duration>) -> Self {
        Self {
            position_ms: 0,
            last_update: Instant::now(),
            is_playing: false,
            duration_ms: duration.map(|d| d.as_millis() as u64).unwrap_or(0),
        }
    }

    pub fn current_position_ms(&self) -> u64 {
        let position = if self.is_playing {
            let elapsed = self.last_update.elapsed().as_millis() as u64;
            self.position_ms.saturating_add(elapsed)
        } else {
            self.position_ms
        };

        if self.duration_ms > 0 {
            position.min(self.duration_ms)
        } else {
            position
        }
    }

    pub fn current_position(&self) -> Duration {
        Duration::from_millis(self.current_position_ms())
    }

    /// Time left before the end, if the length is known
    pub fn remaining(&self) -> Option<Duration> {
        (self.duration_ms > 0)
            .then(|| Duration::from_millis(self.duration_ms.saturating_sub(self.current_position_ms())))
    }

    pub fn update_position(&mut self, new_position_ms: u64, is_playing: bool) {
        self.position_ms = if self.duration_ms > 0 {
            new_position_ms.min(self.duration_ms)
        } else {
            new_position_ms
        };
        self.last_update = Instant::now();
        self.is_playing = is_playing;
    }

    pub fn resume(&mut self) {
        let position = self.current_position_ms();
        self.update_position(position, true);
    }

    pub fn pause(&mut self) {
        let position = self.current_position_ms();
        self.update_position(position, false);
    }
}

/// Everything a front-end needs to render the player
#[derive(Clone, Debug, Default)]
pub struct PlaybackSnapshot {
    pub state: PlaybackState,
    pub track: Option<TrackDescriptor>,
    pub position: Duration,
    pub duration: Duration,
    pub volume: f32,
    pub shuffle: bool,
    pub repeat: RepeatMode,
    pub queue_len: usize,
    pub cursor: isize,
    pub sleep_timer_expires: Option<DateTime<Utc>>,
}

impl PlaybackSnapshot {
    pub fn progress_percent(&self) -> f32 {
        if self.duration.is_zero() {
            0.0
        } else {
            (self.position.as_secs_f32() / self.duration.as_secs_f32() * 100.0).clamp(0.0, 100.0)
        }
    }
}
