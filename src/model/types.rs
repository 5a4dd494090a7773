//! Core type definitions shared across the player

use serde::{Deserialize, Serialize};

/// Transport state of the playback engine
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PlaybackState {
    #[default]
    Idle,
    Loading,
    Playing,
    Paused,
}

impl PlaybackState {
    pub fn is_active(self) -> bool {
        self != PlaybackState::Idle
    }
}

/// Repeat mode state
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatMode {
    #[default]
    Off,
    All,
    One,
}

impl RepeatMode {
    pub fn next(self) -> Self {
        match self {
            RepeatMode::Off => RepeatMode::All,
            RepeatMode::All => RepeatMode::One,
            RepeatMode::One => RepeatMode::Off,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            RepeatMode::Off => "Repeat: Off",
            RepeatMode::All => "Repeat: All",
            RepeatMode::One => "Repeat: One",
        }
    }
}

/// Policy consulted by `PlayQueue::advance`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct AdvanceMode {
    pub repeat: RepeatMode,
    pub shuffle: bool,
}
