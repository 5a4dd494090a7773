//! Ordered play queue with a cursor

use std::collections::HashSet;

use rand::Rng;

use super::track::TrackDescriptor;
use super::types::{AdvanceMode, RepeatMode};

/// Result of [`PlayQueue::advance`]
#[derive(Clone, Debug, PartialEq)]
pub enum Advance {
    /// Repeat-one: play the same track again from the start
    Restart(TrackDescriptor),
    /// The cursor moved; play this track
    Track(TrackDescriptor),
    /// Nothing left to play
    Exhausted,
}

/// Result of [`PlayQueue::remove_at`]
#[derive(Clone, Debug, PartialEq)]
pub enum Removal {
    /// Index was out of range
    NotFound,
    /// A non-current slot was removed
    Removed(TrackDescriptor),
    /// The current slot was removed. `next` is the track that slid into the
    /// cursor position, if any; the caller decides whether to play it.
    CurrentRemoved {
        removed: TrackDescriptor,
        next: Option<TrackDescriptor>,
    },
}

/// Queue of track descriptors.
///
/// `cursor` is -1 when nothing has been selected and otherwise always a
/// valid index.
#[derive(Clone, Debug)]
pub struct PlayQueue {
    tracks: Vec<TrackDescriptor>,
    cursor: isize,
}

impl Default for PlayQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl PlayQueue {
    pub fn new() -> Self {
        Self {
            tracks: Vec::new(),
            cursor: -1,
        }
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn cursor(&self) -> isize {
        self.cursor
    }

    pub fn tracks(&self) -> &[TrackDescriptor] {
        &self.tracks
    }

    pub fn current(&self) -> Option<&TrackDescriptor> {
        usize::try_from(self.cursor).ok().and_then(|i| self.tracks.get(i))
    }

    /// Tracks after the cursor, in play order (ignores shuffle)
    pub fn upcoming(&self) -> &[TrackDescriptor] {
        let start = usize::try_from(self.cursor + 1).unwrap_or(0).min(self.tracks.len());
        &self.tracks[start..]
    }

    pub fn contains(&self, track_id: &str) -> bool {
        self.tracks.iter().any(|t| t.id == track_id)
    }

    pub fn enqueue(&mut self, track: TrackDescriptor) {
        self.tracks.push(track);
    }

    /// Insert right after the cursor (at the front when nothing is selected).
    pub fn play_next(&mut self, track: TrackDescriptor) {
        let at = usize::try_from(self.cursor + 1).unwrap_or(0).min(self.tracks.len());
        self.tracks.insert(at, track);
    }

    pub fn remove_at(&mut self, index: usize) -> Removal {
        if index >= self.tracks.len() {
            return Removal::NotFound;
        }

        let removed = self.tracks.remove(index);
        let index = index as isize;

        if index < self.cursor {
            self.cursor -= 1;
            Removal::Removed(removed)
        } else if index == self.cursor {
            self.cursor = self.cursor.min(self.tracks.len() as isize - 1);
            let next = if (index as usize) < self.tracks.len() {
                Some(self.tracks[index as usize].clone())
            } else {
                None
            };
            Removal::CurrentRemoved { removed, next }
        } else {
            Removal::Removed(removed)
        }
    }

    /// Truncate to nothing, or to just the current track.
    pub fn clear(&mut self, keep_current: bool) {
        let current = if keep_current { self.current().cloned() } else { None };
        match current {
            Some(track) => {
                self.tracks = vec![track];
                self.cursor = 0;
            }
            None => {
                self.tracks.clear();
                self.cursor = -1;
            }
        }
    }

    /// Replace the whole queue and select `start`.
    pub fn replace(&mut self, tracks: Vec<TrackDescriptor>, start: usize) -> Option<TrackDescriptor> {
        self.tracks = tracks;
        self.cursor = if start < self.tracks.len() { start as isize } else { -1 };
        self.current().cloned()
    }

    /// Start a new listening context from a track picked outside the queue:
    /// everything after the cursor is dropped, the track is appended and
    /// becomes current.
    pub fn start_context(&mut self, track: TrackDescriptor) {
        let keep = usize::try_from(self.cursor + 1).unwrap_or(0).min(self.tracks.len());
        self.tracks.truncate(keep);
        self.tracks.push(track);
        self.cursor = self.tracks.len() as isize - 1;
    }

    pub fn jump_to(&mut self, index: usize) -> Option<TrackDescriptor> {
        let track = self.tracks.get(index)?.clone();
        self.cursor = index as isize;
        Some(track)
    }

    /// Move the cursor back one slot, stopping at the first track.
    pub fn step_back(&mut self) -> Option<TrackDescriptor> {
        if self.tracks.is_empty() {
            return None;
        }
        self.cursor = (self.cursor - 1).max(0);
        self.current().cloned()
    }

    /// Pick the next cursor position.
    ///
    /// Evaluated in order: repeat-one restarts the current track, shuffle
    /// jumps to a uniformly random slot, otherwise the cursor moves forward.
    /// Falling off the end wraps under repeat-all and exhausts the queue
    /// otherwise.
    pub fn advance<R: Rng>(&mut self, mode: AdvanceMode, rng: &mut R) -> Advance {
        if self.tracks.is_empty() {
            return Advance::Exhausted;
        }

        if mode.repeat == RepeatMode::One {
            if let Some(track) = self.current() {
                return Advance::Restart(track.clone());
            }
        }

        let mut next = if mode.shuffle {
            rng.gen_range(0..self.tracks.len()) as isize
        } else {
            self.cursor + 1
        };

        if next >= self.tracks.len() as isize {
            if mode.repeat == RepeatMode::All {
                next = 0;
            } else {
                return Advance::Exhausted;
            }
        }

        self.cursor = next;
        Advance::Track(self.tracks[next as usize].clone())
    }

    /// Whether [`advance`](Self::advance) would move on to a track, without
    /// touching the cursor. A repeat-one restart does not count.
    pub fn has_following(&self, mode: AdvanceMode) -> bool {
        if self.tracks.is_empty() || (mode.repeat == RepeatMode::One && self.current().is_some()) {
            return false;
        }
        mode.shuffle || mode.repeat == RepeatMode::All || self.cursor + 1 < self.tracks.len() as isize
    }

    /// Append candidates whose id is not already queued. Returns how many
    /// were added.
    pub fn auto_extend(&mut self, related: impl IntoIterator<Item = TrackDescriptor>) -> usize {
        let mut known: HashSet<String> = self.tracks.iter().map(|t| t.id.clone()).collect();
        let before = self.tracks.len();
        for track in related {
            if known.insert(track.id.clone()) {
                self.tracks.push(track);
            }
        }
        self.tracks.len() - before
    }
}
