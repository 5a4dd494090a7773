//! Liked tracks and recently played history

use serde::{Deserialize, Serialize};

use super::track::TrackDescriptor;

pub const RECENTLY_PLAYED_LIMIT: usize = 20;

/// Most-recent-first play history, unique by track id
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecentlyPlayed {
    tracks: Vec<TrackDescriptor>,
}

impl RecentlyPlayed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, track: &TrackDescriptor) {
        self.tracks.retain(|t| t.id != track.id);
        let mut entry = track.clone();
        // Resolved URLs expire server-side; history keeps only catalog data.
        entry.stream_url = None;
        self.tracks.insert(0, entry);
        self.tracks.truncate(RECENTLY_PLAYED_LIMIT);
    }

    pub fn clear(&mut self) {
        self.tracks.clear();
    }

    pub fn tracks(&self) -> &[TrackDescriptor] {
        &self.tracks
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}

/// Liked tracks, newest first
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LikedTracks {
    tracks: Vec<TrackDescriptor>,
}

impl LikedTracks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_liked(&self, track_id: &str) -> bool {
        self.tracks.iter().any(|t| t.id == track_id)
    }

    /// Flip membership; returns whether the track is liked afterwards.
    pub fn toggle(&mut self, track: &TrackDescriptor) -> bool {
        if let Some(index) = self.tracks.iter().position(|t| t.id == track.id) {
            self.tracks.remove(index);
            false
        } else {
            let mut entry = track.clone();
            entry.stream_url = None;
            self.tracks.insert(0, entry);
            true
        }
    }

    pub fn replace(&mut self, tracks: Vec<TrackDescriptor>) {
        self.tracks = tracks;
    }

    pub fn tracks(&self) -> &[TrackDescriptor] {
        &self.tracks
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.tracks.iter().map(|t| t.id.as_str())
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(id: &str) -> TrackDescriptor {
        TrackDescriptor::new(id, id, "artist")
    }

    #[test]
    fn recently_played_is_capped_and_deduplicated() {
        let mut recent = RecentlyPlayed::new();
        for i in 0..25 {
            recent.record(&track(&format!("t{}", i)));
        }
        assert_eq!(recent.len(), RECENTLY_PLAYED_LIMIT);
        assert_eq!(recent.tracks()[0].id, "t24");

        recent.record(&track("t10"));
        assert_eq!(recent.len(), RECENTLY_PLAYED_LIMIT);
        assert_eq!(recent.tracks()[0].id, "t10");
        assert_eq!(recent.tracks().iter().filter(|t| t.id == "t10").count(), 1);
    }

    #[test]
    fn history_drops_resolved_urls() {
        let mut recent = RecentlyPlayed::new();
        recent.record(&track("a").resolved("https://cdn/a.mp3".into()));
        assert_eq!(recent.tracks()[0].stream_url, None);
    }

    #[test]
    fn toggle_like_flips_membership() {
        let mut liked = LikedTracks::new();
        assert!(liked.toggle(&track("a")));
        assert!(liked.toggle(&track("b")));
        assert_eq!(liked.ids().collect::<Vec<_>>(), ["b", "a"]);

        assert!(!liked.toggle(&track("a")));
        assert!(!liked.is_liked("a"));
        assert!(liked.is_liked("b"));
    }
}
