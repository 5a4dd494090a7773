//! Queue edits, shuffle and repeat

use crate::error::Result;
use crate::model::{Removal, RepeatMode, TrackDescriptor};

use super::PlaybackEngine;
use super::playback::Placement;

impl PlaybackEngine {
    /// Queue contents and cursor
    pub async fn queue(&self) -> (Vec<TrackDescriptor>, isize) {
        let s = self.state.lock().await;
        (s.queue.tracks().to_vec(), s.queue.cursor())
    }

    pub async fn upcoming(&self) -> Vec<TrackDescriptor> {
        self.state.lock().await.queue.upcoming().to_vec()
    }

    pub async fn enqueue(&self, track: TrackDescriptor) {
        let mut s = self.state.lock().await;
        tracing::debug!(track_id = %track.id, "Added to queue");
        s.queue.enqueue(track);
        self.emit_queue(&s);
    }

    pub async fn play_next(&self, track: TrackDescriptor) {
        let mut s = self.state.lock().await;
        tracing::debug!(track_id = %track.id, "Playing next");
        s.queue.play_next(track);
        self.emit_queue(&s);
    }

    /// Remove a queue slot.
    ///
    /// When the current slot goes, whatever slid into it starts playing; with
    /// nothing left at that position the engine stops.
    pub async fn remove_from_queue(&self, index: usize) -> Result<Option<TrackDescriptor>> {
        let (removed, follow_up) = {
            let mut s = self.state.lock().await;
            let removal = s.queue.remove_at(index);
            let outcome = match removal {
                Removal::NotFound => return Ok(None),
                Removal::Removed(track) => (track, None),
                Removal::CurrentRemoved { removed, next } if s.playback.is_active() => match next {
                    Some(next) => (removed, Some(next)),
                    None => {
                        self.halt(&mut s);
                        (removed, None)
                    }
                },
                Removal::CurrentRemoved { removed, .. } => (removed, None),
            };
            self.emit_queue(&s);
            outcome
        };
        tracing::debug!(track_id = %removed.id, index, "Removed from queue");

        if let Some(next) = follow_up {
            self.start_track(next, Placement::Queued).await?;
        }
        Ok(Some(removed))
    }

    /// Empty the queue, keeping the current track if one is playing.
    pub async fn clear_queue(&self) {
        let mut s = self.state.lock().await;
        let keep = s.playback.is_active();
        s.queue.clear(keep);
        self.emit_queue(&s);
    }

    /// Replace the queue and start at `start`.
    pub async fn play_all(&self, tracks: Vec<TrackDescriptor>, start: usize) -> Result<()> {
        let first = {
            let mut s = self.state.lock().await;
            let first = s.queue.replace(tracks, start);
            self.emit_queue(&s);
            first
        };
        match first {
            Some(track) => self.start_track(track, Placement::Queued).await.map(|_| ()),
            None => Ok(()),
        }
    }

    pub async fn play_from_queue(&self, index: usize) -> Result<()> {
        let track = {
            let mut s = self.state.lock().await;
            let track = s.queue.jump_to(index);
            if track.is_some() {
                self.emit_queue(&s);
            }
            track
        };
        match track {
            Some(track) => self.start_track(track, Placement::Queued).await.map(|_| ()),
            None => Ok(()),
        }
    }

    pub async fn play_all_liked(&self) -> Result<()> {
        let liked = self.likes.liked().await;
        if liked.is_empty() {
            self.events.notice("No liked songs to play");
            return Ok(());
        }
        tracing::info!(count = liked.len(), "Playing liked songs");
        self.play_all(liked, 0).await
    }

    pub async fn toggle_shuffle(&self) -> bool {
        let mut s = self.state.lock().await;
        s.mode.shuffle = !s.mode.shuffle;
        tracing::debug!(shuffle = s.mode.shuffle, "Shuffle toggled");
        s.mode.shuffle
    }

    /// Off -> all -> one -> off
    pub async fn cycle_repeat(&self) -> RepeatMode {
        let mut s = self.state.lock().await;
        s.mode.repeat = s.mode.repeat.next();
        tracing::debug!(repeat = s.mode.repeat.label(), "Repeat mode changed");
        s.mode.repeat
    }

    pub async fn set_repeat(&self, repeat: RepeatMode) {
        self.state.lock().await.mode.repeat = repeat;
    }

    /// Like or unlike the current track
    pub async fn toggle_like_current(&self) -> Option<bool> {
        let track = self.current_track().await?;
        Some(self.likes.toggle(&track).await)
    }
}

#[cfg(test)]
mod tests {
    use crate::engine::testing::*;
    use crate::events::EngineEvent;
    use crate::events::testing::drain;
    use crate::model::{PlaybackState, RepeatMode};

    #[tokio::test]
    async fn removing_earlier_slot_keeps_current_track() {
        let h = Harness::new().await;
        for id in ["a", "b", "c"] {
            h.stream(id);
        }
        h.engine.play_all(vec![track("a"), track("b"), track("c")], 1).await.unwrap();

        let removed = h.engine.remove_from_queue(0).await.unwrap();

        assert_eq!(removed.map(|t| t.id).as_deref(), Some("a"));
        assert_eq!(h.engine.queue().await.1, 0);
        assert_eq!(h.current_id().await.as_deref(), Some("b"));
    }

    #[tokio::test]
    async fn removing_current_slot_plays_the_track_that_slid_in() {
        let h = Harness::new().await;
        for id in ["a", "b", "c"] {
            h.stream(id);
        }
        h.engine.play_all(vec![track("a"), track("b"), track("c")], 0).await.unwrap();

        h.engine.remove_from_queue(2).await.unwrap();
        assert_eq!(h.engine.queue().await.1, 0);

        h.engine.remove_from_queue(0).await.unwrap();
        assert_eq!(h.engine.queue().await.1, 0);
        assert_eq!(h.current_id().await.as_deref(), Some("b"));
        assert_eq!(h.engine.state().await, PlaybackState::Playing);
    }

    #[tokio::test]
    async fn removing_last_current_slot_stops() {
        let h = Harness::new().await;
        h.stream("a");
        h.engine.play(track("a")).await.unwrap();

        h.engine.remove_from_queue(0).await.unwrap();

        assert_eq!(h.engine.state().await, PlaybackState::Idle);
        assert_eq!(h.engine.queue().await, (vec![], -1));
        assert!(h.engine.remove_from_queue(5).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn clear_keeps_only_the_playing_track() {
        let h = Harness::new().await;
        for id in ["a", "b"] {
            h.stream(id);
        }
        h.engine.play_all(vec![track("a"), track("b")], 1).await.unwrap();
        h.engine.enqueue(track("c")).await;

        h.engine.clear_queue().await;

        assert_eq!(h.queue_ids().await, ["b"]);
        assert_eq!(h.engine.queue().await.1, 0);
    }

    #[tokio::test]
    async fn play_next_lands_after_cursor() {
        let h = Harness::new().await;
        for id in ["a", "b"] {
            h.stream(id);
        }
        h.engine.play_all(vec![track("a"), track("b")], 0).await.unwrap();

        h.engine.play_next(track("n")).await;
        h.engine.enqueue(track("z")).await;

        assert_eq!(h.queue_ids().await, ["a", "n", "b", "z"]);
        let upcoming: Vec<String> = h.engine.upcoming().await.into_iter().map(|t| t.id).collect();
        assert_eq!(upcoming, ["n", "b", "z"]);
    }

    #[tokio::test]
    async fn play_all_liked_needs_likes() {
        let mut h = Harness::new().await;

        h.engine.play_all_liked().await.unwrap();
        assert!(drain(&mut h.events).contains(&EngineEvent::Notice("No liked songs to play".into())));

        h.stream("x");
        h.stream("y");
        h.engine.likes.toggle(&track("x")).await;
        h.engine.likes.toggle(&track("y")).await;
        h.engine.play_all_liked().await.unwrap();

        assert_eq!(h.queue_ids().await, ["y", "x"]);
        assert_eq!(h.current_id().await.as_deref(), Some("y"));
    }

    #[tokio::test]
    async fn play_from_queue_jumps() {
        let h = Harness::new().await;
        for id in ["a", "b", "c"] {
            h.stream(id);
        }
        h.engine.play_all(vec![track("a"), track("b"), track("c")], 0).await.unwrap();

        h.engine.play_from_queue(2).await.unwrap();

        assert_eq!(h.current_id().await.as_deref(), Some("c"));
        assert_eq!(h.engine.snapshot().await.cursor, 2);
    }

    #[tokio::test]
    async fn repeat_cycles_and_shuffle_toggles() {
        let h = Harness::new().await;
        assert_eq!(h.engine.cycle_repeat().await, RepeatMode::All);
        assert_eq!(h.engine.cycle_repeat().await, RepeatMode::One);
        assert_eq!(h.engine.cycle_repeat().await, RepeatMode::Off);
        assert!(h.engine.toggle_shuffle().await);
        assert!(h.engine.snapshot().await.shuffle);
    }

    #[tokio::test]
    async fn repeat_all_wraps_to_start() {
        let h = Harness::new().await;
        for id in ["a", "b"] {
            h.stream(id);
        }
        h.engine.play_all(vec![track("a"), track("b")], 1).await.unwrap();
        h.engine.set_repeat(RepeatMode::All).await;

        h.engine.next().await.unwrap();

        assert_eq!(h.current_id().await.as_deref(), Some("a"));
        assert_eq!(h.engine.snapshot().await.cursor, 0);
    }

    #[tokio::test]
    async fn like_current_needs_a_track() {
        let h = Harness::new().await;
        assert_eq!(h.engine.toggle_like_current().await, None);

        h.stream("a");
        h.engine.play(track("a")).await.unwrap();
        assert_eq!(h.engine.toggle_like_current().await, Some(true));
        assert!(h.engine.likes.is_liked("a").await);
    }
}
