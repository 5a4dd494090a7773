//! Transport control: loading, transitions, pause/resume, seek and volume

use std::time::Duration;

use crate::audio::SourceId;
use crate::error::Result;
use crate::events::EngineEvent;
use crate::model::{Advance, PlaybackState, TrackDescriptor};

use super::{EngineState, FadeCleanup, PlaybackEngine, track_duration};

/// Going back within this much of the start skips to the previous track
pub const RESTART_THRESHOLD: Duration = Duration::from_secs(3);

const FADE_WATCH_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Placement {
    /// Picked from outside the queue: becomes the new listening context
    NewContext,
    /// Already under the queue cursor
    Queued,
}

impl PlaybackEngine {
    /// Play a track picked from search, trending, liked, etc.
    ///
    /// The queue is cut after the cursor and the track appended. Related
    /// tracks are appended in the background once playback has started.
    pub async fn play(&self, track: TrackDescriptor) -> Result<()> {
        if let Some(started) = self.start_track(track, Placement::NewContext).await? {
            self.spawn_auto_extend(started.id);
        }
        Ok(())
    }

    /// Resolve, load and start a track. Returns `None` when a newer load
    /// superseded this one while it was resolving.
    pub(crate) async fn start_track(
        &self,
        track: TrackDescriptor,
        placement: Placement,
    ) -> Result<Option<TrackDescriptor>> {
        let generation = {
            let mut s = self.state.lock().await;
            if placement == Placement::NewContext {
                s.queue.start_context(track.clone());
                self.emit_queue(&s);
            }
            s.generation += 1;
            self.set_playback(&mut s, PlaybackState::Loading);
            s.generation
        };
        tracing::debug!(track_id = %track.id, generation, ?placement, "Loading track");

        let loaded = match self.api.resolve(&track).await {
            Ok(resolved) => {
                let url = resolved.stream_url.clone().unwrap_or_default();
                self.output
                    .load(&url, track_duration(&resolved))
                    .await
                    .map(|source| (resolved, source))
            }
            Err(e) => Err(e),
        };

        let mut s = self.state.lock().await;
        if s.generation != generation {
            if let Ok((_, source)) = &loaded {
                self.output.stop(*source);
            }
            tracing::debug!(track_id = %track.id, generation, "Discarding superseded load");
            return Ok(None);
        }

        let (resolved, source) = match loaded {
            Ok(loaded) => loaded,
            Err(e) => {
                self.halt(&mut s);
                drop(s);
                tracing::warn!(track_id = %track.id, error = %e, "Could not start track");
                self.events.notice(format!("Unable to play \"{}\"", track.title));
                return Err(e);
            }
        };

        self.switch_source(&mut s, source);
        self.output.play(source);
        s.audible = true;
        s.current = Some(resolved.clone());
        self.set_playback(&mut s, PlaybackState::Playing);
        self.events.emit(EngineEvent::TrackChanged(resolved.clone()));
        self.arm_fade_watch(&mut s, source, &resolved);
        drop(s);

        tracing::info!(track_id = %resolved.id, title = %resolved.title, "Now playing");
        self.store
            .update(|state| state.recently_played.record(&resolved))
            .await;
        Ok(Some(resolved))
    }

    /// Make `incoming` the current source, fading the previous one out if
    /// crossfade is on and it is still audible.
    fn switch_source(&self, s: &mut EngineState, incoming: SourceId) {
        self.cancel_pending_fade(s);

        let outgoing = s.source.replace(incoming);
        let fade = if s.audible { self.crossfade_duration() } else { None };

        match (outgoing, fade, &self.chain) {
            (Some(outgoing), Some(duration), Some(chain)) => {
                let fade = chain.lock().begin_crossfade(outgoing, incoming, duration);
                tracing::debug!(?outgoing, ?incoming, ?duration, "Crossfading");

                // Released on the ramp's own clock
                let done_at = fade.started + fade.duration;
                let chain = chain.clone();
                let output = self.output.clone();
                let handle = tokio::spawn(async move {
                    tokio::time::sleep_until(done_at).await;
                    let mut chain = chain.lock();
                    chain.finish_crossfade(outgoing);
                    chain.disconnect(outgoing);
                    output.stop(outgoing);
                });
                s.fade_cleanup = Some(FadeCleanup { outgoing, handle });
            }
            (outgoing, _, chain) => {
                if let Some(chain) = chain {
                    let mut chain = chain.lock();
                    chain.cancel_crossfade();
                    chain.connect(incoming);
                }
                if let Some(outgoing) = outgoing {
                    self.release_source(outgoing);
                }
            }
        }
    }

    /// Abort a running fade-out and release its source immediately.
    fn cancel_pending_fade(&self, s: &mut EngineState) {
        if let Some(cleanup) = s.fade_cleanup.take() {
            cleanup.handle.abort();
            self.release_source(cleanup.outgoing);
        }
    }

    fn release_source(&self, source: SourceId) {
        self.output.stop(source);
        if let Some(chain) = &self.chain {
            chain.lock().disconnect(source);
        }
    }

    pub(crate) fn crossfade_duration(&self) -> Option<Duration> {
        self.chain
            .as_ref()
            .and_then(|chain| chain.lock().crossfade().active_duration())
    }

    /// Stop everything and go Idle.
    pub(crate) fn halt(&self, s: &mut EngineState) {
        self.cancel_pending_fade(s);
        if let Some(handle) = s.fade_watch.take() {
            handle.abort();
        }
        if let Some(source) = s.source.take() {
            self.release_source(source);
        }
        s.audible = false;
        s.current = None;
        self.set_playback(s, PlaybackState::Idle);
    }

    /// Poll the current source and start the next transition early enough
    /// for the crossfade to finish as the track ends. With nothing to fade
    /// into, the track plays out and end-of-track does the advancing.
    fn arm_fade_watch(&self, s: &mut EngineState, source: SourceId, track: &TrackDescriptor) {
        if let Some(handle) = s.fade_watch.take() {
            handle.abort();
        }
        if self.chain.is_none() {
            return;
        }
        let Some(length) = self.output.duration(source).or_else(|| track_duration(track)) else {
            return;
        };

        let engine = self.clone();
        s.fade_watch = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(FADE_WATCH_INTERVAL);
            loop {
                ticker.tick().await;
                let Some(fade) = engine.crossfade_duration() else {
                    continue;
                };
                let remaining = length.saturating_sub(engine.output.position(source));
                if remaining > fade {
                    continue;
                }
                match engine.advance_from(source).await {
                    Ok(false) => continue,
                    Ok(true) => break,
                    Err(e) => {
                        tracing::warn!(error = %e, "Crossfade transition failed");
                        break;
                    }
                }
            }
        }));
    }

    /// Start the early transition out of `source`. Returns `false` while
    /// the watch should keep polling: paused, or no track to fade into.
    /// The watch is detached here so the transition cannot abort itself.
    pub(crate) async fn advance_from(&self, source: SourceId) -> Result<bool> {
        {
            let mut s = self.state.lock().await;
            if s.source != Some(source) {
                return Ok(true);
            }
            if s.playback != PlaybackState::Playing || !s.queue.has_following(s.mode) {
                return Ok(false);
            }
            s.fade_watch.take();
        }
        tracing::debug!(?source, "Starting crossfade into next track");
        self.next().await.map(|_| true)
    }

    /// Natural end of the current source: no fade from a silent source.
    pub(crate) async fn on_end_of_track(&self, source: SourceId) -> Result<()> {
        {
            let mut s = self.state.lock().await;
            if s.source != Some(source) {
                tracing::trace!(?source, "End of a source that is no longer current");
                return Ok(());
            }
            s.audible = false;
            if let Some(handle) = s.fade_watch.take() {
                handle.abort();
            }
        }
        tracing::debug!(?source, "Track finished");
        self.next().await
    }

    pub async fn next(&self) -> Result<()> {
        let step = {
            let mut s = self.state.lock().await;
            let mode = s.mode;
            s.queue.advance(mode, &mut rand::thread_rng())
        };

        match step {
            Advance::Restart(track) => self.restart(track).await,
            Advance::Track(track) => self.start_track(track, Placement::Queued).await.map(|_| ()),
            Advance::Exhausted => {
                let mut s = self.state.lock().await;
                tracing::info!("Queue finished");
                self.halt(&mut s);
                Ok(())
            }
        }
    }

    /// Replay the current track from the start.
    async fn restart(&self, track: TrackDescriptor) -> Result<()> {
        {
            let mut s = self.state.lock().await;
            if let Some(source) = s.source.filter(|_| s.playback != PlaybackState::Loading) {
                self.output.seek(source, Duration::ZERO);
                self.output.play(source);
                s.audible = true;
                self.set_playback(&mut s, PlaybackState::Playing);
                if let Some(current) = s.current.clone() {
                    self.arm_fade_watch(&mut s, source, &current);
                }
                tracing::debug!(track_id = %track.id, "Restarting track");
                return Ok(());
            }
        }
        self.start_track(track, Placement::Queued).await.map(|_| ())
    }

    /// Restart the current track if it has played for more than three
    /// seconds, otherwise step back one slot.
    pub async fn previous(&self) -> Result<()> {
        let track = {
            let mut s = self.state.lock().await;
            if let Some(source) = s.source.filter(|_| s.playback.is_active()) {
                if self.output.position(source) > RESTART_THRESHOLD {
                    self.output.seek(source, Duration::ZERO);
                    tracing::debug!("Restarted current track");
                    return Ok(());
                }
            }
            s.queue.step_back()
        };

        match track {
            Some(track) => self.start_track(track, Placement::Queued).await.map(|_| ()),
            None => Ok(()),
        }
    }

    /// Flip Playing and Paused. Idle and Loading are left alone.
    pub async fn toggle_play_pause(&self) -> PlaybackState {
        let mut s = self.state.lock().await;
        match (s.playback, s.source) {
            (PlaybackState::Playing, Some(source)) => {
                self.output.pause(source);
                s.audible = false;
                self.set_playback(&mut s, PlaybackState::Paused);
            }
            (PlaybackState::Paused, Some(source)) => {
                self.output.play(source);
                s.audible = true;
                self.set_playback(&mut s, PlaybackState::Playing);
            }
            (state, _) => tracing::debug!(?state, "Nothing to toggle"),
        }
        s.playback
    }

    /// Jump to a percentage of the track. No-op when the length is unknown.
    pub async fn seek(&self, percent: f32) {
        let s = self.state.lock().await;
        let Some(source) = s.source.filter(|_| s.playback.is_active()) else {
            return;
        };
        let length = self
            .output
            .duration(source)
            .or_else(|| s.current.as_ref().and_then(track_duration));
        let Some(length) = length.filter(|d| !d.is_zero()) else {
            tracing::debug!("Seek ignored, track length unknown");
            return;
        };

        let fraction = if percent.is_finite() { percent.clamp(0.0, 100.0) / 100.0 } else { 0.0 };
        let target = length.mul_f32(fraction);
        tracing::debug!(?target, "Seeking");
        self.output.seek(source, target);
    }

    pub async fn set_volume(&self, volume: f32) -> f32 {
        let volume = if volume.is_finite() { volume.clamp(0.0, 1.0) } else { 0.0 };
        {
            let mut s = self.state.lock().await;
            s.volume = volume;
        }
        self.output.set_volume(volume);
        self.events.emit(EngineEvent::VolumeChanged(volume));
        self.store.update(|state| state.volume = volume).await;
        volume
    }

    fn spawn_auto_extend(&self, track_id: String) {
        let engine = self.clone();
        tokio::spawn(async move {
            match engine.api.related(&track_id).await {
                Ok(related) => {
                    let mut s = engine.state.lock().await;
                    let added = s.queue.auto_extend(related);
                    if added > 0 {
                        tracing::debug!(track_id = %track_id, added, "Queue extended with related tracks");
                        engine.emit_queue(&s);
                    }
                }
                Err(e) => tracing::warn!(track_id = %track_id, error = %e, "Could not fetch related tracks"),
            }
        });
    }
}
