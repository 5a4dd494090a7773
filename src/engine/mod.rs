//! Playback engine - the transport state machine
//!
//! One engine owns the audio output and the queue. Its methods are split
//! across submodules by responsibility:
//!
//! - `playback`: play, pause, next/previous, seek, volume and transitions
//! - `queue`: queue edits, shuffle and repeat
//! - `enhancement`: equalizer and crossfade controls
//! - `sleep_timer`: the one-shot pause timer
//! - `listener`: reacts to end-of-track from the output

mod enhancement;
mod listener;
mod playback;
mod queue;
mod sleep_timer;

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::audio::{AudioOutput, EnhancementChain, SourceId};
use crate::client::{LikeSync, MusicApi};
use crate::context::PlayerContext;
use crate::events::{EngineEvent, EventBus};
use crate::model::{AdvanceMode, LocalStore, PlayQueue, PlaybackSnapshot, PlaybackState, TrackDescriptor};

pub use sleep_timer::SleepTimer;

/// Interleaved channels rendered by the enhancement chain
pub const OUTPUT_CHANNELS: usize = 2;

/// Outgoing source waiting to be released after a crossfade
pub(crate) struct FadeCleanup {
    pub outgoing: SourceId,
    pub handle: JoinHandle<()>,
}

pub(crate) struct EngineState {
    pub playback: PlaybackState,
    pub queue: PlayQueue,
    /// Descriptor being played; meaningful only while not Idle
    pub current: Option<TrackDescriptor>,
    pub source: Option<SourceId>,
    /// Whether `source` is currently producing sound
    pub audible: bool,
    pub mode: AdvanceMode,
    pub volume: f32,
    /// Bumped on every load so a superseded load can tell it lost
    pub generation: u64,
    pub sleep_timer: Option<SleepTimer>,
    pub fade_cleanup: Option<FadeCleanup>,
    pub fade_watch: Option<JoinHandle<()>>,
}

#[derive(Clone)]
pub struct PlaybackEngine {
    pub(crate) state: Arc<Mutex<EngineState>>,
    pub(crate) api: MusicApi,
    pub(crate) store: LocalStore,
    pub(crate) likes: LikeSync,
    pub(crate) events: EventBus,
    pub(crate) output: Arc<dyn AudioOutput>,
    pub(crate) chain: Option<Arc<parking_lot::Mutex<EnhancementChain>>>,
}

impl PlaybackEngine {
    pub async fn new(ctx: &PlayerContext, output: Arc<dyn AudioOutput>) -> Self {
        let saved = ctx.store.snapshot().await;

        let chain = match EnhancementChain::new(
            output.sample_rate(),
            OUTPUT_CHANNELS,
            saved.equalizer.clone(),
            saved.crossfade.clone(),
        ) {
            Ok(chain) => Some(Arc::new(parking_lot::Mutex::new(chain))),
            Err(e) => {
                tracing::warn!(error = %e, "Audio enhancements disabled");
                None
            }
        };

        if let Some(chain) = &chain {
            output.attach(chain.clone());
        }
        output.set_volume(saved.volume);

        Self {
            state: Arc::new(Mutex::new(EngineState {
                playback: PlaybackState::Idle,
                queue: PlayQueue::new(),
                current: None,
                source: None,
                audible: false,
                mode: AdvanceMode::default(),
                volume: saved.volume,
                generation: 0,
                sleep_timer: None,
                fade_cleanup: None,
                fade_watch: None,
            })),
            api: ctx.api.clone(),
            store: ctx.store.clone(),
            likes: ctx.likes.clone(),
            events: ctx.events.clone(),
            output,
            chain,
        }
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn enhancements_available(&self) -> bool {
        self.chain.is_some()
    }

    pub async fn state(&self) -> PlaybackState {
        self.state.lock().await.playback
    }

    pub async fn current_track(&self) -> Option<TrackDescriptor> {
        let s = self.state.lock().await;
        if s.playback.is_active() { s.current.clone() } else { None }
    }

    pub async fn snapshot(&self) -> PlaybackSnapshot {
        let s = self.state.lock().await;
        let (position, duration) = match s.source {
            Some(source) if s.playback.is_active() => (
                self.output.position(source),
                self.output
                    .duration(source)
                    .or_else(|| s.current.as_ref().and_then(track_duration))
                    .unwrap_or_default(),
            ),
            _ => Default::default(),
        };

        PlaybackSnapshot {
            state: s.playback,
            track: if s.playback.is_active() { s.current.clone() } else { None },
            position,
            duration,
            volume: s.volume,
            shuffle: s.mode.shuffle,
            repeat: s.mode.repeat,
            queue_len: s.queue.len(),
            cursor: s.queue.cursor(),
            sleep_timer_expires: s.sleep_timer.as_ref().map(|t| t.expires_at),
        }
    }

    pub(crate) fn set_playback(&self, s: &mut EngineState, next: PlaybackState) {
        if s.playback != next {
            tracing::debug!(from = ?s.playback, to = ?next, "Playback state changed");
            s.playback = next;
            self.events.emit(EngineEvent::StateChanged(next));
        }
    }

    pub(crate) fn emit_queue(&self, s: &EngineState) {
        self.events.emit(EngineEvent::QueueChanged {
            len: s.queue.len(),
            cursor: s.queue.cursor(),
        });
    }
}

pub(crate) fn track_duration(track: &TrackDescriptor) -> Option<std::time::Duration> {
    track
        .has_known_duration()
        .then(|| std::time::Duration::from_secs(u64::from(track.duration)))
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use crate::audio::HeadlessOutput;
    use crate::error::Error;

    #[tokio::test]
    async fn starts_idle_with_saved_volume() {
        let h = Harness::new().await;
        let snapshot = h.engine.snapshot().await;
        assert_eq!(snapshot.state, PlaybackState::Idle);
        assert_eq!(snapshot.volume, crate::model::store::DEFAULT_VOLUME);
        assert_eq!(snapshot.cursor, -1);
        assert!(h.engine.enhancements_available());
    }

    #[tokio::test]
    async fn playback_works_without_an_audio_graph() {
        let h = Harness::with_output(HeadlessOutput::new(None)).await;
        h.stream("a");

        assert!(!h.engine.enhancements_available());
        h.engine.play(track("a")).await.unwrap();
        assert_eq!(h.engine.state().await, PlaybackState::Playing);

        let err = h.engine.apply_eq_preset("rock").await.unwrap_err();
        assert!(matches!(err, Error::AudioGraph(_)));
        assert!(h.engine.signal_tap().is_none());
    }
}
