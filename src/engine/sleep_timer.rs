//! One-shot sleep timer

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::events::EngineEvent;
use crate::model::PlaybackState;

use super::PlaybackEngine;

static NEXT_TIMER: AtomicU64 = AtomicU64::new(1);

/// Pending sleep timer. Never persisted.
pub struct SleepTimer {
    pub expires_at: DateTime<Utc>,
    token: u64,
    handle: JoinHandle<()>,
}

impl SleepTimer {
    fn cancel(self) {
        self.handle.abort();
    }
}

impl PlaybackEngine {
    /// Pause playback after `minutes`. Replaces any running timer; `0`
    /// cancels.
    pub async fn set_sleep_timer(&self, minutes: u32) -> Option<DateTime<Utc>> {
        let mut s = self.state.lock().await;
        if let Some(previous) = s.sleep_timer.take() {
            previous.cancel();
        }

        if minutes == 0 {
            tracing::info!("Sleep timer cancelled");
            self.events.emit(EngineEvent::SleepTimerCancelled);
            return None;
        }

        let deadline = Instant::now() + Duration::from_secs(u64::from(minutes) * 60);
        let expires_at = Utc::now() + chrono::Duration::minutes(i64::from(minutes));
        let token = NEXT_TIMER.fetch_add(1, Ordering::Relaxed);

        let engine = self.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            engine.fire_sleep_timer(token).await;
        });

        s.sleep_timer = Some(SleepTimer {
            expires_at,
            token,
            handle,
        });
        tracing::info!(minutes, %expires_at, "Sleep timer set");
        self.events.emit(EngineEvent::SleepTimerSet { expires_at });
        Some(expires_at)
    }

    /// Time left before the timer fires
    pub async fn sleep_timer_remaining(&self) -> Option<Duration> {
        let s = self.state.lock().await;
        let timer = s.sleep_timer.as_ref()?;
        Some((timer.expires_at - Utc::now()).to_std().unwrap_or_default())
    }

    async fn fire_sleep_timer(&self, token: u64) {
        let mut s = self.state.lock().await;
        if s.sleep_timer.as_ref().map(|t| t.token) != Some(token) {
            return;
        }
        // Dropping the handle detaches; this task is the one running it.
        s.sleep_timer = None;

        match (s.playback, s.source) {
            (PlaybackState::Playing, Some(source)) => {
                self.output.pause(source);
                s.audible = false;
                self.set_playback(&mut s, PlaybackState::Paused);
            }
            (PlaybackState::Loading, _) => {
                s.generation += 1;
                self.halt(&mut s);
            }
            (state, _) => tracing::debug!(?state, "Sleep timer fired with nothing playing"),
        }
        drop(s);

        tracing::info!("Sleep timer fired");
        self.events.emit(EngineEvent::SleepTimerFired);
        self.events.notice("Sleep timer ended playback");
    }
}
