//! Liked tracks and their mirror on the backend
//!
//! Toggling a like only touches local state and publishes `LikeToggled`.
//! [`LikeSync::spawn`] runs the layer that mirrors those events to the
//! backend while a session is active.

use std::collections::HashSet;

use futures::future::join_all;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use super::api::MusicApi;
use super::session::Session;
use crate::error::Result;
use crate::events::{EngineEvent, EventBus};
use crate::model::{LocalStore, TrackDescriptor};

#[derive(Clone)]
pub struct LikeSync {
    api: MusicApi,
    session: Session,
    store: LocalStore,
    events: EventBus,
}

impl LikeSync {
    pub fn new(api: MusicApi, session: Session, store: LocalStore, events: EventBus) -> Self {
        Self {
            api,
            session,
            store,
            events,
        }
    }

    pub async fn is_liked(&self, track_id: &str) -> bool {
        self.store.read(|state| state.liked.is_liked(track_id)).await
    }

    pub async fn liked(&self) -> Vec<TrackDescriptor> {
        self.store.read(|state| state.liked.tracks().to_vec()).await
    }

    /// Flip a track's liked state; returns whether it is liked afterwards.
    pub async fn toggle(&self, track: &TrackDescriptor) -> bool {
        let liked = self.store.update(|state| state.liked.toggle(track)).await;
        tracing::info!(track_id = %track.id, liked, "Like toggled");
        self.events.emit(EngineEvent::LikeToggled {
            track: track.clone(),
            liked,
        });
        liked
    }

    /// Mirror like toggles to the backend until the bus closes.
    pub fn spawn(&self) -> JoinHandle<()> {
        let sync = self.clone();
        let mut rx = self.events.subscribe();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(EngineEvent::LikeToggled { track, liked }) => sync.mirror(&track, liked).await,
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Like sync fell behind the event bus");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            tracing::debug!("Like sync layer stopped");
        })
    }

    async fn mirror(&self, track: &TrackDescriptor, liked: bool) {
        if !self.session.is_active().await {
            return;
        }
        let result = if liked {
            self.api.add_cloud_like(track).await
        } else {
            self.api.remove_cloud_like(&track.id).await
        };
        if let Err(e) = result {
            tracing::warn!(track_id = %track.id, liked, error = %e, "Could not mirror like to server");
        }
    }

    /// Two-way merge with the server's liked list.
    ///
    /// Local-only likes are uploaded, then the local list becomes the
    /// server's entries followed by the local-only ones, without duplicates.
    /// Returns the merged size, or 0 without a session.
    pub async fn sync(&self) -> Result<usize> {
        if !self.session.is_active().await {
            return Ok(0);
        }

        let cloud = self.api.cloud_likes().await?;
        let cloud_ids: HashSet<String> = cloud.iter().map(|l| l.song_id.clone()).collect();
        let local_only: Vec<TrackDescriptor> = self
            .liked()
            .await
            .into_iter()
            .filter(|t| !cloud_ids.contains(&t.id))
            .collect();

        let uploads = join_all(local_only.iter().map(|track| self.api.add_cloud_like(track))).await;
        for (track, result) in local_only.iter().zip(uploads) {
            if let Err(e) = result {
                tracing::warn!(track_id = %track.id, error = %e, "Could not upload local like");
            }
        }

        let mut seen = HashSet::new();
        let merged: Vec<TrackDescriptor> = cloud
            .into_iter()
            .map(TrackDescriptor::from)
            .chain(local_only)
            .filter(|t| seen.insert(t.id.clone()))
            .collect();

        let count = merged.len();
        self.store.update(|state| state.liked.replace(merged)).await;
        tracing::info!(count, "Liked songs synced");
        self.events.emit(EngineEvent::LikesSynced(count));
        Ok(count)
    }
}
