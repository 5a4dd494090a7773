//! Local persisted player state
//!
//! One JSON document under the data directory. A missing or unreadable file
//! starts the player with defaults; the sleep timer is never written here.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};

use super::library::{LikedTracks, RecentlyPlayed};
use crate::audio::{CrossfadeSettings, EqualizerSettings};
use crate::error::{Error, Result};

pub const DEFAULT_VOLUME: f32 = 0.7;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistedState {
    pub volume: f32,
    pub liked: LikedTracks,
    pub recently_played: RecentlyPlayed,
    pub equalizer: EqualizerSettings,
    pub crossfade: CrossfadeSettings,
}

impl Default for PersistedState {
    fn default() -> Self {
        Self {
            volume: DEFAULT_VOLUME,
            liked: LikedTracks::default(),
            recently_played: RecentlyPlayed::default(),
            equalizer: EqualizerSettings::default(),
            crossfade: CrossfadeSettings::default(),
        }
    }
}

#[derive(Clone)]
pub struct LocalStore {
    path: Option<PathBuf>,
    state: Arc<RwLock<PersistedState>>,
    /// Serializes writers so the file always ends on the newest state
    save_lock: Arc<Mutex<()>>,
}

impl LocalStore {
    /// Store that never touches the disk
    pub fn in_memory() -> Self {
        Self {
            path: None,
            state: Arc::new(RwLock::new(PersistedState::default())),
            save_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn load_from_disk(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let state = match read_state(&path) {
            Ok(Some(state)) => {
                tracing::info!(path = %path.display(), liked = state.liked.len(), "Loaded player state");
                state
            }
            Ok(None) => {
                tracing::debug!(path = %path.display(), "No saved player state, using defaults");
                PersistedState::default()
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Saved player state unreadable, using defaults");
                PersistedState::default()
            }
        };

        Self {
            path: Some(path),
            state: Arc::new(RwLock::new(state)),
            save_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Write the current state to a sibling temp file on the blocking pool
    /// and rename it over the document.
    pub async fn save_to_disk(&self) -> Result<()> {
        let Some(path) = self.path.clone() else {
            return Ok(());
        };

        let _writer = self.save_lock.lock().await;
        let content = {
            let state = self.state.read().await;
            serde_json::to_string_pretty(&*state)?
        };
        tokio::task::spawn_blocking(move || write_atomically(&path, &content))
            .await
            .map_err(|e| Error::Persist(e.to_string()))??;
        Ok(())
    }

    pub async fn read<R>(&self, f: impl FnOnce(&PersistedState) -> R) -> R {
        let state = self.state.read().await;
        f(&state)
    }

    /// Mutate the state and write it through. A failed write is logged; the
    /// in-memory change stands.
    pub async fn update<R>(&self, f: impl FnOnce(&mut PersistedState) -> R) -> R {
        let result = {
            let mut state = self.state.write().await;
            f(&mut state)
        };
        if let Err(e) = self.save_to_disk().await {
            tracing::warn!(error = %e, "Failed to persist player state");
        }
        result
    }

    pub async fn snapshot(&self) -> PersistedState {
        self.state.read().await.clone()
    }
}

fn write_atomically(path: &Path, content: &str) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(|e| Error::Persist(e.to_string()))?;
    }
    let staging = temp_path(path);
    std::fs::write(&staging, content).map_err(|e| Error::Persist(e.to_string()))?;
    std::fs::rename(&staging, path).map_err(|e| Error::Persist(e.to_string()))?;
    tracing::trace!(path = %path.display(), "Player state saved");
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

fn read_state(path: &Path) -> Result<Option<PersistedState>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path)?;
    Ok(Some(serde_json::from_str(&content)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TrackDescriptor;

    #[tokio::test]
    async fn state_survives_a_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.json");

        let store = LocalStore::load_from_disk(&path);
        store
            .update(|state| {
                state.volume = 0.4;
                state.liked.toggle(&TrackDescriptor::new("a", "A", "Artist"));
                state.equalizer.gains[0] = 6.0;
            })
            .await;

        let reloaded = LocalStore::load_from_disk(&path).snapshot().await;
        assert_eq!(reloaded.volume, 0.4);
        assert!(reloaded.liked.is_liked("a"));
        assert_eq!(reloaded.equalizer.gains[0], 6.0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn concurrent_updates_leave_the_newest_state_and_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        let store = LocalStore::load_from_disk(&path);

        let writers: Vec<_> = (1..=8)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move { store.update(|state| state.volume = i as f32 / 10.0).await })
            })
            .collect();
        for writer in writers {
            writer.await.unwrap();
        }

        let in_memory = store.snapshot().await;
        let on_disk = LocalStore::load_from_disk(&path).snapshot().await;
        assert_eq!(on_disk, in_memory);
        assert!(!temp_path(&path).exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn corrupt_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "{ not json").unwrap();

        let state = LocalStore::load_from_disk(&path).snapshot().await;
        assert_eq!(state, PersistedState::default());
    }

    #[tokio::test]
    async fn partial_document_fills_missing_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, r#"{"volume": 0.2}"#).unwrap();

        let state = LocalStore::load_from_disk(&path).snapshot().await;
        assert_eq!(state.volume, 0.2);
        assert!(state.liked.is_empty());
        assert_eq!(state.crossfade, CrossfadeSettings::default());
    }
}
