//! Model module - player state and data types
//!
//! - `types`: core enums (transport state, repeat mode)
//! - `track`: catalog records as the backend serves them
//! - `cache`: expiring response caches
//! - `queue`: the play queue and its advance policy
//! - `library`: liked tracks and play history
//! - `playback`: position timing and render snapshots
//! - `store`: persisted local state

pub mod cache;
pub mod library;
pub mod playback;
pub mod queue;
pub mod store;
pub mod track;
pub mod types;

pub use cache::{ResourceKind, ResponseCaches, TtlCache, cache_key};
pub use library::{LikedTracks, RecentlyPlayed};
pub use playback::{PlaybackSnapshot, PlaybackTiming};
pub use queue::{Advance, PlayQueue, Removal};
pub use store::{LocalStore, PersistedState};
pub use track::{AlbumInfo, ArtistInfo, CloudLike, TrackDescriptor};
pub use types::{AdvanceMode, PlaybackState, RepeatMode};
