//! Expiring response caches for catalog lookups
//!
//! Every network-backed lookup goes through a [`TtlCache`]. Expiry is lazy:
//! nothing sweeps in the background, a stale entry is dropped the moment it
//! is read.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use parking_lot::Mutex;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tokio::time::Instant;

pub const CACHE_TTL: Duration = Duration::from_secs(5 * 60);
pub const CACHE_CAPACITY: usize = 100;

#[derive(Clone, Debug)]
pub struct CacheEntry<T> {
    pub value: T,
    pub inserted_at: Instant,
}

impl<T> CacheEntry<T> {
    pub fn is_valid(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.inserted_at) < ttl
    }
}

/// Bounded key/value store with time-based expiry.
///
/// Capacity eviction drops the oldest *inserted* key, regardless of how
/// recently it was read or whether it is still valid. Overwriting a key
/// refreshes its timestamp but keeps its place in the insertion order.
#[derive(Debug)]
pub struct TtlCache<T> {
    entries: HashMap<String, CacheEntry<T>>,
    order: VecDeque<String>,
    ttl: Duration,
    capacity: usize,
}

impl<T: Clone> TtlCache<T> {
    pub fn new() -> Self {
        Self::with_limits(CACHE_TTL, CACHE_CAPACITY)
    }

    pub fn with_limits(ttl: Duration, capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
            ttl,
            capacity: capacity.max(1),
        }
    }

    pub fn get(&mut self, key: &str) -> Option<T> {
        let now = Instant::now();
        match self.entries.get(key) {
            Some(entry) if entry.is_valid(now, self.ttl) => Some(entry.value.clone()),
            Some(_) => {
                tracing::trace!(key, "Cache entry expired");
                self.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn set(&mut self, key: impl Into<String>, value: T) {
        let key = key.into();
        let entry = CacheEntry {
            value,
            inserted_at: Instant::now(),
        };
        if self.entries.insert(key.clone(), entry).is_none() {
            self.order.push_back(key);
        }

        if self.entries.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                tracing::trace!(key = %oldest, "Cache over capacity, evicting oldest entry");
                self.entries.remove(&oldest);
            }
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<T> {
        let removed = self.entries.remove(key)?;
        self.order.retain(|k| k != key);
        Some(removed.value)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T: Clone> Default for TtlCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Logical resource classes, one cache instance each
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResourceKind {
    /// Search results and related-track lists share this instance
    Search,
    Trending,
    Lyrics,
    Streams,
    ArtistInfo,
    AlbumInfo,
}

/// Namespaced key so one instance can serve several lookup types.
pub fn cache_key(namespace: &str, id: &str) -> String {
    format!("{}_{}", namespace, id)
}

/// The set of JSON response caches used by the API client.
///
/// Values are kept as raw JSON and decoded on read; an entry that no longer
/// decodes is discarded and reported as a miss.
#[derive(Default)]
pub struct ResponseCaches {
    search: Mutex<TtlCache<Value>>,
    trending: Mutex<TtlCache<Value>>,
    lyrics: Mutex<TtlCache<Value>>,
    streams: Mutex<TtlCache<Value>>,
    artist_info: Mutex<TtlCache<Value>>,
    album_info: Mutex<TtlCache<Value>>,
}

impl ResponseCaches {
    pub fn new() -> Self {
        Self::default()
    }

    fn instance(&self, kind: ResourceKind) -> &Mutex<TtlCache<Value>> {
        match kind {
            ResourceKind::Search => &self.search,
            ResourceKind::Trending => &self.trending,
            ResourceKind::Lyrics => &self.lyrics,
            ResourceKind::Streams => &self.streams,
            ResourceKind::ArtistInfo => &self.artist_info,
            ResourceKind::AlbumInfo => &self.album_info,
        }
    }

    pub fn get<T: DeserializeOwned>(&self, kind: ResourceKind, key: &str) -> Option<T> {
        let mut cache = self.instance(kind).lock();
        let raw = cache.get(key)?;
        match serde_json::from_value(raw) {
            Ok(value) => {
                tracing::trace!(?kind, key, "Cache hit");
                Some(value)
            }
            Err(e) => {
                tracing::warn!(?kind, key, error = %e, "Discarding undecodable cache entry");
                cache.remove(key);
                None
            }
        }
    }

    pub fn set<T: Serialize>(&self, kind: ResourceKind, key: impl Into<String>, value: &T) {
        let key = key.into();
        match serde_json::to_value(value) {
            Ok(raw) => self.instance(kind).lock().set(key, raw),
            Err(e) => tracing::warn!(?kind, key = %key, error = %e, "Value not cacheable"),
        }
    }

    pub fn set_raw(&self, kind: ResourceKind, key: impl Into<String>, value: Value) {
        self.instance(kind).lock().set(key, value);
    }

    pub fn invalidate(&self, kind: ResourceKind, key: &str) {
        self.instance(kind).lock().remove(key);
    }

    pub fn len(&self, kind: ResourceKind) -> usize {
        self.instance(kind).lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test(start_paused = true)]
    async fn value_is_returned_until_ttl_elapses() {
        let mut cache = TtlCache::new();
        cache.set("search_lofi", 42u32);
        assert_eq!(cache.get("search_lofi"), Some(42));

        tokio::time::advance(CACHE_TTL - Duration::from_millis(1)).await;
        assert_eq!(cache.get("search_lofi"), Some(42));

        tokio::time::advance(Duration::from_millis(1)).await;
        assert_eq!(cache.get("search_lofi"), None);
        assert!(cache.is_empty(), "stale entry is deleted on read");
    }

    #[test]
    fn over_capacity_drops_first_inserted_key() {
        let mut cache = TtlCache::new();
        for i in 0..=CACHE_CAPACITY {
            cache.set(format!("k{}", i), i);
        }

        assert_eq!(cache.len(), CACHE_CAPACITY);
        assert_eq!(cache.get("k0"), None);
        for i in 1..=CACHE_CAPACITY {
            assert_eq!(cache.get(&format!("k{}", i)), Some(i));
        }
    }

    #[test]
    fn eviction_ignores_read_recency() {
        let mut cache = TtlCache::with_limits(CACHE_TTL, 2);
        cache.set("a", 1);
        cache.set("b", 2);
        assert_eq!(cache.get("a"), Some(1));
        cache.set("c", 3);

        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.get("b"), Some(2));
        assert_eq!(cache.get("c"), Some(3));
    }

    #[tokio::test(start_paused = true)]
    async fn overwrite_refreshes_timestamp() {
        let mut cache = TtlCache::new();
        cache.set("k", 1);
        tokio::time::advance(Duration::from_secs(200)).await;
        cache.set("k", 2);
        tokio::time::advance(Duration::from_secs(200)).await;
        assert_eq!(cache.get("k"), Some(2));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn namespaced_keys_do_not_collide() {
        let caches = ResponseCaches::new();
        caches.set(ResourceKind::Search, cache_key("search", "abc"), &vec!["s".to_string()]);
        caches.set(ResourceKind::Search, cache_key("related", "abc"), &vec!["r".to_string()]);

        let search: Vec<String> = caches.get(ResourceKind::Search, "search_abc").unwrap();
        let related: Vec<String> = caches.get(ResourceKind::Search, "related_abc").unwrap();
        assert_eq!(search, vec!["s"]);
        assert_eq!(related, vec!["r"]);
    }

    #[test]
    fn undecodable_entry_is_a_miss_and_is_discarded() {
        let caches = ResponseCaches::new();
        caches.set_raw(ResourceKind::Lyrics, "lyrics_1", json!({"unexpected": true}));

        let lyrics: Option<String> = caches.get(ResourceKind::Lyrics, "lyrics_1");
        assert_eq!(lyrics, None);
        assert_eq!(caches.len(ResourceKind::Lyrics), 0);
    }
}
