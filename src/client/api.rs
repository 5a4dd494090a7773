//! Backend API client with response caching

use std::sync::Arc;

use reqwest::Url;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;

use super::fetch::AuthenticatedFetch;
use super::transport::HttpRequest;
use crate::error::{Error, Result};
use crate::model::{AlbumInfo, ArtistInfo, CloudLike, ResourceKind, ResponseCaches, TrackDescriptor, cache_key};
use crate::{log_api_request, log_api_result};

pub const MAX_QUERY_CHARS: usize = 100;
pub const SEARCH_LIMIT: usize = 30;

#[derive(Deserialize)]
struct ResultsEnvelope {
    #[serde(default)]
    results: Vec<TrackDescriptor>,
}

#[derive(Deserialize)]
struct StreamResponse {
    #[serde(default)]
    url: Option<String>,
}

#[derive(Deserialize)]
struct LyricsResponse {
    #[serde(default)]
    lyrics: Option<String>,
}

/// Trim and cap a search query; `None` when nothing is left to search for.
pub fn validate_query(query: &str) -> Option<String> {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.chars().take(MAX_QUERY_CHARS).collect())
}

/// Music catalog API with caching
#[derive(Clone)]
pub struct MusicApi {
    fetch: AuthenticatedFetch,
    caches: Arc<ResponseCaches>,
    quality: String,
}

impl MusicApi {
    pub fn new(fetch: AuthenticatedFetch, quality: impl Into<String>) -> Self {
        Self {
            fetch,
            caches: Arc::new(ResponseCaches::new()),
            quality: quality.into(),
        }
    }

    pub fn fetch(&self) -> &AuthenticatedFetch {
        &self.fetch
    }

    pub fn caches(&self) -> &ResponseCaches {
        &self.caches
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url, what: &str) -> Result<T> {
        let path = url.path().to_string();
        let response = self.fetch.request(HttpRequest::get(url)).await?;
        if !response.is_success() {
            return Err(Error::Http {
                path,
                status: response.status,
            });
        }
        response.json(what)
    }

    pub async fn search(&self, query: &str) -> Result<Vec<TrackDescriptor>> {
        let Some(query) = validate_query(query) else {
            return Ok(Vec::new());
        };

        let key = cache_key("search", &query);
        if let Some(hit) = self.caches.get(ResourceKind::Search, &key) {
            return Ok(hit);
        }

        log_api_request!("search", query = %query);
        let mut url = self.fetch.endpoint("search/")?;
        url.query_pairs_mut()
            .append_pair("q", &query)
            .append_pair("limit", &SEARCH_LIMIT.to_string());

        let result = self.get_json::<ResultsEnvelope>(url, "search results").await;
        log_api_result!("search", result);
        let results = result?.results;
        self.caches.set(ResourceKind::Search, key, &results);
        Ok(results)
    }

    /// Resolve a playable URL for a track id. Every failure is reported as
    /// `StreamUnavailable`.
    pub async fn stream_url(&self, track_id: &str) -> Result<String> {
        let key = cache_key("stream", &format!("{}_{}", track_id, self.quality));
        if let Some(hit) = self.caches.get::<String>(ResourceKind::Streams, &key) {
            return Ok(hit);
        }

        log_api_request!("stream_url", track_id = %track_id, quality = %self.quality);
        let unavailable = || Error::StreamUnavailable {
            track_id: track_id.to_string(),
        };

        let mut url = self.fetch.resource(&["stream", track_id])?;
        url.query_pairs_mut().append_pair("quality", &self.quality);

        let result = self.get_json::<StreamResponse>(url, "stream url").await;
        log_api_result!("stream_url", result);
        let stream = match result {
            Ok(StreamResponse { url: Some(url) }) if !url.is_empty() => url,
            Ok(_) => return Err(unavailable()),
            Err(e) => {
                tracing::debug!(track_id, error = %e, "Stream resolution failed");
                return Err(unavailable());
            }
        };

        self.caches.set(ResourceKind::Streams, key, &stream);
        Ok(stream)
    }

    /// Descriptor with a stream URL, resolving one only if it has none.
    pub async fn resolve(&self, track: &TrackDescriptor) -> Result<TrackDescriptor> {
        match &track.stream_url {
            Some(url) if !url.is_empty() => Ok(track.clone()),
            _ => Ok(track.resolved(self.stream_url(&track.id).await?)),
        }
    }

    pub async fn trending(&self) -> Result<Vec<TrackDescriptor>> {
        if let Some(hit) = self.caches.get(ResourceKind::Trending, "trending") {
            return Ok(hit);
        }

        log_api_request!("trending", cache = "miss");
        let result = self
            .get_json::<ResultsEnvelope>(self.fetch.endpoint("trending/")?, "trending")
            .await;
        log_api_result!("trending", result);
        let results = result?.results;
        self.caches.set(ResourceKind::Trending, "trending", &results);
        Ok(results)
    }

    pub async fn related(&self, track_id: &str) -> Result<Vec<TrackDescriptor>> {
        let key = cache_key("related", track_id);
        if let Some(hit) = self.caches.get(ResourceKind::Search, &key) {
            return Ok(hit);
        }

        log_api_request!("related", track_id = %track_id);
        let url = self.fetch.resource(&["song", track_id, "related"])?;
        let result = self.get_json::<ResultsEnvelope>(url, "related tracks").await;
        log_api_result!("related", result);
        let results = result?.results;
        self.caches.set(ResourceKind::Search, key, &results);
        Ok(results)
    }

    pub async fn lyrics(&self, track_id: &str) -> Result<Option<String>> {
        let key = cache_key("lyrics", track_id);
        if let Some(hit) = self.caches.get::<String>(ResourceKind::Lyrics, &key) {
            return Ok(Some(hit));
        }

        log_api_request!("lyrics", track_id = %track_id);
        let url = self.fetch.resource(&["song", track_id, "lyrics"])?;
        let response = self.fetch.request(HttpRequest::get(url)).await?;
        if !response.is_success() {
            tracing::debug!(track_id, status = response.status, "No lyrics");
            return Ok(None);
        }

        let lyrics = response
            .json::<LyricsResponse>("lyrics")?
            .lyrics
            .filter(|l| !l.trim().is_empty());
        if let Some(text) = &lyrics {
            self.caches.set(ResourceKind::Lyrics, key, text);
        }
        Ok(lyrics)
    }

    pub async fn album(&self, album_id: &str) -> Result<AlbumInfo> {
        let key = cache_key("album", album_id);
        if let Some(hit) = self.caches.get(ResourceKind::AlbumInfo, &key) {
            return Ok(hit);
        }

        log_api_request!("album", album_id = %album_id);
        let url = self.fetch.resource(&["album", album_id])?;
        let result = self.get_json::<AlbumInfo>(url, "album").await;
        log_api_result!("album", result);
        let album = result?;
        self.caches.set(ResourceKind::AlbumInfo, key, &album);
        Ok(album)
    }

    pub async fn artist(&self, artist_id: &str) -> Result<ArtistInfo> {
        let key = cache_key("artist", artist_id);
        if let Some(hit) = self.caches.get(ResourceKind::ArtistInfo, &key) {
            return Ok(hit);
        }

        log_api_request!("artist", artist_id = %artist_id);
        let url = self.fetch.resource(&["artist", artist_id])?;
        let result = self.get_json::<ArtistInfo>(url, "artist").await;
        log_api_result!("artist", result);
        let artist = result?;
        self.caches.set(ResourceKind::ArtistInfo, key, &artist);
        Ok(artist)
    }

    pub async fn cloud_likes(&self) -> Result<Vec<CloudLike>> {
        log_api_request!("cloud_likes", cache = "bypass");
        let result = self
            .get_json::<Vec<CloudLike>>(self.fetch.endpoint("user/likes/")?, "liked songs")
            .await;
        log_api_result!("cloud_likes", result);
        result
    }

    pub async fn add_cloud_like(&self, track: &TrackDescriptor) -> Result<()> {
        let body = serde_json::to_value(CloudLike::from(track))?;
        let request = HttpRequest::post(self.fetch.endpoint("user/likes/")?).with_json(body);
        self.send_like_change(request, "add_cloud_like").await
    }

    pub async fn remove_cloud_like(&self, track_id: &str) -> Result<()> {
        let request =
            HttpRequest::delete(self.fetch.endpoint("user/likes/")?).with_json(json!({ "song_id": track_id }));
        self.send_like_change(request, "remove_cloud_like").await
    }

    async fn send_like_change(&self, request: HttpRequest, operation: &str) -> Result<()> {
        let path = request.url.path().to_string();
        let result = match self.fetch.request(request).await {
            Ok(response) if response.is_success() => Ok(()),
            Ok(response) => Err(Error::Http {
                path,
                status: response.status,
            }),
            Err(e) => Err(e),
        };
        log_api_result!(operation, result);
        result
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::client::session::Session;
    use crate::client::transport::Method;
    use crate::client::transport::mock::MockTransport;
    use crate::config::AuthStrategy;
    use crate::events::EventBus;
    use serde_json::json;

    pub(crate) fn api_with(transport: Arc<MockTransport>, events: EventBus) -> MusicApi {
        let session = Session::new(AuthStrategy::Cookie, events);
        let fetch = AuthenticatedFetch::new(transport, session, "http://api.test/api").unwrap();
        MusicApi::new(fetch, "320")
    }

    fn api() -> (Arc<MockTransport>, MusicApi) {
        let transport = Arc::new(MockTransport::new());
        let api = api_with(transport.clone(), EventBus::new());
        (transport, api)
    }

    fn song(id: &str) -> serde_json::Value {
        json!({"id": id, "title": id, "artist": "someone", "duration": "180"})
    }

    #[test]
    fn query_is_trimmed_and_capped() {
        assert_eq!(validate_query("   "), None);
        assert_eq!(validate_query("  lofi  ").as_deref(), Some("lofi"));
        assert_eq!(validate_query(&"x".repeat(250)).unwrap().chars().count(), MAX_QUERY_CHARS);
    }

    #[tokio::test]
    async fn search_is_served_from_cache_on_repeat() {
        let (transport, api) = api();
        transport.on(Method::Get, "/api/search/", 200, json!({"results": [song("a"), song("b")]}));

        let first = api.search(" lofi ").await.unwrap();
        let second = api.search("lofi").await.unwrap();

        assert_eq!(first.len(), 2);
        assert_eq!(first, second);
        assert_eq!(transport.count(Method::Get, "/api/search/"), 1);
        let sent = transport.last(Method::Get, "/api/search/").unwrap();
        assert_eq!(sent.url.query(), Some("q=lofi&limit=30"));
    }

    #[tokio::test]
    async fn empty_query_makes_no_request() {
        let (transport, api) = api();
        assert!(api.search("   ").await.unwrap().is_empty());
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn stream_failure_is_stream_unavailable() {
        let (transport, api) = api();
        transport.on(Method::Get, "/api/stream/x/", 404, json!({"error": "nope"}));

        let err = api.stream_url("x").await.unwrap_err();
        assert!(matches!(err, Error::StreamUnavailable { ref track_id } if track_id == "x"));
    }

    #[tokio::test]
    async fn resolve_skips_lookup_when_url_is_known() {
        let (transport, api) = api();
        let track = TrackDescriptor::new("a", "A", "B").resolved("https://cdn/a.mp3".into());

        let resolved = api.resolve(&track).await.unwrap();
        assert_eq!(resolved.stream_url.as_deref(), Some("https://cdn/a.mp3"));
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn stream_url_requests_configured_quality_and_caches() {
        let (transport, api) = api();
        transport.on(Method::Get, "/api/stream/a/", 200, json!({"url": "https://cdn/a.mp3"}));

        assert_eq!(api.stream_url("a").await.unwrap(), "https://cdn/a.mp3");
        assert_eq!(api.stream_url("a").await.unwrap(), "https://cdn/a.mp3");
        assert_eq!(transport.count(Method::Get, "/api/stream/a/"), 1);
        let sent = transport.last(Method::Get, "/api/stream/a/").unwrap();
        assert_eq!(sent.url.query(), Some("quality=320"));
    }

    #[tokio::test]
    async fn related_shares_search_cache_under_its_own_namespace() {
        let (transport, api) = api();
        transport.on(Method::Get, "/api/song/a/related/", 200, json!({"results": [song("b")]}));

        api.related("a").await.unwrap();
        assert_eq!(api.caches().len(ResourceKind::Search), 1);
        let cached: Option<Vec<TrackDescriptor>> = api.caches().get(ResourceKind::Search, "related_a");
        assert_eq!(cached.unwrap()[0].id, "b");
    }

    #[tokio::test]
    async fn trending_failure_is_surfaced() {
        let (transport, api) = api();
        transport.fail(Method::Get, "/api/trending/");
        assert!(matches!(api.trending().await, Err(Error::Transport(_))));
    }

    #[tokio::test]
    async fn only_non_empty_lyrics_are_cached() {
        let (transport, api) = api();
        transport.on(Method::Get, "/api/song/a/lyrics/", 200, json!({"lyrics": ""}));
        transport.on(Method::Get, "/api/song/b/lyrics/", 200, json!({"lyrics": "la la"}));
        transport.on(Method::Get, "/api/song/c/lyrics/", 404, json!({}));

        assert_eq!(api.lyrics("a").await.unwrap(), None);
        assert_eq!(api.lyrics("b").await.unwrap().as_deref(), Some("la la"));
        assert_eq!(api.lyrics("c").await.unwrap(), None);
        assert_eq!(api.caches().len(ResourceKind::Lyrics), 1);
    }

    #[tokio::test]
    async fn album_details_are_cached() {
        let (transport, api) = api();
        transport.on(
            Method::Get,
            "/api/album/al1/",
            200,
            json!({"id": "al1", "name": "Record", "artist": "Band", "image": null, "songs": [song("a")]}),
        );

        let album = api.album("al1").await.unwrap();
        api.album("al1").await.unwrap();
        assert_eq!(album.songs.len(), 1);
        assert_eq!(transport.count(Method::Get, "/api/album/al1/"), 1);
    }

    #[tokio::test]
    async fn ids_stay_inside_their_path_segment() {
        let (transport, api) = api();
        transport.on(Method::Get, "/api/stream/a%2Fb/", 200, json!({"url": "https://cdn/ab.mp3"}));

        assert_eq!(api.stream_url("a/b").await.unwrap(), "https://cdn/ab.mp3");
        assert!(api.artist("x?y#z").await.is_err());

        let sent = transport.requests().pop().unwrap();
        assert_eq!(sent.url.path(), "/api/artist/x%3Fy%23z/");
        assert_eq!(sent.url.query(), None);
    }
}
