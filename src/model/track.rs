//! Track descriptors and catalog records as the backend serves them

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// A playable catalog item.
///
/// Descriptors are treated as values: the queue, the liked list and the
/// recently-played list each hold their own copy.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrackDescriptor {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub artist: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub album: String,
    /// Artwork URL, empty when the catalog has none
    #[serde(default, rename = "image", deserialize_with = "null_as_empty")]
    pub artwork: String,
    /// Seconds; 0 when unknown
    #[serde(default, deserialize_with = "loose_seconds")]
    pub duration: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream_url: Option<String>,
}

impl TrackDescriptor {
    pub fn new(id: impl Into<String>, title: impl Into<String>, artist: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            artist: artist.into(),
            album: String::new(),
            artwork: String::new(),
            duration: 0,
            stream_url: None,
        }
    }

    pub fn with_duration(mut self, seconds: u32) -> Self {
        self.duration = seconds;
        self
    }

    pub fn has_known_duration(&self) -> bool {
        self.duration > 0
    }

    /// Copy of this descriptor carrying a resolved stream URL.
    pub fn resolved(&self, url: String) -> Self {
        Self {
            stream_url: Some(url),
            ..self.clone()
        }
    }
}

/// Album record with its track list
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AlbumInfo {
    pub id: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub artist: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub image: String,
    #[serde(default)]
    pub songs: Vec<TrackDescriptor>,
}

/// Artist record with top songs
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ArtistInfo {
    pub id: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub image: String,
    #[serde(default)]
    pub top_songs: Vec<TrackDescriptor>,
}

/// Row of the server-side liked list
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CloudLike {
    pub song_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub artist: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub image: String,
    #[serde(default, deserialize_with = "loose_seconds")]
    pub duration: u32,
}

impl From<&TrackDescriptor> for CloudLike {
    fn from(track: &TrackDescriptor) -> Self {
        Self {
            song_id: track.id.clone(),
            title: track.title.clone(),
            artist: track.artist.clone(),
            image: track.artwork.clone(),
            duration: track.duration,
        }
    }
}

impl From<CloudLike> for TrackDescriptor {
    fn from(like: CloudLike) -> Self {
        Self {
            id: like.song_id,
            title: like.title,
            artist: like.artist,
            album: String::new(),
            artwork: like.image,
            duration: like.duration,
            stream_url: None,
        }
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// The catalog reports durations as numbers, numeric strings or null.
fn loose_seconds<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let seconds = match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    };
    Ok(if seconds.is_finite() && seconds > 0.0 { seconds.round() as u32 } else { 0 })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_catalog_song() {
        let track: TrackDescriptor = serde_json::from_value(json!({
            "id": "x1",
            "title": "Song",
            "artist": "Someone",
            "album": null,
            "image": "https://img/1.jpg",
            "duration": "245",
            "url": "https://catalog/page",
            "explicit": false
        }))
        .unwrap();

        assert_eq!(track.id, "x1");
        assert_eq!(track.album, "");
        assert_eq!(track.artwork, "https://img/1.jpg");
        assert_eq!(track.duration, 245);
        assert_eq!(track.stream_url, None);
    }

    #[test]
    fn missing_duration_means_unknown() {
        let track: TrackDescriptor = serde_json::from_value(json!({"id": "x2", "duration": null})).unwrap();
        assert!(!track.has_known_duration());
    }

    #[test]
    fn cloud_like_maps_back_to_descriptor() {
        let track = TrackDescriptor::new("s9", "Title", "Artist").with_duration(200);
        let like = CloudLike::from(&track);
        assert_eq!(like.song_id, "s9");
        let back = TrackDescriptor::from(like);
        assert_eq!(back, track);
    }
}
