//! Error types for the playback core
//!
//! Every failure the core can report maps onto one of these variants. Only
//! `SessionExpired` tears anything down; the rest are surfaced as transient
//! notices and never stop later commands from running.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// The backend could not hand out a playable URL for the track
    #[error("Stream not available for track {track_id}")]
    StreamUnavailable { track_id: String },

    /// The refresh token was rejected; the session has been torn down
    #[error("Session expired. Please login again.")]
    SessionExpired,

    /// Backend answered with a non-2xx status
    #[error("Request to {path} failed with status {status}")]
    Http { path: String, status: u16 },

    /// The request never produced a response
    #[error("Network error: {0}")]
    Transport(String),

    /// A response body or cached entry did not have the expected shape
    #[error("Could not decode {what}: {reason}")]
    Decode { what: String, reason: String },

    /// The environment cannot host the enhancement graph or visualizer
    #[error("Audio graph unavailable: {0}")]
    AudioGraph(String),

    #[error("Invalid search query")]
    InvalidQuery,

    #[error("Audio output error: {0}")]
    Output(String),

    /// Local state could not be written
    #[error("Could not persist local state: {0}")]
    Persist(String),

    #[error("Invalid URL: {0}")]
    Url(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn decode(what: impl Into<String>, reason: impl ToString) -> Self {
        Self::Decode {
            what: what.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether the caller can carry on after reporting this error.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Error::SessionExpired)
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Transport(err.to_string())
    }
}

impl From<reqwest::header::InvalidHeaderValue> for Error {
    fn from(err: reqwest::header::InvalidHeaderValue) -> Self {
        Error::Transport(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_session_expiry_is_unrecoverable() {
        assert!(!Error::SessionExpired.is_recoverable());
        assert!(Error::StreamUnavailable { track_id: "a".into() }.is_recoverable());
        assert!(Error::Http { path: "/x/".into(), status: 500 }.is_recoverable());
    }

    #[test]
    fn stream_unavailable_names_the_track() {
        let err = Error::StreamUnavailable { track_id: "abc".into() };
        assert_eq!(err.to_string(), "Stream not available for track abc");
    }
}
