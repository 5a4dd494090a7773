//! Controller - headless command front-end
//!
//! Turns typed commands into engine and API calls and renders the results
//! as text. It is a consumer of the core and holds no playback authority.
//! It is organized into submodules by responsibility:
//!
//! - `input`: command parsing
//! - `playback`: transport, queue and enhancement commands
//! - `navigation`: search, trending, lyrics, likes and account commands
//! - `player_events`: rendering engine events for the console

mod input;
mod navigation;
mod playback;
mod player_events;

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::audio::SpectrumVisualizer;
use crate::context::PlayerContext;
use crate::engine::PlaybackEngine;
use crate::error::{Error, Result};
use crate::model::TrackDescriptor;

pub use input::{Command, EqCommand, FadeCommand, HELP, VizCommand};

#[derive(Clone)]
pub struct AppController {
    pub(crate) engine: PlaybackEngine,
    pub(crate) ctx: PlayerContext,
    pub(crate) visualizer: Option<Arc<SpectrumVisualizer>>,
    /// Tracks from the last listing, addressed by number
    pub(crate) listing: Arc<Mutex<Vec<TrackDescriptor>>>,
}

impl AppController {
    pub fn new(ctx: PlayerContext, engine: PlaybackEngine) -> Self {
        let visualizer = engine
            .signal_tap()
            .map(|tap| Arc::new(SpectrumVisualizer::new(tap, ctx.config.visualizer_interval())));
        if visualizer.is_none() {
            tracing::warn!("Visualizer disabled, no audio graph");
        }

        Self {
            engine,
            ctx,
            visualizer,
            listing: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn engine(&self) -> &PlaybackEngine {
        &self.engine
    }

    /// Run one command and return what to print.
    pub async fn execute(&self, command: Command) -> Result<String> {
        tracing::debug!(?command, "Executing command");
        match command {
            Command::Search(query) => self.search(&query).await,
            Command::Trending => self.trending().await,
            Command::Lyrics => self.lyrics().await,
            Command::Like => self.like_current().await,
            Command::Likes => self.list_likes().await,
            Command::Sync => self.sync_likes().await,
            Command::Login { username, password } => self.login(&username, &password).await,
            Command::Logout => self.logout().await,
            Command::Status => Ok(self.status().await),
            Command::Help => Ok(HELP.to_string()),
            Command::Quit => Ok("Bye".to_string()),
            other => self.playback_command(other).await,
        }
    }

    pub(crate) async fn listed(&self, index: usize) -> Result<TrackDescriptor> {
        self.listing
            .lock()
            .await
            .get(index)
            .cloned()
            .ok_or(Error::InvalidQuery)
    }

    pub(crate) async fn set_listing(&self, tracks: Vec<TrackDescriptor>) -> String {
        let text = format_tracks(&tracks);
        *self.listing.lock().await = tracks;
        text
    }

    pub fn format_error(error: &Error) -> String {
        match error {
            Error::StreamUnavailable { .. } => "This track cannot be streamed right now.".to_string(),
            Error::SessionExpired => "Session expired. Please login again.".to_string(),
            Error::Http { status: 401 | 403, .. } => "Not logged in. Use 'login <user> <password>'.".to_string(),
            Error::Http { status: 429, .. } => "Rate limited. Please wait a moment.".to_string(),
            Error::Http { status, .. } if *status >= 500 => "The music service is having trouble.".to_string(),
            Error::Transport(_) => "Could not reach the music service.".to_string(),
            Error::AudioGraph(_) => "Audio enhancements are not available on this output.".to_string(),
            Error::InvalidQuery => "Nothing there. List some tracks first.".to_string(),
            other => format!("Error: {}", other),
        }
    }
}

pub(crate) fn format_duration(seconds: u64) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

pub(crate) fn format_track(track: &TrackDescriptor) -> String {
    let mut line = format!("{} - {}", track.title, track.artist);
    if track.has_known_duration() {
        line.push_str(&format!(" ({})", format_duration(u64::from(track.duration))));
    }
    line
}

pub(crate) fn format_tracks(tracks: &[TrackDescriptor]) -> String {
    if tracks.is_empty() {
        return "No tracks".to_string();
    }
    tracks
        .iter()
        .enumerate()
        .map(|(i, track)| format!("{:>3}. {}", i + 1, format_track(track)))
        .collect::<Vec<_>>()
        .join("\n")
}
