//! Console rendering of engine events

use crate::events::EngineEvent;
use crate::model::PlaybackState;

use super::{AppController, format_track};

impl AppController {
    /// Line to print for an event, if it is worth showing.
    pub fn describe_event(event: &EngineEvent) -> Option<String> {
        match event {
            EngineEvent::TrackChanged(track) => Some(format!("♪ {}", format_track(track))),
            EngineEvent::StateChanged(PlaybackState::Idle) => Some("Stopped".to_string()),
            EngineEvent::StateChanged(_) | EngineEvent::QueueChanged { .. } => None,
            EngineEvent::VolumeChanged(_) | EngineEvent::EnhancementChanged => None,
            EngineEvent::SleepTimerSet { expires_at } => {
                Some(format!("Sleep timer set for {}", expires_at.with_timezone(&chrono::Local).format("%H:%M")))
            }
            EngineEvent::SleepTimerCancelled => None,
            EngineEvent::SleepTimerFired => Some("Sleep timer fired".to_string()),
            EngineEvent::Notice(message) => Some(format!("! {}", message)),
            EngineEvent::LoggedIn(user) => Some(format!("Welcome, {}", user)),
            EngineEvent::LoggedOut => Some("Logged out".to_string()),
            // The notice that accompanies it carries the message
            EngineEvent::SessionExpired => None,
            EngineEvent::LikeToggled { .. } => None,
            EngineEvent::LikesSynced(count) => Some(format!("{} liked songs synced", count)),
        }
    }
}
