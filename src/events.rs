//! Player-wide event bus
//!
//! The engine, session and library publish here; the front-end and the
//! like-sync layer subscribe. Sends never fail the publisher: with no
//! subscribers the event is dropped.

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;

use crate::model::{PlaybackState, TrackDescriptor};

const EVENT_CAPACITY: usize = 256;

#[derive(Clone, Debug, PartialEq)]
pub enum EngineEvent {
    StateChanged(PlaybackState),
    TrackChanged(TrackDescriptor),
    QueueChanged { len: usize, cursor: isize },
    VolumeChanged(f32),
    SleepTimerSet { expires_at: DateTime<Utc> },
    SleepTimerCancelled,
    SleepTimerFired,
    /// Transient user-visible message
    Notice(String),
    LoggedIn(String),
    LoggedOut,
    SessionExpired,
    LikeToggled { track: TrackDescriptor, liked: bool },
    LikesSynced(usize),
    EnhancementChanged,
}

#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<EngineEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CAPACITY);
        Self { sender }
    }

    pub fn emit(&self, event: EngineEvent) {
        tracing::trace!(?event, "Event");
        let _ = self.sender.send(event);
    }

    pub fn notice(&self, message: impl Into<String>) {
        self.emit(EngineEvent::Notice(message.into()));
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.sender.subscribe()
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emitting_without_subscribers_is_harmless() {
        let bus = EventBus::new();
        bus.notice("nobody listening");
    }

    #[test]
    fn subscribers_see_events_in_order() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        bus.emit(EngineEvent::StateChanged(PlaybackState::Loading));
        bus.emit(EngineEvent::StateChanged(PlaybackState::Playing));

        assert_eq!(
            testing::drain(&mut rx),
            vec![
                EngineEvent::StateChanged(PlaybackState::Loading),
                EngineEvent::StateChanged(PlaybackState::Playing),
            ]
        );
    }
}
