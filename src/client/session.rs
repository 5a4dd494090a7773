//! User session state
//!
//! In cookie mode the tokens live in the HTTP client's cookie jar and the
//! session only remembers who is logged in. In bearer mode it also holds the
//! access/refresh pair.

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::config::AuthStrategy;
use crate::events::{EngineEvent, EventBus};

pub const SESSION_EXPIRED_NOTICE: &str = "Session expired. Please login again.";

#[derive(Clone, Debug, Default)]
struct SessionState {
    user: Option<String>,
    access_token: Option<String>,
    refresh_token: Option<String>,
}

#[derive(Clone)]
pub struct Session {
    strategy: AuthStrategy,
    state: Arc<RwLock<SessionState>>,
    events: EventBus,
}

impl Session {
    pub fn new(strategy: AuthStrategy, events: EventBus) -> Self {
        Self {
            strategy,
            state: Arc::new(RwLock::new(SessionState::default())),
            events,
        }
    }

    pub fn strategy(&self) -> AuthStrategy {
        self.strategy
    }

    pub async fn is_active(&self) -> bool {
        self.state.read().await.user.is_some()
    }

    pub async fn user(&self) -> Option<String> {
        self.state.read().await.user.clone()
    }

    pub async fn access_token(&self) -> Option<String> {
        self.state.read().await.access_token.clone()
    }

    pub async fn refresh_token(&self) -> Option<String> {
        self.state.read().await.refresh_token.clone()
    }

    pub async fn begin(&self, user: String, access_token: Option<String>, refresh_token: Option<String>) {
        {
            let mut state = self.state.write().await;
            state.user = Some(user.clone());
            state.access_token = access_token;
            state.refresh_token = refresh_token;
        }
        tracing::info!(user = %user, strategy = ?self.strategy, "Session started");
        self.events.emit(EngineEvent::LoggedIn(user));
    }

    pub async fn set_access_token(&self, token: String) {
        self.state.write().await.access_token = Some(token);
    }

    /// Voluntary logout
    pub async fn end(&self) {
        if self.clear().await {
            tracing::info!("Session ended");
            self.events.emit(EngineEvent::LoggedOut);
        }
    }

    /// Teardown after the backend rejected the refresh credentials
    pub async fn expire(&self) {
        if self.clear().await {
            tracing::warn!("Session expired");
            self.events.emit(EngineEvent::SessionExpired);
            self.events.notice(SESSION_EXPIRED_NOTICE);
        }
    }

    async fn clear(&self) -> bool {
        let mut state = self.state.write().await;
        let was_active = state.user.is_some();
        *state = SessionState::default();
        was_active
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::testing::drain;

    #[tokio::test]
    async fn expire_clears_tokens_and_notifies_once() {
        let events = EventBus::new();
        let mut rx = events.subscribe();
        let session = Session::new(AuthStrategy::Bearer, events);
        session.begin("ana".into(), Some("a1".into()), Some("r1".into())).await;

        session.expire().await;
        session.expire().await;

        assert!(!session.is_active().await);
        assert_eq!(session.access_token().await, None);
        assert_eq!(
            drain(&mut rx),
            vec![
                EngineEvent::LoggedIn("ana".into()),
                EngineEvent::SessionExpired,
                EngineEvent::Notice(SESSION_EXPIRED_NOTICE.into()),
            ]
        );
    }
}
