//! Shared handles every player component is built from

use std::sync::Arc;

use crate::client::{AuthenticatedFetch, LikeSync, MusicApi, Session, Transport};
use crate::config::Config;
use crate::error::Result;
use crate::events::EventBus;
use crate::model::LocalStore;

#[derive(Clone)]
pub struct PlayerContext {
    pub config: Arc<Config>,
    pub events: EventBus,
    pub session: Session,
    pub api: MusicApi,
    pub store: LocalStore,
    pub likes: LikeSync,
}

impl PlayerContext {
    pub fn new(config: Config, transport: Arc<dyn Transport>, store: LocalStore) -> Result<Self> {
        let events = EventBus::new();
        let session = Session::new(config.auth_strategy, events.clone());
        let fetch = AuthenticatedFetch::new(transport, session.clone(), &config.base_url)?;
        let api = MusicApi::new(fetch, config.quality.clone());
        let likes = LikeSync::new(api.clone(), session.clone(), store.clone(), events.clone());

        tracing::debug!(base_url = %config.base_url, auth = ?config.auth_strategy, "Player context ready");
        Ok(Self {
            config: Arc::new(config),
            events,
            session,
            api,
            store,
            likes,
        })
    }
}
