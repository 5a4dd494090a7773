//! Search, catalog and account commands

use crate::error::Result;
use crate::model::PlaybackState;

use super::{AppController, format_duration, format_track};

impl AppController {
    pub(crate) async fn search(&self, query: &str) -> Result<String> {
        let results = self.ctx.api.search(query).await?;
        tracing::info!(query, count = results.len(), "Search finished");
        Ok(self.set_listing(results).await)
    }

    pub(crate) async fn trending(&self) -> Result<String> {
        let results = self.ctx.api.trending().await?;
        Ok(self.set_listing(results).await)
    }

    pub(crate) async fn lyrics(&self) -> Result<String> {
        let Some(track) = self.engine.current_track().await else {
            return Ok("Nothing is playing".to_string());
        };
        Ok(self
            .ctx
            .api
            .lyrics(&track.id)
            .await?
            .unwrap_or_else(|| format!("No lyrics for {}", track.title)))
    }

    pub(crate) async fn like_current(&self) -> Result<String> {
        Ok(match self.engine.toggle_like_current().await {
            Some(true) => "Added to liked songs".to_string(),
            Some(false) => "Removed from liked songs".to_string(),
            None => "Nothing is playing".to_string(),
        })
    }

    pub(crate) async fn list_likes(&self) -> Result<String> {
        let liked = self.ctx.likes.liked().await;
        Ok(self.set_listing(liked).await)
    }

    pub(crate) async fn sync_likes(&self) -> Result<String> {
        if !self.ctx.session.is_active().await {
            return Ok("Login to sync liked songs".to_string());
        }
        let count = self.ctx.likes.sync().await?;
        Ok(format!("Synced {} liked songs", count))
    }

    pub(crate) async fn login(&self, username: &str, password: &str) -> Result<String> {
        self.ctx.api.fetch().login(username, password).await?;
        let synced = match self.ctx.likes.sync().await {
            Ok(count) => format!(", {} liked songs synced", count),
            Err(e) => {
                tracing::warn!(error = %e, "Like sync after login failed");
                String::new()
            }
        };
        Ok(format!("Logged in as {}{}", username, synced))
    }

    pub(crate) async fn logout(&self) -> Result<String> {
        if !self.ctx.session.is_active().await {
            return Ok("Not logged in".to_string());
        }
        self.ctx.api.fetch().logout().await;
        Ok("Logged out".to_string())
    }

    pub(crate) async fn status(&self) -> String {
        let snapshot = self.engine.snapshot().await;
        let mut lines = Vec::new();

        match (&snapshot.track, snapshot.state) {
            (Some(track), state) => lines.push(format!(
                "{:?}: {} [{} / {}]",
                state,
                format_track(track),
                format_duration(snapshot.position.as_secs()),
                format_duration(snapshot.duration.as_secs()),
            )),
            (None, PlaybackState::Loading) => lines.push("Loading".to_string()),
            (None, _) => lines.push("Idle".to_string()),
        }

        lines.push(format!(
            "Volume {:.0}% | shuffle {} | repeat {} | queue {}/{}",
            snapshot.volume * 100.0,
            if snapshot.shuffle { "on" } else { "off" },
            snapshot.repeat.label(),
            snapshot.cursor + 1,
            snapshot.queue_len,
        ));

        if let Some(remaining) = self.engine.sleep_timer_remaining().await {
            lines.push(format!("Sleep in {}", format_duration(remaining.as_secs())));
        }
        if let Some(user) = self.ctx.session.user().await {
            lines.push(format!("Logged in as {}", user));
        }
        lines.join("\n")
    }
}
