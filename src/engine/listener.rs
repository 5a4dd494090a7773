//! Output event listener

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use crate::audio::OutputEvent;

use super::PlaybackEngine;

impl PlaybackEngine {
    /// Follow the output's event stream. End of the current track is the
    /// only automatic advance.
    pub fn start_output_listener(&self) -> JoinHandle<()> {
        let engine = self.clone();
        let mut events = self.output.subscribe();
        tracing::info!("Starting output event listener");

        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(OutputEvent::EndOfTrack(source)) => {
                        tracing::debug!(?source, "OutputEvent::EndOfTrack");
                        if let Err(e) = engine.on_end_of_track(source).await {
                            tracing::warn!(error = %e, "Auto-advance failed");
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Output listener fell behind");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            tracing::debug!("Output event listener stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::engine::testing::*;
    use crate::model::PlaybackState;

    #[tokio::test(start_paused = true)]
    async fn last_track_ending_goes_idle() {
        let h = Harness::new().await;
        h.stream("a");
        let listener = h.engine.start_output_listener();
        h.engine.play_all(vec![timed("a", 3)], 0).await.unwrap();

        tokio::time::advance(Duration::from_secs(3)).await;
        settle().await;

        assert_eq!(h.engine.state().await, PlaybackState::Idle);
        listener.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn stale_end_of_track_is_ignored() {
        let h = Harness::new().await;
        h.stream("a");
        h.stream("b");
        h.engine.start_output_listener();
        h.engine.play_all(vec![timed("a", 3), timed("b", 300)], 0).await.unwrap();
        let first = h.current_source().await.unwrap();

        h.engine.on_end_of_track(first).await.unwrap();
        assert_eq!(h.current_id().await.as_deref(), Some("b"));

        h.engine.on_end_of_track(first).await.unwrap();
        assert_eq!(h.current_id().await.as_deref(), Some("b"));
        assert_eq!(h.engine.state().await, PlaybackState::Playing);
    }
}
