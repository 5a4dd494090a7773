//! Equalizer and crossfade controls
//!
//! Every change is applied to the live chain, persisted and announced with
//! `EnhancementChanged`. Without a chain (output has no usable sample rate)
//! the controls report `AudioGraph` and playback is unaffected.

use std::time::Duration;

use tokio::time::Instant;

use crate::audio::{CrossfadeSettings, EnhancementChain, EqualizerSettings, Preset, SignalTap};
use crate::error::{Error, Result};
use crate::events::EngineEvent;

use super::PlaybackEngine;

impl PlaybackEngine {
    fn with_chain<R>(&self, f: impl FnOnce(&mut EnhancementChain) -> R) -> Result<R> {
        let chain = self
            .chain
            .as_ref()
            .ok_or_else(|| Error::AudioGraph("enhancements are not available on this output".to_string()))?;
        Ok(f(&mut *chain.lock()))
    }

    async fn persist_enhancements(&self) {
        let Ok((equalizer, crossfade)) =
            self.with_chain(|chain| (chain.equalizer().clone(), chain.crossfade().clone()))
        else {
            return;
        };
        self.store
            .update(|state| {
                state.equalizer = equalizer;
                state.crossfade = crossfade;
            })
            .await;
        self.events.emit(EngineEvent::EnhancementChanged);
    }

    pub fn equalizer_settings(&self) -> Result<EqualizerSettings> {
        self.with_chain(|chain| chain.equalizer().clone())
    }

    pub fn crossfade_settings(&self) -> Result<CrossfadeSettings> {
        self.with_chain(|chain| chain.crossfade().clone())
    }

    pub async fn set_equalizer_enabled(&self, enabled: bool) -> Result<()> {
        self.with_chain(|chain| chain.set_enabled(enabled))?;
        tracing::info!(enabled, "Equalizer toggled");
        self.persist_enhancements().await;
        Ok(())
    }

    /// Set one band's gain. Returns false for a frequency that is not one of
    /// the ten bands.
    pub async fn set_eq_band(&self, frequency: u32, gain_db: f32) -> Result<bool> {
        let changed = self.with_chain(|chain| chain.set_band(frequency, gain_db))?;
        if changed {
            tracing::debug!(frequency, gain_db, "EQ band set");
            self.persist_enhancements().await;
        }
        Ok(changed)
    }

    /// Apply a named preset. `Ok(None)` when no preset has that name.
    pub async fn apply_eq_preset(&self, id: &str) -> Result<Option<&'static Preset>> {
        let preset = self.with_chain(|chain| chain.apply_preset(id))?;
        match preset {
            Some(preset) => {
                tracing::info!(preset = preset.id, "EQ preset applied");
                self.persist_enhancements().await;
            }
            None => tracing::debug!(preset = id, "Unknown EQ preset"),
        }
        Ok(preset)
    }

    pub async fn reset_equalizer(&self) -> Result<()> {
        self.with_chain(|chain| chain.reset_equalizer())?;
        self.persist_enhancements().await;
        Ok(())
    }

    pub async fn set_crossfade(&self, enabled: bool) -> Result<()> {
        self.with_chain(|chain| chain.set_crossfade_enabled(enabled))?;
        tracing::info!(enabled, "Crossfade toggled");
        self.persist_enhancements().await;
        Ok(())
    }

    /// Returns the duration actually stored after clamping.
    pub async fn set_crossfade_duration(&self, seconds: f32) -> Result<Duration> {
        let duration = self.with_chain(|chain| chain.set_crossfade_duration(seconds))?;
        tracing::debug!(?duration, "Crossfade duration set");
        self.persist_enhancements().await;
        Ok(duration)
    }

    /// (outgoing, incoming) gains while a crossfade is running
    pub fn crossfade_gains(&self) -> Option<(f32, f32)> {
        self.with_chain(|chain| chain.crossfade_gains(Instant::now()))
            .ok()
            .flatten()
    }

    /// Tap on the mixed output for the visualizer
    pub fn signal_tap(&self) -> Option<SignalTap> {
        self.with_chain(|chain| chain.tap()).ok()
    }
}
