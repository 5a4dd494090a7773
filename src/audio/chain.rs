//! Enhancement chain: source -> ten EQ bands -> crossfade mix -> output
//!
//! The chain is constructed lazily once the output reports a usable sample
//! rate. Every connected source gets its own filter history; the mix stage
//! applies crossfade gains and sums the sources into the output buffer,
//! which is also copied to the visualizer tap. The output drives it through
//! [`RenderStage`].

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

use super::crossfade::{Crossfade, CrossfadeMixer, CrossfadeSettings};
use super::equalizer::{Equalizer, EqualizerSettings, FilterState, Preset};
use super::output::{RenderStage, SourceId};
use super::visualizer::SignalTap;
use crate::error::{Error, Result};

pub struct EnhancementChain {
    channels: usize,
    equalizer: Equalizer,
    crossfade: CrossfadeSettings,
    mixer: CrossfadeMixer,
    filters: HashMap<SourceId, FilterState>,
    tap: SignalTap,
    scratch: Vec<f32>,
}

impl EnhancementChain {
    pub fn new(
        sample_rate: Option<u32>,
        channels: usize,
        equalizer: EqualizerSettings,
        crossfade: CrossfadeSettings,
    ) -> Result<Self> {
        let sample_rate = match sample_rate {
            Some(rate) if rate > 0 => rate,
            _ => return Err(Error::AudioGraph("output reports no sample rate".to_string())),
        };
        if channels == 0 {
            return Err(Error::AudioGraph("output has no channels".to_string()));
        }

        tracing::info!(sample_rate, channels, eq_enabled = equalizer.enabled, "Enhancement chain ready");
        Ok(Self {
            channels,
            equalizer: Equalizer::new(sample_rate, equalizer),
            crossfade,
            mixer: CrossfadeMixer::new(),
            filters: HashMap::new(),
            tap: SignalTap::new(),
            scratch: Vec::new(),
        })
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn tap(&self) -> SignalTap {
        self.tap.clone()
    }

    pub fn equalizer(&self) -> &EqualizerSettings {
        self.equalizer.settings()
    }

    pub fn crossfade(&self) -> &CrossfadeSettings {
        &self.crossfade
    }

    /// Bypass the band chain without losing the configured gains.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.equalizer.set_enabled(enabled);
        if enabled {
            for state in self.filters.values_mut() {
                state.reset();
            }
        }
    }

    pub fn set_band(&mut self, frequency: u32, gain_db: f32) -> bool {
        self.equalizer.set_band(frequency, gain_db)
    }

    pub fn apply_preset(&mut self, id: &str) -> Option<&'static Preset> {
        self.equalizer.apply_preset(id)
    }

    pub fn reset_equalizer(&mut self) {
        self.equalizer.reset();
    }

    pub fn set_crossfade_enabled(&mut self, enabled: bool) {
        self.crossfade.enabled = enabled;
    }

    pub fn set_crossfade_duration(&mut self, seconds: f32) -> Duration {
        self.crossfade.set_duration(seconds);
        self.crossfade.duration()
    }

    pub fn connect(&mut self, source: SourceId) {
        self.filters
            .entry(source)
            .or_insert_with(|| FilterState::new(self.channels));
    }

    pub fn disconnect(&mut self, source: SourceId) {
        self.filters.remove(&source);
        self.mixer.finish(source);
    }

    pub fn is_connected(&self, source: SourceId) -> bool {
        self.filters.contains_key(&source)
    }

    pub fn begin_crossfade(&mut self, outgoing: SourceId, incoming: SourceId, duration: Duration) -> Crossfade {
        self.connect(incoming);
        self.mixer.begin(outgoing, incoming, duration)
    }

    pub fn finish_crossfade(&mut self, outgoing: SourceId) {
        self.mixer.finish(outgoing);
    }

    pub fn cancel_crossfade(&mut self) {
        self.mixer.cancel();
    }

    pub fn active_crossfade(&self) -> Option<Crossfade> {
        self.mixer.active().copied()
    }

    /// Current (outgoing, incoming) gains of the active transition
    pub fn crossfade_gains(&self, now: Instant) -> Option<(f32, f32)> {
        self.mixer.active().map(|fade| fade.gains(now))
    }

    /// Mix gain for a source at `now`
    pub fn source_gain(&self, source: SourceId, now: Instant) -> f32 {
        self.mixer.gain_for(source, now)
    }

    /// Render one buffer. `inputs` are interleaved blocks the same length as
    /// `out`; sources that are not connected stay silent.
    pub fn render(&mut self, inputs: &[(SourceId, &[f32])], out: &mut [f32], now: Instant) {
        out.fill(0.0);
        for (source, samples) in inputs {
            if !self.is_connected(*source) {
                continue;
            }
            self.scratch.clear();
            self.scratch.extend_from_slice(&samples[..samples.len().min(out.len())]);

            if self.equalizer.is_enabled() {
                if let Some(state) = self.filters.get_mut(source) {
                    self.equalizer.process(state, &mut self.scratch);
                }
            }

            let gain = self.mixer.gain_for(*source, now);
            for (dst, sample) in out.iter_mut().zip(&self.scratch) {
                *dst += sample * gain;
            }
        }
        self.tap.push(out, self.channels);
    }
}

impl RenderStage for Mutex<EnhancementChain> {
    fn channels(&self) -> usize {
        self.lock().channels
    }

    fn render(&self, inputs: &[(SourceId, &[f32])], out: &mut [f32]) {
        self.lock().render(inputs, out, Instant::now());
    }

    fn gain(&self, source: SourceId) -> f32 {
        self.lock().source_gain(source, Instant::now())
    }
}
