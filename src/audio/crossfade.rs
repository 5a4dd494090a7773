//! Linear crossfade between an outgoing and an incoming source

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use super::output::SourceId;

pub const MIN_CROSSFADE_SECS: f32 = 0.5;
pub const MAX_CROSSFADE_SECS: f32 = 10.0;
pub const DEFAULT_CROSSFADE_SECS: f32 = 3.0;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrossfadeSettings {
    pub enabled: bool,
    pub duration_secs: f32,
}

impl Default for CrossfadeSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            duration_secs: DEFAULT_CROSSFADE_SECS,
        }
    }
}

impl CrossfadeSettings {
    pub fn set_duration(&mut self, seconds: f32) {
        self.duration_secs = clamp_duration(seconds);
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs_f32(clamp_duration(self.duration_secs))
    }

    /// Fade length to use for the next transition, if fading is on.
    pub fn active_duration(&self) -> Option<Duration> {
        self.enabled.then(|| self.duration())
    }
}

fn clamp_duration(seconds: f32) -> f32 {
    if seconds.is_finite() {
        seconds.clamp(MIN_CROSSFADE_SECS, MAX_CROSSFADE_SECS)
    } else {
        DEFAULT_CROSSFADE_SECS
    }
}

/// One in-flight transition. Both ramps read the same start instant, so the
/// two gains always sum to one.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Crossfade {
    pub outgoing: SourceId,
    pub incoming: SourceId,
    pub started: Instant,
    pub duration: Duration,
}

impl Crossfade {
    pub fn new(outgoing: SourceId, incoming: SourceId, duration: Duration) -> Self {
        Self {
            outgoing,
            incoming,
            started: Instant::now(),
            duration,
        }
    }

    pub fn progress(&self, now: Instant) -> f32 {
        if self.duration.is_zero() {
            return 1.0;
        }
        let elapsed = now.saturating_duration_since(self.started);
        (elapsed.as_secs_f32() / self.duration.as_secs_f32()).clamp(0.0, 1.0)
    }

    /// (outgoing, incoming) gains at `now`
    pub fn gains(&self, now: Instant) -> (f32, f32) {
        let p = self.progress(now);
        (1.0 - p, p)
    }

    pub fn is_complete(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.started) >= self.duration
    }

    pub fn gain_for(&self, source: SourceId, now: Instant) -> Option<f32> {
        let (out_gain, in_gain) = self.gains(now);
        if source == self.outgoing {
            Some(out_gain)
        } else if source == self.incoming {
            Some(in_gain)
        } else {
            None
        }
    }
}

/// Final mix stage ahead of the output
#[derive(Debug, Default)]
pub struct CrossfadeMixer {
    active: Option<Crossfade>,
}

impl CrossfadeMixer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a transition, replacing any earlier one.
    pub fn begin(&mut self, outgoing: SourceId, incoming: SourceId, duration: Duration) -> Crossfade {
        if let Some(previous) = self.active.take() {
            tracing::debug!(outgoing = ?previous.outgoing, "Crossfade superseded");
        }
        let fade = Crossfade::new(outgoing, incoming, duration);
        self.active = Some(fade);
        fade
    }

    pub fn active(&self) -> Option<&Crossfade> {
        self.active.as_ref()
    }

    /// Drop the transition that faded `outgoing` out, if it is still the
    /// active one.
    pub fn finish(&mut self, outgoing: SourceId) {
        if self.active.is_some_and(|fade| fade.outgoing == outgoing) {
            self.active = None;
        }
    }

    pub fn cancel(&mut self) {
        self.active = None;
    }

    /// Gain for a connected source. Sources outside the transition play at
    /// full level; once a fade completes the outgoing side stays silent until
    /// it is disconnected.
    pub fn gain_for(&self, source: SourceId, now: Instant) -> f32 {
        self.active
            .and_then(|fade| fade.gain_for(source, now))
            .unwrap_or(1.0)
    }
}
