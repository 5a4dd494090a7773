//! Ten-band graphic equalizer
//!
//! Each band is a peaking biquad (RBJ cookbook, Q = 1). The bands run as a
//! strict linear chain: band 1 feeds band 2 and so on.

use serde::{Deserialize, Serialize};

/// Band centre frequencies in Hz, lowest first
pub const EQ_BANDS: [u32; 10] = [32, 64, 125, 250, 500, 1000, 2000, 4000, 8000, 16000];
pub const BAND_COUNT: usize = EQ_BANDS.len();
pub const GAIN_LIMIT_DB: f32 = 20.0;
pub const BAND_Q: f32 = 1.0;
pub const CUSTOM_PRESET: &str = "custom";
pub const FLAT_PRESET: &str = "flat";

/// A named gain table
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Preset {
    pub id: &'static str,
    pub name: &'static str,
    pub gains: [f32; BAND_COUNT],
}

pub const PRESETS: [Preset; 10] = [
    Preset { id: "flat", name: "Flat", gains: [0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0] },
    Preset { id: "rock", name: "Rock", gains: [2.0, 1.0, 0.0, -1.0, -1.0, 1.0, 2.0, 3.0, 3.0, 3.0] },
    Preset { id: "pop", name: "Pop", gains: [-1.0, 0.0, 2.0, 3.0, 2.0, 0.0, -1.0, -1.0, 0.0, 1.0] },
    Preset { id: "jazz", name: "Jazz", gains: [3.0, 2.0, 1.0, 2.0, -1.0, -1.0, 0.0, 2.0, 3.0, 4.0] },
    Preset { id: "classical", name: "Classical", gains: [4.0, 3.0, 2.0, 1.0, 0.0, 0.0, -1.0, -1.0, -2.0, -3.0] },
    Preset { id: "electronic", name: "Electronic", gains: [4.0, 2.0, 0.0, -2.0, -2.0, 0.0, 2.0, 4.0, 4.0, 2.0] },
    Preset { id: "hiphop", name: "Hip Hop", gains: [3.0, 2.0, 1.0, 0.0, -1.0, -1.0, 0.0, 1.0, 2.0, 3.0] },
    Preset { id: "vocal", name: "Vocal Boost", gains: [1.0, 1.0, 0.0, -2.0, -3.0, -2.0, 1.0, 2.0, 3.0, 4.0] },
    Preset { id: "bass", name: "Bass Boost", gains: [4.0, 3.0, 2.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0] },
    Preset { id: "treble", name: "Treble Boost", gains: [0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 2.0, 3.0, 4.0] },
];

pub fn find_preset(id: &str) -> Option<&'static Preset> {
    PRESETS.iter().find(|p| p.id.eq_ignore_ascii_case(id))
}

pub fn band_index(frequency: u32) -> Option<usize> {
    EQ_BANDS.iter().position(|&f| f == frequency)
}

/// Persistable equalizer state
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EqualizerSettings {
    pub enabled: bool,
    pub gains: [f32; BAND_COUNT],
    /// Preset id, or `"custom"` after a manual band edit
    pub preset: String,
}

impl Default for EqualizerSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            gains: [0.0; BAND_COUNT],
            preset: FLAT_PRESET.to_string(),
        }
    }
}

impl EqualizerSettings {
    pub fn is_custom(&self) -> bool {
        self.preset == CUSTOM_PRESET
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct BiquadCoeffs {
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,
}

impl BiquadCoeffs {
    const IDENTITY: Self = Self { b0: 1.0, b1: 0.0, b2: 0.0, a1: 0.0, a2: 0.0 };

    fn peaking(sample_rate: u32, frequency: u32, gain_db: f32, q: f32) -> Self {
        let nyquist = sample_rate as f32 / 2.0;
        if frequency as f32 >= nyquist || gain_db == 0.0 {
            return Self::IDENTITY;
        }

        let a = 10f32.powf(gain_db / 40.0);
        let w0 = 2.0 * std::f32::consts::PI * frequency as f32 / sample_rate as f32;
        let (sin_w0, cos_w0) = w0.sin_cos();
        let alpha = sin_w0 / (2.0 * q);

        let a0 = 1.0 + alpha / a;
        Self {
            b0: (1.0 + alpha * a) / a0,
            b1: (-2.0 * cos_w0) / a0,
            b2: (1.0 - alpha * a) / a0,
            a1: (-2.0 * cos_w0) / a0,
            a2: (1.0 - alpha / a) / a0,
        }
    }
}

/// Delay-line state of one source passing through the band chain.
///
/// Coefficients live on the [`Equalizer`]; every connected source keeps its
/// own history so two sources can be filtered during a crossfade.
#[derive(Clone, Debug)]
pub struct FilterState {
    channels: usize,
    // [channel][band] -> (z1, z2)
    delay: Vec<[(f32, f32); BAND_COUNT]>,
}

impl FilterState {
    pub fn new(channels: usize) -> Self {
        let channels = channels.max(1);
        Self {
            channels,
            delay: vec![[(0.0, 0.0); BAND_COUNT]; channels],
        }
    }

    pub fn reset(&mut self) {
        for channel in &mut self.delay {
            *channel = [(0.0, 0.0); BAND_COUNT];
        }
    }
}

#[derive(Clone, Debug)]
pub struct Equalizer {
    sample_rate: u32,
    settings: EqualizerSettings,
    coeffs: [BiquadCoeffs; BAND_COUNT],
}

impl Equalizer {
    pub fn new(sample_rate: u32, settings: EqualizerSettings) -> Self {
        let mut eq = Self {
            sample_rate,
            settings,
            coeffs: [BiquadCoeffs::IDENTITY; BAND_COUNT],
        };
        for gain in &mut eq.settings.gains {
            *gain = clamp_gain(*gain);
        }
        eq.recompute_all();
        eq
    }

    pub fn settings(&self) -> &EqualizerSettings {
        &self.settings
    }

    pub fn is_enabled(&self) -> bool {
        self.settings.enabled
    }

    /// Bypass or re-insert the chain; gains are kept either way.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.settings.enabled = enabled;
    }

    pub fn preset(&self) -> &str {
        &self.settings.preset
    }

    pub fn band_gain(&self, frequency: u32) -> Option<f32> {
        band_index(frequency).map(|i| self.settings.gains[i])
    }

    /// Set one band and mark the settings as custom. Other bands are left
    /// untouched. Returns false for a frequency that is not a band centre.
    pub fn set_band(&mut self, frequency: u32, gain_db: f32) -> bool {
        let Some(index) = band_index(frequency) else {
            return false;
        };
        self.settings.gains[index] = clamp_gain(gain_db);
        self.settings.preset = CUSTOM_PRESET.to_string();
        self.recompute(index);
        true
    }

    /// Load every band from a named table in one step.
    pub fn apply_preset(&mut self, id: &str) -> Option<&'static Preset> {
        let preset = find_preset(id)?;
        self.settings.gains = preset.gains;
        self.settings.preset = preset.id.to_string();
        self.recompute_all();
        Some(preset)
    }

    pub fn reset(&mut self) {
        self.settings.gains = [0.0; BAND_COUNT];
        self.settings.preset = FLAT_PRESET.to_string();
        self.recompute_all();
    }

    /// Run interleaved samples through all ten bands in order.
    pub fn process(&self, state: &mut FilterState, samples: &mut [f32]) {
        let channels = state.channels;
        for (i, sample) in samples.iter_mut().enumerate() {
            let delay = &mut state.delay[i % channels];
            let mut x = *sample;
            for (band, c) in self.coeffs.iter().enumerate() {
                let (z1, z2) = delay[band];
                let y = c.b0 * x + z1;
                delay[band] = (c.b1 * x - c.a1 * y + z2, c.b2 * x - c.a2 * y);
                x = y;
            }
            *sample = x;
        }
    }

    fn recompute(&mut self, index: usize) {
        self.coeffs[index] =
            BiquadCoeffs::peaking(self.sample_rate, EQ_BANDS[index], self.settings.gains[index], BAND_Q);
    }

    fn recompute_all(&mut self) {
        for index in 0..BAND_COUNT {
            self.recompute(index);
        }
    }
}

fn clamp_gain(gain_db: f32) -> f32 {
    if gain_db.is_finite() {
        gain_db.clamp(-GAIN_LIMIT_DB, GAIN_LIMIT_DB)
    } else {
        0.0
    }
}
