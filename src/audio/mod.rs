//! Audio side of the player
//!
//! - `output`: the output seam, its render stage and the headless clock-driven output
//! - `equalizer`: ten peaking bands and the preset table
//! - `crossfade`: fade settings and the mix-stage ramps
//! - `chain`: the enhancement graph tying the bands and mix stage together
//! - `visualizer`: FFT spectrum bars read from the chain's output tap

pub mod chain;
pub mod crossfade;
pub mod equalizer;
pub mod output;
pub mod visualizer;

pub use chain::EnhancementChain;
pub use crossfade::{Crossfade, CrossfadeSettings};
pub use equalizer::{EQ_BANDS, EqualizerSettings, PRESETS, Preset};
pub use output::{AudioOutput, HeadlessOutput, OutputEvent, RenderStage, SourceId};
pub use visualizer::{SignalTap, SpectrumFrame, SpectrumVisualizer};
