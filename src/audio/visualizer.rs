//! Spectrum visualizer
//!
//! Reads the most recent output samples through a [`SignalTap`], runs a
//! Hann-windowed FFT and publishes normalized bar heights on a watch
//! channel. The visualizer never holds an engine handle, so starting or
//! stopping it cannot change transport state.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rustfft::{Fft, FftPlanner, num_complex::Complex};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

pub const FFT_SIZE: usize = 256;
pub const DEFAULT_BAR_COUNT: usize = 64;
pub const MIN_BAR_COUNT: usize = 16;
pub const MAX_BAR_COUNT: usize = 128;
pub const DEFAULT_SENSITIVITY: f32 = 1.5;
pub const MIN_SENSITIVITY: f32 = 0.1;
pub const MAX_SENSITIVITY: f32 = 3.0;

// Magnitude range mapped onto 0..=1
const MIN_DECIBELS: f32 = -100.0;
const MAX_DECIBELS: f32 = -30.0;

/// Ring buffer holding the last [`FFT_SIZE`] mono samples of final output
#[derive(Clone, Debug)]
pub struct SignalTap {
    samples: Arc<Mutex<VecDeque<f32>>>,
}

impl Default for SignalTap {
    fn default() -> Self {
        Self::new()
    }
}

impl SignalTap {
    pub fn new() -> Self {
        Self {
            samples: Arc::new(Mutex::new(VecDeque::with_capacity(FFT_SIZE))),
        }
    }

    /// Downmix interleaved samples and append them.
    pub fn push(&self, interleaved: &[f32], channels: usize) {
        let channels = channels.max(1);
        let mut samples = self.samples.lock();
        for frame in interleaved.chunks(channels) {
            let mono = frame.iter().sum::<f32>() / frame.len() as f32;
            if samples.len() == FFT_SIZE {
                samples.pop_front();
            }
            samples.push_back(mono);
        }
    }

    /// Latest window, zero-padded at the front when not yet full
    pub fn snapshot(&self) -> Vec<f32> {
        let samples = self.samples.lock();
        let mut window = vec![0.0; FFT_SIZE - samples.len()];
        window.extend(samples.iter().copied());
        window
    }

    pub fn clear(&self) {
        self.samples.lock().clear();
    }
}

pub struct SpectrumAnalyzer {
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    buffer: Vec<Complex<f32>>,
    bar_count: usize,
    sensitivity: f32,
}

impl Default for SpectrumAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl SpectrumAnalyzer {
    pub fn new() -> Self {
        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(FFT_SIZE);
        let window = (0..FFT_SIZE)
            .map(|i| 0.5 - 0.5 * (2.0 * std::f32::consts::PI * i as f32 / (FFT_SIZE - 1) as f32).cos())
            .collect();
        Self {
            fft,
            window,
            buffer: vec![Complex::new(0.0, 0.0); FFT_SIZE],
            bar_count: DEFAULT_BAR_COUNT,
            sensitivity: DEFAULT_SENSITIVITY,
        }
    }

    pub fn bar_count(&self) -> usize {
        self.bar_count
    }

    pub fn set_bar_count(&mut self, count: usize) {
        self.bar_count = count.clamp(MIN_BAR_COUNT, MAX_BAR_COUNT);
    }

    pub fn sensitivity(&self) -> f32 {
        self.sensitivity
    }

    pub fn set_sensitivity(&mut self, sensitivity: f32) {
        self.sensitivity = if sensitivity.is_finite() {
            sensitivity.clamp(MIN_SENSITIVITY, MAX_SENSITIVITY)
        } else {
            DEFAULT_SENSITIVITY
        };
    }

    /// Bar heights in 0..=1 for one window of mono samples.
    pub fn analyze(&mut self, samples: &[f32]) -> Vec<f32> {
        for (i, slot) in self.buffer.iter_mut().enumerate() {
            let sample = samples.get(i).copied().unwrap_or(0.0);
            *slot = Complex::new(sample * self.window[i], 0.0);
        }
        self.fft.process(&mut self.buffer);

        let bins: Vec<f32> = self.buffer[..FFT_SIZE / 2]
            .iter()
            .map(|c| {
                let magnitude = c.norm() / FFT_SIZE as f32;
                if magnitude <= 0.0 {
                    return 0.0;
                }
                let db = 20.0 * magnitude.log10();
                ((db - MIN_DECIBELS) / (MAX_DECIBELS - MIN_DECIBELS)).clamp(0.0, 1.0)
            })
            .collect();

        let per_bar = (bins.len() / self.bar_count).max(1);
        (0..self.bar_count)
            .map(|bar| {
                let start = (bar * per_bar).min(bins.len());
                let end = (start + per_bar).min(bins.len());
                let slice = &bins[start..end];
                if slice.is_empty() {
                    return 0.0;
                }
                let level = slice.iter().sum::<f32>() / slice.len() as f32;
                (level * self.sensitivity).clamp(0.0, 1.0)
            })
            .collect()
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SpectrumFrame {
    pub seq: u64,
    pub bars: Vec<f32>,
}

/// Periodic spectrum renderer with a single refresh task
pub struct SpectrumVisualizer {
    tap: SignalTap,
    analyzer: Arc<Mutex<SpectrumAnalyzer>>,
    frames: watch::Sender<SpectrumFrame>,
    task: Mutex<Option<JoinHandle<()>>>,
    interval: Duration,
}

impl SpectrumVisualizer {
    pub fn new(tap: SignalTap, interval: Duration) -> Self {
        let (frames, _) = watch::channel(SpectrumFrame::default());
        Self {
            tap,
            analyzer: Arc::new(Mutex::new(SpectrumAnalyzer::new())),
            frames,
            task: Mutex::new(None),
            interval: interval.max(Duration::from_millis(1)),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<SpectrumFrame> {
        self.frames.subscribe()
    }

    pub fn latest(&self) -> SpectrumFrame {
        self.frames.borrow().clone()
    }

    pub fn is_running(&self) -> bool {
        self.task.lock().is_some()
    }

    /// Start the refresh loop. Returns false if it was already running.
    pub fn start(&self) -> bool {
        let mut task = self.task.lock();
        if task.is_some() {
            return false;
        }

        let tap = self.tap.clone();
        let analyzer = self.analyzer.clone();
        let frames = self.frames.clone();
        let period = self.interval;
        *task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut seq = 0u64;
            loop {
                ticker.tick().await;
                let bars = analyzer.lock().analyze(&tap.snapshot());
                seq += 1;
                frames.send_replace(SpectrumFrame { seq, bars });
            }
        }));
        tracing::debug!(interval_ms = period.as_millis() as u64, "Visualizer started");
        true
    }

    /// Stop the refresh loop. Returns false if it was not running.
    pub fn stop(&self) -> bool {
        match self.task.lock().take() {
            Some(handle) => {
                handle.abort();
                tracing::debug!("Visualizer stopped");
                true
            }
            None => false,
        }
    }

    pub fn set_bar_count(&self, count: usize) -> usize {
        let mut analyzer = self.analyzer.lock();
        analyzer.set_bar_count(count);
        analyzer.bar_count()
    }

    pub fn set_sensitivity(&self, sensitivity: f32) -> f32 {
        let mut analyzer = self.analyzer.lock();
        analyzer.set_sensitivity(sensitivity);
        analyzer.sensitivity()
    }
}

impl Drop for SpectrumVisualizer {
    fn drop(&mut self) {
        self.stop();
    }
}
