//! Audio output seam
//!
//! The engine drives sources through [`AudioOutput`]. [`HeadlessOutput`] is
//! a clock-driven implementation: it decodes nothing, keeps a position clock
//! per source and reports end-of-track when the clock runs out. Once a
//! [`RenderStage`] is attached it pulls a block from every playing source
//! through the stage on a fixed tick.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::error::{Error, Result};
use crate::model::PlaybackTiming;

/// Handle to one loaded stream
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SourceId(pub u64);

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OutputEvent {
    EndOfTrack(SourceId),
}

/// Length of one rendered block
pub const RENDER_INTERVAL: Duration = Duration::from_millis(20);

const TONE_AMPLITUDE: f32 = 0.25;

/// Processing graph the output pulls samples through
pub trait RenderStage: Send + Sync {
    fn channels(&self) -> usize;

    /// Mix interleaved per-source blocks into `out`.
    fn render(&self, inputs: &[(SourceId, &[f32])], out: &mut [f32]);

    /// Level the stage applies to `source` right now
    fn gain(&self, source: SourceId) -> f32;
}

#[async_trait]
pub trait AudioOutput: Send + Sync {
    /// Open a stream. The source starts paused at position zero.
    async fn load(&self, url: &str, duration: Option<Duration>) -> Result<SourceId>;

    fn play(&self, source: SourceId);

    fn pause(&self, source: SourceId);

    fn seek(&self, source: SourceId, position: Duration);

    /// Disconnect and release a source. Unknown ids are ignored.
    fn stop(&self, source: SourceId);

    fn position(&self, source: SourceId) -> Duration;

    /// Length reported by the stream, if any
    fn duration(&self, source: SourceId) -> Option<Duration>;

    /// Master volume in 0.0..=1.0
    fn set_volume(&self, volume: f32);

    /// Sample rate of the processing graph, or `None` when the environment
    /// has no graph to host enhancements.
    fn sample_rate(&self) -> Option<u32>;

    fn subscribe(&self) -> broadcast::Receiver<OutputEvent>;

    /// Route every playing source through `stage`, replacing any earlier one.
    fn attach(&self, stage: Arc<dyn RenderStage>);
}

struct HeadlessSource {
    url: String,
    timing: PlaybackTiming,
    /// Per-source level last reported by the render stage
    gain: f32,
    end_task: Option<JoinHandle<()>>,
}

impl HeadlessSource {
    fn cancel_end(&mut self) {
        if let Some(handle) = self.end_task.take() {
            handle.abort();
        }
    }
}

/// Output without a device
#[derive(Clone)]
pub struct HeadlessOutput {
    sources: Arc<Mutex<HashMap<SourceId, HeadlessSource>>>,
    next_id: Arc<AtomicU64>,
    volume: Arc<Mutex<f32>>,
    peak: Arc<Mutex<f32>>,
    sample_rate: Option<u32>,
    events: broadcast::Sender<OutputEvent>,
    renderer: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl HeadlessOutput {
    pub fn new(sample_rate: Option<u32>) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            sources: Arc::new(Mutex::new(HashMap::new())),
            next_id: Arc::new(AtomicU64::new(1)),
            volume: Arc::new(Mutex::new(1.0)),
            peak: Arc::new(Mutex::new(0.0)),
            sample_rate,
            events,
            renderer: Arc::new(Mutex::new(None)),
        }
    }

    pub fn volume(&self) -> f32 {
        *self.volume.lock()
    }

    pub fn is_loaded(&self, source: SourceId) -> bool {
        self.sources.lock().contains_key(&source)
    }

    pub fn is_playing(&self, source: SourceId) -> bool {
        self.sources
            .lock()
            .get(&source)
            .is_some_and(|s| s.timing.is_playing)
    }

    pub fn url(&self, source: SourceId) -> Option<String> {
        self.sources.lock().get(&source).map(|s| s.url.clone())
    }

    pub fn loaded_count(&self) -> usize {
        self.sources.lock().len()
    }

    /// Level of a source after the render stage's crossfade gain
    pub fn gain(&self, source: SourceId) -> Option<f32> {
        self.sources.lock().get(&source).map(|s| s.gain)
    }

    /// Peak of the last rendered block after master volume
    pub fn peak(&self) -> f32 {
        *self.peak.lock()
    }

    /// Pull one block from every playing source through `stage`.
    fn render_block(&self, stage: &dyn RenderStage, rate: u32, frames: usize) {
        let channels = stage.channels().max(1);
        let blocks: Vec<(SourceId, Vec<f32>)> = self
            .sources
            .lock()
            .iter()
            .filter(|(_, s)| s.timing.is_playing)
            .map(|(id, s)| (*id, synth_block(*id, s.timing.current_position(), rate, frames, channels)))
            .collect();

        // The stage locks itself; the source table must not be held here.
        let inputs: Vec<(SourceId, &[f32])> = blocks.iter().map(|(id, b)| (*id, b.as_slice())).collect();
        let mut out = vec![0.0; frames * channels];
        stage.render(&inputs, &mut out);
        let gains: Vec<(SourceId, f32)> = blocks.iter().map(|(id, _)| (*id, stage.gain(*id))).collect();

        {
            let mut sources = self.sources.lock();
            for (id, gain) in gains {
                if let Some(entry) = sources.get_mut(&id) {
                    entry.gain = gain;
                }
            }
        }
        let peak = out.iter().fold(0.0f32, |m, s| m.max(s.abs()));
        *self.peak.lock() = peak * self.volume();
    }

    fn schedule_end(&self, source: SourceId, entry: &mut HeadlessSource) {
        entry.cancel_end();
        let Some(remaining) = entry.timing.remaining() else {
            return;
        };
        let deadline = Instant::now() + remaining;
        let events = self.events.clone();
        let sources = self.sources.clone();
        entry.end_task = Some(tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            if let Some(entry) = sources.lock().get_mut(&source) {
                entry.timing.pause();
                entry.end_task = None;
            }
            tracing::debug!(?source, "Source reached end of stream");
            let _ = events.send(OutputEvent::EndOfTrack(source));
        }));
    }
}

#[async_trait]
impl AudioOutput for HeadlessOutput {
    async fn load(&self, url: &str, duration: Option<Duration>) -> Result<SourceId> {
        if url.trim().is_empty() {
            return Err(Error::Output("empty stream URL".to_string()));
        }
        let id = SourceId(self.next_id.fetch_add(1, Ordering::Relaxed));
        tracing::debug!(?id, url, ?duration, "Loading source");
        self.sources.lock().insert(
            id,
            HeadlessSource {
                url: url.to_string(),
                timing: PlaybackTiming::new(duration),
                gain: 1.0,
                end_task: None,
            },
        );
        Ok(id)
    }

    fn play(&self, source: SourceId) {
        let mut sources = self.sources.lock();
        if let Some(entry) = sources.get_mut(&source) {
            entry.timing.resume();
            self.schedule_end(source, entry);
        }
    }

    fn pause(&self, source: SourceId) {
        if let Some(entry) = self.sources.lock().get_mut(&source) {
            entry.timing.pause();
            entry.cancel_end();
        }
    }

    fn seek(&self, source: SourceId, position: Duration) {
        let mut sources = self.sources.lock();
        if let Some(entry) = sources.get_mut(&source) {
            let playing = entry.timing.is_playing;
            entry.timing.update_position(position.as_millis() as u64, playing);
            if playing {
                self.schedule_end(source, entry);
            }
        }
    }

    fn stop(&self, source: SourceId) {
        if let Some(mut entry) = self.sources.lock().remove(&source) {
            tracing::debug!(?source, "Source disconnected");
            entry.cancel_end();
        }
    }

    fn position(&self, source: SourceId) -> Duration {
        self.sources
            .lock()
            .get(&source)
            .map(|s| s.timing.current_position())
            .unwrap_or_default()
    }

    fn duration(&self, source: SourceId) -> Option<Duration> {
        self.sources
            .lock()
            .get(&source)
            .and_then(|s| (s.timing.duration_ms > 0).then(|| Duration::from_millis(s.timing.duration_ms)))
    }

    fn set_volume(&self, volume: f32) {
        *self.volume.lock() = volume.clamp(0.0, 1.0);
    }

    fn sample_rate(&self) -> Option<u32> {
        self.sample_rate
    }

    fn subscribe(&self) -> broadcast::Receiver<OutputEvent> {
        self.events.subscribe()
    }

    fn attach(&self, stage: Arc<dyn RenderStage>) {
        let Some(rate) = self.sample_rate.filter(|rate| *rate > 0) else {
            tracing::debug!("No sample rate, render stage not attached");
            return;
        };
        let frames = (u128::from(rate) * RENDER_INTERVAL.as_millis() / 1000) as usize;

        let output = self.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(RENDER_INTERVAL);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                output.render_block(stage.as_ref(), rate, frames);
            }
        });
        if let Some(previous) = self.renderer.lock().replace(handle) {
            previous.abort();
        }
        tracing::debug!(rate, frames, "Render stage attached");
    }
}

/// Stand-in signal for a source: a sine tone keyed to its id, phased by the
/// source clock so consecutive blocks join up.
fn synth_block(source: SourceId, position: Duration, rate: u32, frames: usize, channels: usize) -> Vec<f32> {
    let frequency = 110.0 * (1 + source.0 % 8) as f64;
    let start = position.as_secs_f64();
    let mut block = Vec::with_capacity(frames * channels);
    for i in 0..frames {
        let t = start + i as f64 / f64::from(rate);
        let sample = TONE_AMPLITUDE * (std::f64::consts::TAU * frequency * t).sin() as f32;
        block.extend(std::iter::repeat_n(sample, channels));
    }
    block
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Recorder {
        gain: f32,
        blocks: Mutex<Vec<(SourceId, Vec<f32>)>>,
    }

    impl RenderStage for Recorder {
        fn channels(&self) -> usize {
            2
        }

        fn render(&self, inputs: &[(SourceId, &[f32])], out: &mut [f32]) {
            let mut blocks = self.blocks.lock();
            for (source, block) in inputs {
                blocks.push((*source, block.to_vec()));
            }
            out.fill(0.5);
        }

        fn gain(&self, _source: SourceId) -> f32 {
            self.gain
        }
    }

    #[tokio::test(start_paused = true)]
    async fn attached_stage_renders_playing_sources() {
        let output = HeadlessOutput::new(Some(44_100));
        let stage = Arc::new(Recorder {
            gain: 0.3,
            blocks: Mutex::new(Vec::new()),
        });
        output.attach(stage.clone());
        let playing = output.load("https://cdn/a.mp3", None).await.unwrap();
        let paused = output.load("https://cdn/b.mp3", None).await.unwrap();
        output.play(playing);
        output.set_volume(0.5);

        tokio::time::advance(RENDER_INTERVAL).await;
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }

        let blocks = stage.blocks.lock().clone();
        assert!(!blocks.is_empty());
        assert!(blocks.iter().all(|(source, block)| *source == playing && block.len() == 882 * 2));
        assert!(blocks.iter().any(|(_, block)| block.iter().any(|s| s.abs() > 0.0)));
        assert_eq!(output.gain(playing), Some(0.3));
        assert_eq!(output.gain(paused), Some(1.0));
        assert!((output.peak() - 0.25).abs() < 1e-6);
    }

    #[tokio::test(start_paused = true)]
    async fn end_is_due_from_play_not_from_first_poll() {
        let output = HeadlessOutput::new(None);
        let mut events = output.subscribe();
        let id = output.load("https://cdn/a.mp3", Some(Duration::from_secs(5))).await.unwrap();
        output.play(id);

        tokio::time::advance(Duration::from_secs(5)).await;
        for _ in 0..5 {
            tokio::task::yield_now().await;
        }
        assert_eq!(events.try_recv().unwrap(), OutputEvent::EndOfTrack(id));
    }

    #[tokio::test(start_paused = true)]
    async fn reports_end_of_track_after_duration() {
        let output = HeadlessOutput::new(Some(44_100));
        let mut events = output.subscribe();
        let id = output.load("https://cdn/a.mp3", Some(Duration::from_secs(5))).await.unwrap();
        output.play(id);

        tokio::time::advance(Duration::from_secs(4)).await;
        assert!(events.try_recv().is_err());

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(events.recv().await.unwrap(), OutputEvent::EndOfTrack(id));
        assert!(!output.is_playing(id));
    }

    #[tokio::test(start_paused = true)]
    async fn pause_holds_position_and_end() {
        let output = HeadlessOutput::new(Some(44_100));
        let mut events = output.subscribe();
        let id = output.load("https://cdn/a.mp3", Some(Duration::from_secs(5))).await.unwrap();
        output.play(id);
        tokio::time::advance(Duration::from_secs(2)).await;
        output.pause(id);

        tokio::time::advance(Duration::from_secs(10)).await;
        tokio::task::yield_now().await;
        assert_eq!(output.position(id), Duration::from_secs(2));
        assert!(events.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn seek_moves_the_clock() {
        let output = HeadlessOutput::new(None);
        let id = output.load("https://cdn/a.mp3", Some(Duration::from_secs(60))).await.unwrap();
        output.seek(id, Duration::from_secs(30));
        assert_eq!(output.position(id), Duration::from_secs(30));
        assert_eq!(output.duration(id), Some(Duration::from_secs(60)));
    }

    #[tokio::test]
    async fn stop_releases_source() {
        let output = HeadlessOutput::new(None);
        let id = output.load("https://cdn/a.mp3", None).await.unwrap();
        output.stop(id);
        assert!(!output.is_loaded(id));
        output.stop(id);
    }

    #[tokio::test]
    async fn empty_url_is_rejected() {
        let output = HeadlessOutput::new(None);
        assert!(matches!(output.load(" ", None).await, Err(Error::Output(_))));
    }
}
