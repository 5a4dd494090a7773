//! Transport, queue and enhancement commands

use crate::audio::{EQ_BANDS, PRESETS};
use crate::error::Result;
use crate::model::PlaybackState;

use super::input::{Command, EqCommand, FadeCommand, VizCommand};
use super::{AppController, format_track};

const VIZ_GLYPHS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

impl AppController {
    pub(crate) async fn playback_command(&self, command: Command) -> Result<String> {
        match command {
            Command::Play(index) => {
                let track = self.listed(index).await?;
                let line = format_track(&track);
                self.engine.play(track).await?;
                Ok(format!("Playing {}", line))
            }
            Command::Add(index) => {
                let track = self.listed(index).await?;
                let line = format_track(&track);
                self.engine.enqueue(track).await;
                Ok(format!("Queued {}", line))
            }
            Command::NextUp(index) => {
                let track = self.listed(index).await?;
                let line = format_track(&track);
                self.engine.play_next(track).await;
                Ok(format!("Up next: {}", line))
            }
            Command::Remove(index) => Ok(match self.engine.remove_from_queue(index).await? {
                Some(track) => format!("Removed {}", format_track(&track)),
                None => "No such queue position".to_string(),
            }),
            Command::Clear => {
                self.engine.clear_queue().await;
                Ok("Queue cleared".to_string())
            }
            Command::Queue => Ok(self.queue_text().await),
            Command::Next => {
                self.engine.next().await?;
                Ok(self.now_playing().await)
            }
            Command::Prev => {
                self.engine.previous().await?;
                Ok(self.now_playing().await)
            }
            Command::Pause => Ok(match self.engine.toggle_play_pause().await {
                PlaybackState::Paused => "Paused".to_string(),
                PlaybackState::Playing => "Playing".to_string(),
                _ => "Nothing to play".to_string(),
            }),
            Command::Seek(percent) => {
                self.engine.seek(percent).await;
                Ok(String::new())
            }
            Command::Volume(volume) => {
                let volume = self.engine.set_volume(volume).await;
                Ok(format!("Volume {:.0}%", volume * 100.0))
            }
            Command::Shuffle => Ok(format!(
                "Shuffle {}",
                if self.engine.toggle_shuffle().await { "on" } else { "off" }
            )),
            Command::Repeat => Ok(format!("Repeat {}", self.engine.cycle_repeat().await.label())),
            Command::PlayLiked => {
                self.engine.play_all_liked().await?;
                Ok(self.now_playing().await)
            }
            Command::Sleep(minutes) => Ok(match self.engine.set_sleep_timer(minutes).await {
                Some(_) => format!("Sleeping in {} min", minutes),
                None => "Sleep timer off".to_string(),
            }),
            Command::Eq(eq) => self.equalizer_command(eq).await,
            Command::Xfade(fade) => self.crossfade_command(fade).await,
            Command::Viz(viz) => Ok(self.visualizer_command(viz)),
            other => {
                tracing::error!(?other, "Command routed to playback handler");
                Ok(String::new())
            }
        }
    }

    async fn equalizer_command(&self, command: EqCommand) -> Result<String> {
        match command {
            EqCommand::Show => {}
            EqCommand::On => self.engine.set_equalizer_enabled(true).await?,
            EqCommand::Off => self.engine.set_equalizer_enabled(false).await?,
            EqCommand::Reset => self.engine.reset_equalizer().await?,
            EqCommand::Band { frequency, gain_db } => {
                if !self.engine.set_eq_band(frequency, gain_db).await? {
                    let bands: Vec<String> = EQ_BANDS.iter().map(u32::to_string).collect();
                    return Ok(format!("Bands are {} Hz", bands.join(", ")));
                }
            }
            EqCommand::Preset(id) => {
                if self.engine.apply_eq_preset(&id).await?.is_none() {
                    let names: Vec<&str> = PRESETS.iter().map(|p| p.id).collect();
                    return Ok(format!("Unknown preset. Try: {}", names.join(", ")));
                }
            }
        }

        let settings = self.engine.equalizer_settings()?;
        let gains: Vec<String> = EQ_BANDS
            .iter()
            .zip(settings.gains.iter())
            .map(|(freq, gain)| format!("{}:{:+.0}", freq, gain))
            .collect();
        Ok(format!(
            "EQ {} [{}] {}",
            if settings.enabled { "on" } else { "off" },
            settings.preset,
            gains.join(" ")
        ))
    }

    async fn crossfade_command(&self, command: FadeCommand) -> Result<String> {
        match command {
            FadeCommand::Show => {}
            FadeCommand::On => self.engine.set_crossfade(true).await?,
            FadeCommand::Off => self.engine.set_crossfade(false).await?,
            FadeCommand::Duration(seconds) => {
                self.engine.set_crossfade_duration(seconds).await?;
            }
        }
        let settings = self.engine.crossfade_settings()?;
        Ok(format!(
            "Crossfade {} ({:.1}s)",
            if settings.enabled { "on" } else { "off" },
            settings.duration().as_secs_f32()
        ))
    }

    fn visualizer_command(&self, command: VizCommand) -> String {
        let Some(visualizer) = &self.visualizer else {
            return "Visualizer is not available on this output".to_string();
        };
        match command {
            VizCommand::On => {
                visualizer.start();
                "Visualizer on".to_string()
            }
            VizCommand::Off => {
                visualizer.stop();
                "Visualizer off".to_string()
            }
            VizCommand::Bars(count) => format!("{} bars", visualizer.set_bar_count(count)),
            VizCommand::Sensitivity(value) => format!("Sensitivity {:.1}", visualizer.set_sensitivity(value)),
            VizCommand::Show if !visualizer.is_running() => "Visualizer is off".to_string(),
            VizCommand::Show => render_bars(&visualizer.latest().bars),
        }
    }

    async fn queue_text(&self) -> String {
        let (tracks, cursor) = self.engine.queue().await;
        if tracks.is_empty() {
            return "Queue is empty".to_string();
        }
        tracks
            .iter()
            .enumerate()
            .map(|(i, track)| {
                let marker = if i as isize == cursor { '>' } else { ' ' };
                format!("{}{:>3}. {}", marker, i + 1, format_track(track))
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    async fn now_playing(&self) -> String {
        match self.engine.current_track().await {
            Some(track) => format!("Playing {}", format_track(&track)),
            None => "Stopped".to_string(),
        }
    }
}

fn render_bars(bars: &[f32]) -> String {
    bars.iter()
        .map(|v| {
            let level = (v.clamp(0.0, 1.0) * (VIZ_GLYPHS.len() - 1) as f32).round() as usize;
            VIZ_GLYPHS[level]
        })
        .collect()
}
