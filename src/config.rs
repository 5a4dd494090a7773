//! Runtime configuration
//!
//! Everything is settable from the command line or the environment. The
//! defaults match the hosted backend.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};

pub const DEFAULT_API_BASE: &str = "https://villen-music.onrender.com/api";

/// How credentials travel with each request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum AuthStrategy {
    /// HttpOnly cookies kept in the client's cookie jar
    Cookie,
    /// `Authorization: Bearer <access>` with tokens held in the session
    Bearer,
}

#[derive(Clone, Debug, Parser)]
#[command(name = "villen-player", version, about = "Headless VILLEN music player")]
pub struct Config {
    /// Backend API base URL
    #[arg(long, env = "VILLEN_API_BASE", default_value = DEFAULT_API_BASE)]
    pub base_url: String,

    /// Authentication strategy
    #[arg(long = "auth", env = "VILLEN_AUTH", value_enum, default_value_t = AuthStrategy::Cookie)]
    pub auth_strategy: AuthStrategy,

    /// Requested stream quality (kbps)
    #[arg(long, env = "VILLEN_QUALITY", default_value = "320")]
    pub quality: String,

    /// Directory for persisted player state
    #[arg(long, env = "VILLEN_DATA_DIR", default_value = ".cache")]
    pub data_dir: PathBuf,

    /// Directory for rolling log files
    #[arg(long, env = "VILLEN_LOG_DIR", default_value = ".logs")]
    pub log_dir: PathBuf,

    /// Visualizer refresh rate
    #[arg(long, default_value_t = 60)]
    pub visualizer_fps: u32,

    /// Output sample rate used by the enhancement chain
    #[arg(long, default_value_t = 44_100)]
    pub sample_rate: u32,
}

impl Config {
    pub fn visualizer_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.visualizer_fps.clamp(1, 240)))
    }

    pub fn state_file(&self) -> PathBuf {
        self.data_dir.join("state.json")
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE.to_string(),
            auth_strategy: AuthStrategy::Cookie,
            quality: "320".to_string(),
            data_dir: PathBuf::from(".cache"),
            log_dir: PathBuf::from(".logs"),
            visualizer_fps: 60,
            sample_rate: 44_100,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bearer_strategy_from_args() {
        let config = Config::parse_from(["villen-player", "--auth", "bearer", "--quality", "160"]);
        assert_eq!(config.auth_strategy, AuthStrategy::Bearer);
        assert_eq!(config.quality, "160");
    }

    #[test]
    fn visualizer_interval_follows_fps() {
        let config = Config {
            visualizer_fps: 50,
            ..Config::default()
        };
        assert_eq!(config.visualizer_interval(), Duration::from_millis(20));
    }
}
