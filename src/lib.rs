//! Streaming music playback core
//!
//! A bounded TTL cache, an authenticated fetch pipeline, a play queue, a
//! playback engine with an equalizer/crossfade chain and a spectrum
//! visualizer. The `controller` module is a headless console front-end over
//! the core.

pub mod audio;
pub mod client;
pub mod config;
pub mod context;
pub mod controller;
pub mod engine;
pub mod error;
pub mod events;
pub mod logging;
pub mod model;

pub use error::{Error, Result};
