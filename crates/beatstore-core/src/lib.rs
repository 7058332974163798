//! Beatstore Core - Preview playback engine for the beat marketplace client

pub mod catalog;
pub mod config;
pub mod playback;
pub mod snippet;
pub mod types;
pub mod waveform;

pub use types::*;
