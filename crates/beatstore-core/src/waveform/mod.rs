//! Waveform progress synchronization
//!
//! Renderers register per source URL; the registry pushes normalized seek
//! positions to those showing the current asset and parks the rest at 0.

mod registry;
mod renderer;

pub use registry::{RendererState, WaveformRegistry};
pub use renderer::{ProgressRenderer, RendererError, WaveformRenderer};
