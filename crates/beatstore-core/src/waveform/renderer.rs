//! Renderer capability trait and a headless progress renderer

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use thiserror::Error;

/// Why a renderer refused a position update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RendererError {
    /// Audio or peaks not loaded yet
    #[error("Renderer is not ready")]
    NotReady,
    /// Renderer was torn down but not yet unregistered
    #[error("Renderer has been destroyed")]
    Destroyed,
}

/// Anything that visualizes playback progress for one beat
///
/// Card, row and drawer views all implement this; the registry only ever talks
/// to renderers through it.
pub trait WaveformRenderer: Send + Sync {
    /// Move the progress indicator to a normalized position (0.0 to 1.0)
    fn accept_seek(&self, fraction: f64) -> Result<(), RendererError>;

    /// Return to the start
    fn accept_reset(&self) -> Result<(), RendererError> {
        self.accept_seek(0.0)
    }
}

/// Lock-free progress indicator
///
/// Stores the normalized position as `f64` bits. Starts not ready; the owner
/// flips it once its peaks are loaded.
#[derive(Debug, Default)]
pub struct ProgressRenderer {
    position_bits: AtomicU64,
    ready: AtomicBool,
    destroyed: AtomicBool,
    seeks: AtomicU64,
}

impl ProgressRenderer {
    /// Create a renderer that is already ready
    pub fn new() -> Self {
        let renderer = Self::default();
        renderer.set_ready(true);
        renderer
    }

    /// Create a renderer still waiting for its peaks
    pub fn loading() -> Self {
        Self::default()
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::Release);
    }

    /// Mark as torn down; further updates are refused
    pub fn destroy(&self) {
        self.destroyed.store(true, Ordering::Release);
    }

    /// Current normalized position
    pub fn position(&self) -> f64 {
        f64::from_bits(self.position_bits.load(Ordering::Acquire))
    }

    /// Number of accepted position updates
    pub fn seek_count(&self) -> u64 {
        self.seeks.load(Ordering::Relaxed)
    }

    /// Text bar of the given width, e.g. `[#####-----]`
    pub fn bar(&self, width: usize) -> String {
        let filled = ((self.position() * width as f64).round() as usize).min(width);
        format!("[{}{}]", "#".repeat(filled), "-".repeat(width - filled))
    }
}

impl WaveformRenderer for ProgressRenderer {
    fn accept_seek(&self, fraction: f64) -> Result<(), RendererError> {
        if self.destroyed.load(Ordering::Acquire) {
            return Err(RendererError::Destroyed);
        }
        if !self.ready.load(Ordering::Acquire) {
            return Err(RendererError::NotReady);
        }
        let fraction = if fraction.is_finite() { fraction.clamp(0.0, 1.0) } else { 0.0 };
        self.position_bits.store(fraction.to_bits(), Ordering::Release);
        self.seeks.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
