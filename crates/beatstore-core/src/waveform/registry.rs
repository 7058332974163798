//! Waveform registry
//!
//! Multi-map from source URL to the renderers currently showing it. The same
//! beat can be on screen several times at once (row, card, drawer), so each
//! URL maps to a list of entries.
//!
//! ```text
//!   set_current_asset(B) ──► renderers of B: Following
//!                        ──► everyone else: reset to 0, Idle
//!
//!   update_progress(B, t, d) ──► Following renderers seek to t / d
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use super::renderer::WaveformRenderer;
use crate::types::BeatId;

/// A renderer's relationship to the current asset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RendererState {
    /// Shows the current asset and receives live progress
    Following,
    /// Parked at position 0
    Idle,
}

struct RegistryEntry {
    beat_id: BeatId,
    renderer: Arc<dyn WaveformRenderer>,
}

/// Tracks every live renderer and keeps them in step with playback
#[derive(Default)]
pub struct WaveformRegistry {
    entries: HashMap<String, Vec<RegistryEntry>>,
    current: Option<BeatId>,
    current_time: f64,
}

impl WaveformRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a renderer that finished loading `source_url`
    ///
    /// Registering the same renderer twice under one URL is ignored.
    pub fn register(&mut self, source_url: &str, beat_id: BeatId, renderer: Arc<dyn WaveformRenderer>) {
        let list = self.entries.entry(source_url.to_string()).or_default();
        if list.iter().any(|e| Arc::ptr_eq(&e.renderer, &renderer)) {
            log::trace!("register: Renderer for {} already registered", source_url);
            return;
        }
        list.push(RegistryEntry { beat_id, renderer });
        log::debug!(
            "register: {} now has {} renderer(s) (beat {})",
            source_url,
            list.len(),
            beat_id
        );
    }

    /// Remove a renderer; returns whether it was registered
    pub fn unregister(&mut self, source_url: &str, renderer: &Arc<dyn WaveformRenderer>) -> bool {
        let Some(list) = self.entries.get_mut(source_url) else {
            return false;
        };
        let before = list.len();
        list.retain(|e| !Arc::ptr_eq(&e.renderer, renderer));
        let removed = list.len() != before;
        if list.is_empty() {
            self.entries.remove(source_url);
        }
        if removed {
            log::debug!("unregister: Removed renderer for {}", source_url);
        }
        removed
    }

    /// Push playback progress to the renderers of the current asset
    ///
    /// No-op unless `beat_id` is current and `duration > 0`. Renderers that
    /// refuse the update (not ready yet) are skipped.
    pub fn update_progress(&mut self, beat_id: BeatId, current_time: f64, duration: f64) {
        if self.current != Some(beat_id) {
            return;
        }
        self.current_time = current_time.max(0.0);
        if duration.is_nan() || duration <= 0.0 {
            return;
        }

        let fraction = (current_time / duration).clamp(0.0, 1.0);
        for (url, entry) in self.iter_entries() {
            if entry.beat_id != beat_id {
                continue;
            }
            if let Err(e) = entry.renderer.accept_seek(fraction) {
                log::trace!("update_progress: Renderer for {} skipped seek: {}", url, e);
            }
        }
    }

    /// Make `beat_id` the current asset and park every other renderer at 0
    pub fn set_current_asset(&mut self, beat_id: BeatId) {
        self.current = Some(beat_id);
        self.current_time = 0.0;

        for (url, entry) in self.iter_entries() {
            if entry.beat_id == beat_id {
                continue;
            }
            if let Err(e) = entry.renderer.accept_reset() {
                log::trace!("set_current_asset: Renderer for {} skipped reset: {}", url, e);
            }
        }
    }

    fn iter_entries(&self) -> impl Iterator<Item = (&str, &RegistryEntry)> {
        self.entries
            .iter()
            .flat_map(|(url, list)| list.iter().map(move |entry| (url.as_str(), entry)))
    }

    /// The asset renderers are following
    pub fn current_asset(&self) -> Option<BeatId> {
        self.current
    }

    /// Last position forwarded for the current asset
    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    /// State renderers of `beat_id` are in
    pub fn state_of(&self, beat_id: BeatId) -> RendererState {
        if self.current == Some(beat_id) {
            RendererState::Following
        } else {
            RendererState::Idle
        }
    }

    /// State of a specific registered renderer, `None` if unknown
    pub fn renderer_state(&self, renderer: &Arc<dyn WaveformRenderer>) -> Option<RendererState> {
        self.iter_entries()
            .find(|(_, e)| Arc::ptr_eq(&e.renderer, renderer))
            .map(|(_, e)| self.state_of(e.beat_id))
    }

    /// Number of renderers registered under a URL
    pub fn renderers_for(&self, source_url: &str) -> usize {
        self.entries.get(source_url).map_or(0, Vec::len)
    }

    /// Total number of registered renderers
    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::waveform::ProgressRenderer;

    const URL_A: &str = "blob:beatstore/1";
    const URL_B: &str = "blob:beatstore/2";

    fn renderer() -> (Arc<ProgressRenderer>, Arc<dyn WaveformRenderer>) {
        let concrete = Arc::new(ProgressRenderer::new());
        let dynamic: Arc<dyn WaveformRenderer> = concrete.clone();
        (concrete, dynamic)
    }

    #[test]
    fn test_progress_only_reaches_matching_renderers() {
        let mut registry = WaveformRegistry::new();
        let (a, a_dyn) = renderer();
        let (b, b_dyn) = renderer();
        registry.register(URL_A, BeatId(1), a_dyn);
        registry.register(URL_B, BeatId(2), b_dyn);

        registry.set_current_asset(BeatId(1));
        registry.update_progress(BeatId(1), 5.0, 20.0);

        assert_eq!(a.position(), 0.25);
        assert_eq!(b.position(), 0.0);
        assert_eq!(b.seek_count(), 1); // the reset only
    }

    #[test]
    fn test_progress_for_non_current_asset_is_ignored() {
        let mut registry = WaveformRegistry::new();
        let (a, a_dyn) = renderer();
        registry.register(URL_A, BeatId(1), a_dyn);
        registry.set_current_asset(BeatId(2));

        registry.update_progress(BeatId(1), 5.0, 10.0);
        assert_eq!(a.position(), 0.0);
    }

    #[test]
    fn test_zero_duration_does_not_seek() {
        let mut registry = WaveformRegistry::new();
        let (a, a_dyn) = renderer();
        registry.register(URL_A, BeatId(1), a_dyn);
        registry.set_current_asset(BeatId(1));

        registry.update_progress(BeatId(1), 3.0, 0.0);
        assert_eq!(a.seek_count(), 0);
        assert_eq!(registry.current_time(), 3.0);
    }

    #[test]
    fn test_same_url_supports_many_renderers() {
        let mut registry = WaveformRegistry::new();
        let (row, row_dyn) = renderer();
        let (card, card_dyn) = renderer();
        registry.register(URL_A, BeatId(1), row_dyn.clone());
        registry.register(URL_A, BeatId(1), card_dyn);
        registry.register(URL_A, BeatId(1), row_dyn.clone());
        assert_eq!(registry.renderers_for(URL_A), 2);

        registry.set_current_asset(BeatId(1));
        registry.update_progress(BeatId(1), 1.0, 2.0);
        assert_eq!(row.position(), 0.5);
        assert_eq!(card.position(), 0.5);

        assert!(registry.unregister(URL_A, &row_dyn));
        assert!(!registry.unregister(URL_A, &row_dyn));
        registry.update_progress(BeatId(1), 2.0, 2.0);
        assert_eq!(row.position(), 0.5);
        assert_eq!(card.position(), 1.0);
    }

    #[test]
    fn test_unready_renderer_is_swallowed() {
        let mut registry = WaveformRegistry::new();
        let loading = Arc::new(ProgressRenderer::loading());
        let (ready, ready_dyn) = renderer();
        registry.register(URL_A, BeatId(1), loading.clone());
        registry.register(URL_A, BeatId(1), ready_dyn);
        registry.set_current_asset(BeatId(1));

        registry.update_progress(BeatId(1), 1.0, 4.0);
        assert_eq!(loading.position(), 0.0);
        assert_eq!(ready.position(), 0.25);
    }

    #[test]
    fn test_following_and_idle_transitions() {
        let mut registry = WaveformRegistry::new();
        let (a, a_dyn) = renderer();
        let (_, b_dyn) = renderer();
        registry.register(URL_A, BeatId(1), a_dyn.clone());
        registry.register(URL_B, BeatId(2), b_dyn.clone());

        registry.set_current_asset(BeatId(1));
        assert_eq!(registry.renderer_state(&a_dyn), Some(RendererState::Following));
        assert_eq!(registry.renderer_state(&b_dyn), Some(RendererState::Idle));

        registry.update_progress(BeatId(1), 8.0, 10.0);
        assert_eq!(a.position(), 0.8);

        // A different asset becomes current: A is parked and stops following
        registry.set_current_asset(BeatId(2));
        assert_eq!(a.position(), 0.0);
        assert_eq!(registry.renderer_state(&a_dyn), Some(RendererState::Idle));
        registry.update_progress(BeatId(1), 9.0, 10.0);
        assert_eq!(a.position(), 0.0);
    }
}
