//! Playback coordinator
//!
//! Single owner of "what is playing". Every state change goes through here,
//! is mirrored onto the [`AudioTransport`] and forwarded to the
//! [`WaveformRegistry`].
//!
//! ## Asset switches
//!
//! - `set_asset` with the current id is a no-op (no restart, no rewind)
//! - a new asset always starts playing from 0
//! - `next` / `previous` wrap around the playlist and keep the current
//!   play/pause state
//! - reaching the end stops and rewinds; there is no auto-advance

use std::sync::Arc;

use crossbeam::channel::Receiver;

use super::state::PlaybackState;
use super::transport::{AudioTransport, TransportEvent};
use crate::snippet::SnippetCache;
use crate::types::{Beat, BeatId};
use crate::waveform::{WaveformRegistry, WaveformRenderer};

/// Direction of a playlist step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Next,
    Previous,
}

/// Process-wide playback controller
pub struct PlaybackCoordinator {
    state: PlaybackState,
    waveforms: WaveformRegistry,
    cache: Arc<SnippetCache>,
    transport: Box<dyn AudioTransport>,
    /// Snippet reference acquired by `next`/`previous`, released on switch
    owned_handle: Option<String>,
    fallback_to_full_asset: bool,
}

impl PlaybackCoordinator {
    pub fn new(cache: Arc<SnippetCache>, transport: Box<dyn AudioTransport>) -> Self {
        Self {
            state: PlaybackState::default(),
            waveforms: WaveformRegistry::new(),
            cache,
            transport,
            owned_handle: None,
            fallback_to_full_asset: true,
        }
    }

    /// Whether playlist steps play the full-length asset when no snippet
    /// can be derived (default) or stay on the current asset
    pub fn with_fallback_to_full_asset(mut self, fallback: bool) -> Self {
        self.fallback_to_full_asset = fallback;
        self
    }

    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    pub fn waveforms(&self) -> &WaveformRegistry {
        &self.waveforms
    }

    pub fn cache(&self) -> &Arc<SnippetCache> {
        &self.cache
    }

    /// Playlist entry of the current asset
    pub fn current_beat(&self) -> Option<&Beat> {
        self.state.current_index().map(|i| &self.state.playlist[i])
    }

    // ─────────────────────────────────────────────────────────────────────
    // Transport controls
    // ─────────────────────────────────────────────────────────────────────

    /// Resume the loaded asset
    ///
    /// Refused when nothing is loaded; a transport rejection leaves the
    /// coordinator paused.
    pub fn play(&mut self) {
        if self.state.current_url.is_none() {
            log::debug!("play: Nothing loaded");
            return;
        }
        self.state.is_playing = true;
        if let Err(e) = self.transport.play() {
            log::warn!("play: {}", e);
            self.state.is_playing = false;
        }
    }

    pub fn pause(&mut self) {
        self.state.is_playing = false;
        self.transport.pause();
    }

    /// Play/pause button
    pub fn toggle(&mut self) {
        if self.state.is_playing {
            self.pause();
        } else {
            self.play();
        }
    }

    /// Store a new playhead position and forward it to the waveforms
    ///
    /// Clamped to `[0, duration]` once the duration is known.
    pub fn set_current_time(&mut self, seconds: f64) {
        let seconds = if seconds.is_finite() { seconds.max(0.0) } else { 0.0 };
        self.state.current_time = if self.state.duration > 0.0 {
            seconds.min(self.state.duration)
        } else {
            seconds
        };

        if let Some(id) = self.state.current_asset {
            self.waveforms
                .update_progress(id, self.state.current_time, self.state.duration);
        }
    }

    /// User seek: move the playhead and the transport
    pub fn seek(&mut self, seconds: f64) {
        if self.state.current_url.is_none() {
            return;
        }
        self.set_current_time(seconds);
        self.transport.seek(self.state.current_time);
    }

    // ─────────────────────────────────────────────────────────────────────
    // Asset selection
    // ─────────────────────────────────────────────────────────────────────

    /// Switch to an asset and start it from the beginning
    ///
    /// No-op when `id` is already current. The caller keeps ownership of any
    /// snippet reference behind `url`.
    pub fn set_asset(&mut self, id: BeatId, url: &str) {
        if self.state.current_asset == Some(id) {
            log::trace!("set_asset: Beat {} already current", id);
            return;
        }
        self.switch_to(id, url.to_string(), true, None);
    }

    /// Replace the playlist used by `next` / `previous`
    pub fn set_playlist(&mut self, beats: Vec<Beat>) {
        log::debug!("set_playlist: {} beat(s)", beats.len());
        self.state.playlist = beats;
    }

    pub fn set_player_visible(&mut self, visible: bool) {
        self.state.is_player_visible = visible;
    }

    /// Step to the following playlist entry (wrapping)
    pub async fn next(&mut self) {
        self.step(Step::Next).await;
    }

    /// Step to the preceding playlist entry (wrapping)
    pub async fn previous(&mut self) {
        self.step(Step::Previous).await;
    }

    async fn step(&mut self, step: Step) {
        let len = self.state.playlist.len();
        if len == 0 {
            log::debug!("{:?}: Playlist is empty", step);
            return;
        }

        let target = match (self.state.current_index(), step) {
            (Some(i), Step::Next) => (i + 1) % len,
            (Some(i), Step::Previous) => (i + len - 1) % len,
            (None, Step::Next) => 0,
            (None, Step::Previous) => len - 1,
        };

        let beat = self.state.playlist[target].clone();
        if self.state.current_asset == Some(beat.id) {
            return;
        }
        let Some(source) = beat.preview_source() else {
            log::warn!("{:?}: Beat {} has no audio to preview", step, beat.id);
            return;
        };

        let (url, owned) = match self.cache.acquire(source).await {
            Some(handle) => (handle.clone(), Some(handle)),
            None if self.fallback_to_full_asset => {
                log::info!("{:?}: No snippet for beat {}, playing full asset", step, beat.id);
                (source.to_string(), None)
            }
            None => {
                log::warn!("{:?}: No snippet for beat {}, staying put", step, beat.id);
                return;
            }
        };

        let keep_playing = self.state.is_playing;
        self.switch_to(beat.id, url, keep_playing, owned);
    }

    fn switch_to(&mut self, id: BeatId, url: String, play: bool, owned: Option<String>) {
        log::info!("set_asset: Beat {} -> {}", id, url);

        self.state.current_asset = Some(id);
        self.state.current_url = Some(url.clone());
        self.state.current_time = 0.0;
        self.state.duration = 0.0;
        self.state.is_playing = play;
        self.waveforms.set_current_asset(id);

        // New reference is held before the old one is dropped so two beats
        // sharing a preview source never reclaim it in between
        let previous = std::mem::replace(&mut self.owned_handle, owned);
        if let Some(handle) = previous {
            self.cache.release(&handle);
        }

        if let Err(e) = self.transport.load(&url) {
            log::warn!("set_asset: Transport could not load {}: {}", url, e);
            self.state.is_playing = false;
            return;
        }
        if play {
            if let Err(e) = self.transport.play() {
                log::warn!("set_asset: {}", e);
                self.state.is_playing = false;
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Transport feedback
    // ─────────────────────────────────────────────────────────────────────

    /// Latest playhead report from the transport
    ///
    /// Reaching the duration ends the asset.
    pub fn update_position(&mut self, current_time: f64, duration: f64) {
        let Some(id) = self.state.current_asset else {
            return;
        };

        self.state.duration = if duration.is_finite() { duration.max(0.0) } else { 0.0 };
        if self.state.duration > 0.0 && current_time >= self.state.duration {
            self.finish_asset();
            return;
        }

        self.set_current_time(current_time);
        log::trace!(
            "update_position: Beat {} at {:.2}/{:.2}s",
            id,
            self.state.current_time,
            self.state.duration
        );
    }

    /// Stop and rewind without advancing the playlist
    fn finish_asset(&mut self) {
        let Some(id) = self.state.current_asset else {
            return;
        };
        log::debug!("finish_asset: Beat {} ended", id);

        self.state.is_playing = false;
        self.state.current_time = 0.0;
        self.transport.pause();
        self.transport.seek(0.0);
        self.waveforms.update_progress(id, 0.0, self.state.duration);
    }

    /// Apply one event from the transport side
    ///
    /// Events for a URL other than the loaded one are stale and dropped.
    pub fn handle_transport_event(&mut self, event: TransportEvent) {
        let url = match &event {
            TransportEvent::TimeUpdate { url, .. }
            | TransportEvent::Ended { url }
            | TransportEvent::Rejected { url, .. } => url,
        };
        if self.state.current_url.as_deref() != Some(url.as_str()) {
            log::trace!("handle_transport_event: Dropping stale event for {}", url);
            return;
        }

        match event {
            TransportEvent::TimeUpdate {
                current_time,
                duration,
                ..
            } => self.update_position(current_time, duration),
            TransportEvent::Ended { .. } => self.finish_asset(),
            TransportEvent::Rejected { reason, .. } => {
                log::warn!("handle_transport_event: Playback rejected: {}", reason);
                self.state.is_playing = false;
            }
        }
    }

    /// Apply every queued transport event without blocking
    ///
    /// Returns the number of events handled.
    pub fn drain_events(&mut self, events: &Receiver<TransportEvent>) -> usize {
        let mut handled = 0;
        while let Ok(event) = events.try_recv() {
            self.handle_transport_event(event);
            handled += 1;
        }
        handled
    }

    // ─────────────────────────────────────────────────────────────────────
    // Waveforms
    // ─────────────────────────────────────────────────────────────────────

    /// Register a renderer; it starts following if its beat is current
    pub fn register_waveform(&mut self, source_url: &str, id: BeatId, renderer: Arc<dyn WaveformRenderer>) {
        let follows = self.state.current_asset == Some(id);
        self.waveforms.register(source_url, id, renderer.clone());
        if follows && self.state.duration > 0.0 {
            if let Err(e) = renderer.accept_seek(self.state.progress()) {
                log::trace!("register_waveform: Initial seek skipped: {}", e);
            }
        }
    }

    pub fn unregister_waveform(&mut self, source_url: &str, renderer: &Arc<dyn WaveformRenderer>) -> bool {
        self.waveforms.unregister(source_url, renderer)
    }
}

impl Drop for PlaybackCoordinator {
    fn drop(&mut self) {
        if let Some(handle) = self.owned_handle.take() {
            self.cache.release(&handle);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    use super::*;
    use crate::playback::TransportError;
    use crate::snippet::test_support::{wav_bytes, MemoryFetcher};
    use crate::snippet::{HandleStore, SnippetDeriver};
    use crate::waveform::{ProgressRenderer, RendererState};

    #[derive(Default)]
    struct MockTransport {
        calls: Arc<Mutex<Vec<String>>>,
        reject_play: Arc<AtomicBool>,
    }

    impl AudioTransport for MockTransport {
        fn load(&mut self, url: &str) -> Result<(), TransportError> {
            self.calls.lock().unwrap().push(format!("load {url}"));
            Ok(())
        }

        fn play(&mut self) -> Result<(), TransportError> {
            self.calls.lock().unwrap().push("play".to_string());
            if self.reject_play.load(Ordering::SeqCst) {
                Err(TransportError::Rejected("autoplay blocked".to_string()))
            } else {
                Ok(())
            }
        }

        fn pause(&mut self) {
            self.calls.lock().unwrap().push("pause".to_string());
        }

        fn seek(&mut self, seconds: f64) {
            self.calls.lock().unwrap().push(format!("seek {seconds}"));
        }
    }

    struct Fixture {
        coordinator: PlaybackCoordinator,
        cache: Arc<SnippetCache>,
        calls: Arc<Mutex<Vec<String>>>,
        reject_play: Arc<AtomicBool>,
    }

    fn source(id: i64) -> String {
        format!("http://cdn/mp3/{id}.wav")
    }

    fn beat(id: i64) -> Beat {
        Beat {
            id: BeatId(id),
            name: format!("Beat {id}"),
            genre: "Trap".to_string(),
            bpm: 140,
            scale: "A minor".to_string(),
            cover_art: None,
            snippet_mp3: None,
            price: None,
            mp3_file: Some(source(id)),
            mp3_price: Some("19.99".to_string()),
            wav_file: None,
            wav_price: None,
            stems_file: None,
            stems_price: None,
        }
    }

    /// Coordinator over beats `1..=count`, all derivable except `missing`
    fn fixture(count: i64, missing: &[i64]) -> Fixture {
        let mut fetcher = MemoryFetcher::new();
        for id in 1..=count {
            if !missing.contains(&id) {
                fetcher = fetcher.with_file(&source(id), wav_bytes(1.0, 1_000, 1));
            }
        }
        let deriver = SnippetDeriver::new(Arc::new(fetcher), Arc::new(HandleStore::new()));
        let cache = Arc::new(SnippetCache::new(Arc::new(deriver)));

        let transport = MockTransport::default();
        let calls = transport.calls.clone();
        let reject_play = transport.reject_play.clone();

        let mut coordinator = PlaybackCoordinator::new(cache.clone(), Box::new(transport));
        coordinator.set_playlist((1..=count).map(beat).collect());

        Fixture {
            coordinator,
            cache,
            calls,
            reject_play,
        }
    }

    #[test]
    fn test_set_asset_starts_from_zero() {
        let mut f = fixture(2, &[]);
        f.coordinator.set_asset(BeatId(1), "blob:beatstore/1");

        let state = f.coordinator.state();
        assert_eq!(state.current_asset(), Some(BeatId(1)));
        assert_eq!(state.current_url(), Some("blob:beatstore/1"));
        assert!(state.is_playing());
        assert_eq!(state.current_time(), 0.0);
        assert_eq!(
            *f.calls.lock().unwrap(),
            vec!["load blob:beatstore/1".to_string(), "play".to_string()]
        );
    }

    #[test]
    fn test_set_asset_twice_is_idempotent() {
        let mut f = fixture(1, &[]);
        f.coordinator.set_asset(BeatId(1), "blob:beatstore/1");
        f.coordinator.update_position(5.0, 20.0);

        f.coordinator.set_asset(BeatId(1), "blob:beatstore/1");
        assert_eq!(f.coordinator.state().current_time(), 5.0);
        assert_eq!(f.calls.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_play_without_asset_is_refused() {
        let mut f = fixture(1, &[]);
        f.coordinator.play();
        assert!(!f.coordinator.state().is_playing());
        assert!(f.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_transport_rejection_reverts_to_paused() {
        let mut f = fixture(1, &[]);
        f.reject_play.store(true, Ordering::SeqCst);

        f.coordinator.set_asset(BeatId(1), "blob:beatstore/1");
        assert!(!f.coordinator.state().is_playing());
        assert_eq!(f.coordinator.state().current_url(), Some("blob:beatstore/1"));

        f.coordinator.toggle();
        assert!(!f.coordinator.state().is_playing());

        f.reject_play.store(false, Ordering::SeqCst);
        f.coordinator.toggle();
        assert!(f.coordinator.state().is_playing());
    }

    #[test]
    fn test_pause_keeps_loaded_asset() {
        let mut f = fixture(1, &[]);
        f.coordinator.set_asset(BeatId(1), "blob:beatstore/1");
        f.coordinator.pause();

        assert!(!f.coordinator.state().is_playing());
        assert_eq!(f.coordinator.state().current_url(), Some("blob:beatstore/1"));
    }

    #[test]
    fn test_end_of_asset_stops_and_rewinds() {
        let mut f = fixture(3, &[]);
        f.coordinator.set_asset(BeatId(2), "blob:beatstore/2");
        f.coordinator.update_position(12.0, 30.0);

        f.coordinator.update_position(30.0, 30.0);
        let state = f.coordinator.state();
        assert!(!state.is_playing());
        assert_eq!(state.current_time(), 0.0);
        assert_eq!(state.current_asset(), Some(BeatId(2)));
        assert!(f.calls.lock().unwrap().ends_with(&["pause".to_string(), "seek 0".to_string()]));
    }

    #[test]
    fn test_current_time_stays_within_duration() {
        let mut f = fixture(1, &[]);
        f.coordinator.set_asset(BeatId(1), "blob:beatstore/1");
        f.coordinator.update_position(4.0, 10.0);

        f.coordinator.set_current_time(99.0);
        assert_eq!(f.coordinator.state().current_time(), 10.0);
        f.coordinator.seek(-3.0);
        assert_eq!(f.coordinator.state().current_time(), 0.0);
    }

    #[tokio::test]
    async fn test_next_wraps_around_playlist() {
        let mut f = fixture(3, &[]);
        f.coordinator.next().await;
        assert_eq!(f.coordinator.state().current_asset(), Some(BeatId(1)));

        for expected in [2, 3, 1] {
            f.coordinator.next().await;
            assert_eq!(f.coordinator.state().current_asset(), Some(BeatId(expected)));
        }

        f.coordinator.previous().await;
        assert_eq!(f.coordinator.state().current_asset(), Some(BeatId(3)));
    }

    #[tokio::test]
    async fn test_next_n_times_returns_to_start() {
        let mut f = fixture(4, &[]);
        f.coordinator.set_asset(BeatId(3), "blob:beatstore/x");

        for _ in 0..4 {
            f.coordinator.next().await;
        }
        assert_eq!(f.coordinator.state().current_asset(), Some(BeatId(3)));
    }

    #[tokio::test]
    async fn test_next_plays_snippet_and_keeps_pause_state() {
        let mut f = fixture(2, &[]);
        f.coordinator.set_asset(BeatId(1), "blob:beatstore/x");
        f.coordinator.pause();

        f.coordinator.next().await;
        let state = f.coordinator.state();
        assert_eq!(state.current_asset(), Some(BeatId(2)));
        assert!(!state.is_playing());

        let url = state.current_url().unwrap().to_string();
        assert!(HandleStore::is_handle(&url));
        assert_eq!(f.cache.ref_count(&source(2)), 1);
        assert_eq!(f.calls.lock().unwrap().last().unwrap(), &format!("load {url}"));
    }

    #[tokio::test]
    async fn test_next_falls_back_to_full_asset() {
        let mut f = fixture(2, &[2]);
        f.coordinator.set_asset(BeatId(1), "blob:beatstore/x");

        f.coordinator.next().await;
        let state = f.coordinator.state();
        assert_eq!(state.current_asset(), Some(BeatId(2)));
        assert_eq!(state.current_url(), Some(source(2).as_str()));
        assert!(state.is_playing());
    }

    #[tokio::test]
    async fn test_next_without_fallback_stays_put() {
        let mut f = fixture(2, &[2]);
        f.coordinator = PlaybackCoordinator::new(f.cache.clone(), Box::new(MockTransport::default()))
            .with_fallback_to_full_asset(false);
        f.coordinator.set_playlist(vec![beat(1), beat(2)]);
        f.coordinator.set_asset(BeatId(1), "blob:beatstore/x");

        f.coordinator.next().await;
        assert_eq!(f.coordinator.state().current_asset(), Some(BeatId(1)));
    }

    #[tokio::test]
    async fn test_switching_away_releases_owned_snippet() {
        let mut f = fixture(3, &[]);
        f.coordinator.next().await;
        assert_eq!(f.cache.ref_count(&source(1)), 1);

        f.coordinator.next().await;
        assert_eq!(f.cache.ref_count(&source(1)), 0);
        assert_eq!(f.cache.ref_count(&source(2)), 1);

        f.coordinator.set_asset(BeatId(3), "blob:beatstore/external");
        assert!(f.cache.is_empty());
    }

    #[tokio::test]
    async fn test_dropping_coordinator_releases_snippet() {
        let f = fixture(1, &[]);
        let cache = f.cache.clone();
        let mut coordinator = f.coordinator;
        coordinator.next().await;
        assert_eq!(cache.len(), 1);

        drop(coordinator);
        assert!(cache.is_empty());
        assert!(cache.handles().is_empty());
    }

    #[test]
    fn test_stale_transport_events_are_dropped() {
        let mut f = fixture(2, &[]);
        f.coordinator.set_asset(BeatId(1), "blob:beatstore/1");
        f.coordinator.set_asset(BeatId(2), "blob:beatstore/2");

        let (tx, rx) = crossbeam::channel::unbounded();
        tx.send(TransportEvent::Ended {
            url: "blob:beatstore/1".to_string(),
        })
        .unwrap();
        tx.send(TransportEvent::TimeUpdate {
            url: "blob:beatstore/2".to_string(),
            current_time: 2.0,
            duration: 8.0,
        })
        .unwrap();

        assert_eq!(f.coordinator.drain_events(&rx), 2);
        let state = f.coordinator.state();
        assert!(state.is_playing());
        assert_eq!(state.current_time(), 2.0);
        assert_eq!(state.progress(), 0.25);
    }

    #[test]
    fn test_ended_and_rejected_events() {
        let mut f = fixture(1, &[]);
        f.coordinator.set_asset(BeatId(1), "blob:beatstore/1");
        f.coordinator.update_position(3.0, 10.0);

        f.coordinator.handle_transport_event(TransportEvent::Ended {
            url: "blob:beatstore/1".to_string(),
        });
        assert!(!f.coordinator.state().is_playing());
        assert_eq!(f.coordinator.state().current_time(), 0.0);

        f.coordinator.play();
        f.coordinator.handle_transport_event(TransportEvent::Rejected {
            url: "blob:beatstore/1".to_string(),
            reason: "device lost".to_string(),
        });
        assert!(!f.coordinator.state().is_playing());
    }

    #[test]
    fn test_waveforms_follow_the_current_asset() {
        let mut f = fixture(2, &[]);
        let one = Arc::new(ProgressRenderer::new());
        let two = Arc::new(ProgressRenderer::new());
        let one_dyn: Arc<dyn WaveformRenderer> = one.clone();
        f.coordinator.register_waveform("row/1", BeatId(1), one_dyn.clone());
        f.coordinator.register_waveform("row/2", BeatId(2), two.clone());

        f.coordinator.set_asset(BeatId(1), "blob:beatstore/1");
        f.coordinator.update_position(5.0, 10.0);
        assert_eq!(one.position(), 0.5);
        assert_eq!(two.position(), 0.0);

        f.coordinator.set_asset(BeatId(2), "blob:beatstore/2");
        assert_eq!(one.position(), 0.0);
        assert_eq!(
            f.coordinator.waveforms().renderer_state(&one_dyn),
            Some(RendererState::Idle)
        );

        assert!(f.coordinator.unregister_waveform("row/1", &one_dyn));
        assert_eq!(f.coordinator.waveforms().len(), 1);
    }

    #[test]
    fn test_player_visibility_and_current_beat() {
        let mut f = fixture(2, &[]);
        assert!(f.coordinator.current_beat().is_none());
        f.coordinator.set_player_visible(true);
        f.coordinator.set_asset(BeatId(2), "blob:beatstore/2");

        assert!(f.coordinator.state().is_player_visible());
        assert_eq!(f.coordinator.current_beat().map(|b| b.id), Some(BeatId(2)));
        assert_eq!(f.coordinator.state().current_index(), Some(1));
    }
}
