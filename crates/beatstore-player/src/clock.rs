//! Headless transport driven by the wall clock
//!
//! Plays nothing; it only advances a playhead in real time so the coordinator,
//! ticker and waveform plumbing can run without an audio device.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use beatstore_core::playback::{AudioTransport, Playhead, PlayheadSource, TransportError};
use beatstore_core::snippet::{decode_audio, AudioFetcher, HandleStore};

#[derive(Default)]
struct ClockInner {
    url: Option<String>,
    duration: f64,
    /// Playhead when `started` was set (or the frozen playhead while paused)
    base: f64,
    started: Option<Instant>,
}

impl ClockInner {
    fn position(&self) -> f64 {
        let elapsed = self.started.map_or(0.0, |t| t.elapsed().as_secs_f64());
        (self.base + elapsed).min(self.duration)
    }
}

/// Shared playhead, sampled by the progress ticker
#[derive(Default)]
pub struct Clock {
    inner: Mutex<ClockInner>,
}

impl Clock {
    fn lock(&self) -> MutexGuard<'_, ClockInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl PlayheadSource for Clock {
    fn playhead(&self) -> Playhead {
        let inner = self.lock();
        Playhead {
            url: inner.url.clone(),
            current_time: inner.position(),
            duration: inner.duration,
            playing: inner.started.is_some(),
        }
    }
}

/// Control side handed to the coordinator
pub struct ClockTransport {
    clock: Arc<Clock>,
    handles: Arc<HandleStore>,
    fetcher: Arc<dyn AudioFetcher>,
}

impl ClockTransport {
    /// Create the transport and the playhead the ticker should sample
    pub fn new(handles: Arc<HandleStore>, fetcher: Arc<dyn AudioFetcher>) -> (Self, Arc<Clock>) {
        let clock = Arc::new(Clock::default());
        let transport = Self {
            clock: clock.clone(),
            handles,
            fetcher,
        };
        (transport, clock)
    }

    /// Snippet handles know their length; anything else is decoded once
    fn duration_of(&self, url: &str) -> Result<f64, TransportError> {
        if HandleStore::is_handle(url) {
            return self
                .handles
                .resolve(url)
                .map(|asset| asset.duration_secs())
                .ok_or_else(|| TransportError::Rejected(format!("{url} was revoked")));
        }

        let bytes = self
            .fetcher
            .fetch(url)
            .map_err(|e| TransportError::Rejected(e.to_string()))?;
        let audio = decode_audio(bytes, url).map_err(|e| TransportError::Rejected(e.to_string()))?;
        Ok(audio.duration_secs())
    }
}

impl AudioTransport for ClockTransport {
    fn load(&mut self, url: &str) -> Result<(), TransportError> {
        let duration = self.duration_of(url)?;
        *self.clock.lock() = ClockInner {
            url: Some(url.to_string()),
            duration,
            ..Default::default()
        };
        log::debug!("ClockTransport: Loaded {} ({:.2}s)", url, duration);
        Ok(())
    }

    fn play(&mut self) -> Result<(), TransportError> {
        let mut inner = self.clock.lock();
        if inner.url.is_none() {
            return Err(TransportError::NotLoaded);
        }
        if inner.started.is_none() {
            inner.started = Some(Instant::now());
        }
        Ok(())
    }

    fn pause(&mut self) {
        let mut inner = self.clock.lock();
        inner.base = inner.position();
        inner.started = None;
    }

    fn seek(&mut self, seconds: f64) {
        let mut inner = self.clock.lock();
        inner.base = seconds.clamp(0.0, inner.duration);
        if inner.started.is_some() {
            inner.started = Some(Instant::now());
        }
    }
}
