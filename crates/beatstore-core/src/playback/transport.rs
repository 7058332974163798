//! Audio transport seam
//!
//! The coordinator drives an [`AudioTransport`] (load/play/pause/seek) and
//! receives [`TransportEvent`]s back over a crossbeam channel. Position
//! updates come from a [`ProgressTicker`] thread that samples the transport's
//! playhead at a fixed cadence, so the coordinator never owns a clock.
//!
//! ```text
//!   Coordinator ──load/play/pause/seek──► AudioTransport
//!        ▲                                    │ (PlayheadSource)
//!        └──── TransportEvent ◄── ProgressTicker (every ~100ms)
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::Sender;
use thiserror::Error;

/// Failures reported by a transport when asked to start
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransportError {
    /// The output refused to start (device busy, autoplay policy, ...)
    #[error("Playback rejected: {0}")]
    Rejected(String),

    /// `play` before anything was loaded
    #[error("No asset loaded")]
    NotLoaded,
}

/// Output device the coordinator controls
pub trait AudioTransport: Send {
    /// Point the transport at a handle or full-length URL, rewound and paused
    fn load(&mut self, url: &str) -> Result<(), TransportError>;

    /// Start or resume output
    fn play(&mut self) -> Result<(), TransportError>;

    fn pause(&mut self);

    /// Move the playhead (seconds)
    fn seek(&mut self, seconds: f64);
}

/// Notifications from the transport side
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// Periodic playhead report for the asset at `url`
    TimeUpdate {
        url: String,
        current_time: f64,
        duration: f64,
    },
    /// The asset at `url` played to its end
    Ended { url: String },
    /// Output stopped on its own after playback started
    Rejected { url: String, reason: String },
}

/// Snapshot of a transport's playhead
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Playhead {
    /// Loaded URL, `None` when empty
    pub url: Option<String>,
    pub current_time: f64,
    pub duration: f64,
    pub playing: bool,
}

/// Read side of a transport, sampled by the ticker thread
pub trait PlayheadSource: Send + Sync {
    fn playhead(&self) -> Playhead;
}

/// Background thread publishing `TimeUpdate`s while the source is playing
///
/// Stops when dropped or when the event receiver goes away.
pub struct ProgressTicker {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl ProgressTicker {
    /// Spawn the ticker thread
    pub fn spawn(
        source: Arc<dyn PlayheadSource>,
        interval: Duration,
        events: Sender<TransportEvent>,
    ) -> std::io::Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = stop.clone();

        let handle = thread::Builder::new()
            .name("progress-ticker".into())
            .spawn(move || run_ticker(source, interval, events, thread_stop))?;

        log::debug!("ProgressTicker: Started ({}ms)", interval.as_millis());
        Ok(Self {
            stop,
            handle: Some(handle),
        })
    }

    /// Stop the thread and wait for it to exit
    pub fn shutdown(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("ProgressTicker: Thread panicked");
            }
        }
    }
}

impl Drop for ProgressTicker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_ticker(
    source: Arc<dyn PlayheadSource>,
    interval: Duration,
    events: Sender<TransportEvent>,
    stop: Arc<AtomicBool>,
) {
    let mut was_playing = false;

    while !stop.load(Ordering::Acquire) {
        thread::sleep(interval);

        let playhead = source.playhead();
        let Some(url) = playhead.url else {
            was_playing = false;
            continue;
        };

        // One final report after pausing so the last position is not lost
        if !playhead.playing && !was_playing {
            continue;
        }
        was_playing = playhead.playing;

        let event = TransportEvent::TimeUpdate {
            url,
            current_time: playhead.current_time,
            duration: playhead.duration,
        };
        if events.send(event).is_err() {
            log::debug!("ProgressTicker: Receiver gone, stopping");
            break;
        }
    }
}
