//! Playback coordination
//!
//! - [`PlaybackCoordinator`]: the one place playback state changes
//! - [`AudioTransport`] / [`TransportEvent`]: the seam to the audio output
//! - [`ProgressTicker`]: fixed-cadence playhead reports from the output side

mod coordinator;
mod state;
mod transport;

pub use coordinator::PlaybackCoordinator;
pub use state::PlaybackState;
pub use transport::{
    AudioTransport, Playhead, PlayheadSource, ProgressTicker, TransportError, TransportEvent,
};
