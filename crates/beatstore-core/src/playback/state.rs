//! Playback state owned by the coordinator

use crate::types::{Beat, BeatId};

/// What is loaded, where the playhead is and what can be stepped to
///
/// Only [`PlaybackCoordinator`](super::PlaybackCoordinator) mutates this;
/// everyone else reads it through the getters.
#[derive(Debug, Clone, Default)]
pub struct PlaybackState {
    pub(super) current_asset: Option<BeatId>,
    pub(super) current_url: Option<String>,
    pub(super) is_playing: bool,
    pub(super) current_time: f64,
    pub(super) duration: f64,
    pub(super) playlist: Vec<Beat>,
    pub(super) is_player_visible: bool,
}

impl PlaybackState {
    pub fn current_asset(&self) -> Option<BeatId> {
        self.current_asset
    }

    /// Handle or full-length URL handed to the transport
    pub fn current_url(&self) -> Option<&str> {
        self.current_url.as_deref()
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing
    }

    /// Playhead in seconds
    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    /// Duration of the loaded asset in seconds (0 until the transport reports it)
    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn playlist(&self) -> &[Beat] {
        &self.playlist
    }

    /// Whether the mini-player is shown
    pub fn is_player_visible(&self) -> bool {
        self.is_player_visible
    }

    /// Position of the current asset in the playlist
    pub fn current_index(&self) -> Option<usize> {
        let current = self.current_asset?;
        self.playlist.iter().position(|beat| beat.id == current)
    }

    /// Playhead as a fraction of the duration (0 when the duration is unknown)
    pub fn progress(&self) -> f64 {
        if self.duration > 0.0 {
            (self.current_time / self.duration).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}
