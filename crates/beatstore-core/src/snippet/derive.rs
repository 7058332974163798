//! Snippet derivation
//!
//! fetch → decode → truncate to `min(snippet length, source length)` →
//! encode as 16-bit WAV → allocate a handle. Every successful call allocates a
//! new handle; sharing handles between callers is the cache's job.

use std::sync::Arc;

use super::decode::{decode_audio, DecodedAudio};
use super::encode::encode_wav;
use super::error::{Result, SnippetError};
use super::fetch::AudioFetcher;
use super::handles::{HandleStore, SnippetAsset};
use crate::types::SNIPPET_SECONDS;

/// Number of frames to keep: `floor(seconds × rate)`, capped at the source length
pub fn snippet_frame_count(seconds: f64, sample_rate: u32, source_frames: usize) -> usize {
    let wanted = (seconds.max(0.0) * sample_rate as f64).floor();
    if wanted >= source_frames as f64 {
        source_frames
    } else {
        wanted as usize
    }
}

/// Stateless snippet derivation service
pub struct SnippetDeriver {
    fetcher: Arc<dyn AudioFetcher>,
    handles: Arc<HandleStore>,
    snippet_seconds: f64,
}

impl SnippetDeriver {
    /// Create a deriver producing snippets of the default length (30s)
    pub fn new(fetcher: Arc<dyn AudioFetcher>, handles: Arc<HandleStore>) -> Self {
        Self {
            fetcher,
            handles,
            snippet_seconds: SNIPPET_SECONDS,
        }
    }

    /// Override the maximum snippet length
    pub fn with_snippet_seconds(mut self, seconds: f64) -> Self {
        if seconds.is_finite() && seconds > 0.0 {
            self.snippet_seconds = seconds;
        } else {
            log::warn!("SnippetDeriver: Ignoring invalid snippet length {}", seconds);
        }
        self
    }

    pub fn snippet_seconds(&self) -> f64 {
        self.snippet_seconds
    }

    /// Store the handles are allocated in
    pub fn handles(&self) -> &Arc<HandleStore> {
        &self.handles
    }

    /// Fetch, decode and truncate a source without allocating a handle
    pub fn render(&self, source_url: &str) -> Result<SnippetAsset> {
        let bytes = self.fetcher.fetch(source_url)?;
        let mut audio: DecodedAudio = decode_audio(bytes, source_url)?;

        let source_frames = audio.frame_count();
        let frames = snippet_frame_count(self.snippet_seconds, audio.sample_rate, source_frames);
        if frames == 0 {
            return Err(SnippetError::Empty {
                url: source_url.to_string(),
            });
        }
        audio.truncate_frames(frames);

        let wav = encode_wav(&audio)?;
        log::debug!(
            "render: {} -> {} of {} frames ({} ch @ {} Hz, {} bytes)",
            source_url,
            frames,
            source_frames,
            audio.channels,
            audio.sample_rate,
            wav.len()
        );

        Ok(SnippetAsset {
            source_url: source_url.to_string(),
            bytes: Arc::from(wav),
            sample_rate: audio.sample_rate,
            channels: audio.channels,
            frames: frames as u64,
        })
    }

    /// Derive a snippet and return its new handle URL
    ///
    /// Blocking: performs network I/O and decoding on the calling thread.
    pub fn derive(&self, source_url: &str) -> Result<String> {
        log::info!("derive: Creating snippet for {}", source_url);
        let asset = self.render(source_url)?;
        let handle = self.handles.allocate(asset);
        log::info!("derive: {} ready as {}", source_url, handle);
        Ok(handle)
    }
}
