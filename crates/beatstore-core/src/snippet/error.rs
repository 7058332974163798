//! Error types for snippet derivation

use thiserror::Error;

/// Errors that can occur while deriving a preview snippet
///
/// Callers treat every variant as "no snippet available" and fall back to the
/// full-length asset.
#[derive(Debug, Error)]
pub enum SnippetError {
    #[error("Failed to fetch {url}: {reason}")]
    Fetch { url: String, reason: String },

    #[error("Fetching {url} returned HTTP {status}")]
    HttpStatus { url: String, status: u16 },

    #[error("Unsupported audio format: {0}")]
    UnsupportedFormat(String),

    #[error("Failed to decode audio: {0}")]
    Decode(String),

    #[error("Source audio at {url} contains no samples")]
    Empty { url: String },

    #[error("Failed to encode snippet: {0}")]
    Encode(#[from] hound::Error),
}

impl SnippetError {
    /// Whether the failure happened while retrieving the source bytes
    pub fn is_fetch_error(&self) -> bool {
        matches!(self, SnippetError::Fetch { .. } | SnippetError::HttpStatus { .. })
    }

    /// Whether the source bytes were not usable audio
    pub fn is_decode_error(&self) -> bool {
        matches!(
            self,
            SnippetError::UnsupportedFormat(_) | SnippetError::Decode(_) | SnippetError::Empty { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, SnippetError>;
