//! Source audio retrieval
//!
//! `SourceFetcher` resolves `http(s)://` URLs with a blocking `ureq` agent and
//! `file://` URLs or bare paths from the local filesystem. Fetching blocks;
//! the cache runs derivations on the blocking pool.

use std::io::Read;
use std::path::Path;
use std::time::Duration;

use super::error::{Result, SnippetError};

/// Upper bound on a fetched source file (full-length WAVs can be large)
const MAX_SOURCE_BYTES: u64 = 512 * 1024 * 1024;

/// Anything that can turn a source URL into raw audio bytes
pub trait AudioFetcher: Send + Sync {
    fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

/// Default fetcher for HTTP(S) and local files
pub struct SourceFetcher {
    agent: ureq::Agent,
}

impl SourceFetcher {
    /// Create a fetcher with the given per-request timeout
    pub fn new(timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Self { agent }
    }

    fn fetch_http(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.agent.get(url).call().map_err(|e| match e {
            ureq::Error::Status(status, _) => SnippetError::HttpStatus {
                url: url.to_string(),
                status,
            },
            other => SnippetError::Fetch {
                url: url.to_string(),
                reason: other.to_string(),
            },
        })?;

        let capacity = response
            .header("Content-Length")
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(0);

        let mut bytes = Vec::with_capacity(capacity);
        response
            .into_reader()
            .take(MAX_SOURCE_BYTES)
            .read_to_end(&mut bytes)
            .map_err(|e| SnippetError::Fetch {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        Ok(bytes)
    }

    fn fetch_file(&self, url: &str, path: &Path) -> Result<Vec<u8>> {
        std::fs::read(path).map_err(|e| SnippetError::Fetch {
            url: url.to_string(),
            reason: e.to_string(),
        })
    }
}

impl Default for SourceFetcher {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

impl AudioFetcher for SourceFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        log::debug!("fetch: {}", url);

        if url.starts_with("http://") || url.starts_with("https://") {
            self.fetch_http(url)
        } else if let Some(path) = url.strip_prefix("file://") {
            self.fetch_file(url, Path::new(path))
        } else if url.contains("://") {
            Err(SnippetError::Fetch {
                url: url.to_string(),
                reason: "unsupported URL scheme".to_string(),
            })
        } else {
            self.fetch_file(url, Path::new(url))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetches_local_paths_and_file_urls() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("beat.bin");
        std::fs::write(&path, b"RIFF").unwrap();

        let fetcher = SourceFetcher::default();
        let bare = fetcher.fetch(path.to_str().unwrap()).unwrap();
        let url = format!("file://{}", path.display());
        let via_url = fetcher.fetch(&url).unwrap();

        assert_eq!(bare, b"RIFF");
        assert_eq!(via_url, b"RIFF");
    }

    #[test]
    fn test_missing_file_is_fetch_error() {
        let err = SourceFetcher::default()
            .fetch("/nonexistent/beatstore/beat.mp3")
            .unwrap_err();
        assert!(err.is_fetch_error());
    }

    #[test]
    fn test_unknown_scheme_is_rejected() {
        let err = SourceFetcher::default().fetch("ftp://beats/1.mp3").unwrap_err();
        assert!(err.is_fetch_error());
    }
}
