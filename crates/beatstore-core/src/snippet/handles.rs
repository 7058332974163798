//! Process-local handle store
//!
//! Derived snippets live in memory and are addressed by opaque handle URLs of
//! the form `blob:beatstore/<n>`. Handles are never reused within a process
//! and stop resolving once revoked.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// Scheme prefix of every handle URL
pub const HANDLE_PREFIX: &str = "blob:beatstore/";

/// An encoded snippet and the facts a transport needs about it
#[derive(Debug, Clone)]
pub struct SnippetAsset {
    /// Source URL the snippet was derived from
    pub source_url: String,
    /// Complete WAV file
    pub bytes: Arc<[u8]>,
    pub sample_rate: u32,
    pub channels: u16,
    /// Sample frames in the snippet
    pub frames: u64,
}

impl SnippetAsset {
    /// Duration in seconds
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            0.0
        } else {
            self.frames as f64 / self.sample_rate as f64
        }
    }
}

/// Registry of live snippet handles
#[derive(Debug, Default)]
pub struct HandleStore {
    next_id: AtomicU64,
    assets: Mutex<HashMap<String, Arc<SnippetAsset>>>,
}

impl HandleStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Arc<SnippetAsset>>> {
        self.assets.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Store an asset under a fresh handle URL
    pub fn allocate(&self, asset: SnippetAsset) -> String {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let handle = format!("{HANDLE_PREFIX}{id}");
        self.lock().insert(handle.clone(), Arc::new(asset));
        handle
    }

    /// Look up a live handle
    pub fn resolve(&self, handle_url: &str) -> Option<Arc<SnippetAsset>> {
        self.lock().get(handle_url).cloned()
    }

    /// Reclaim the memory behind a handle
    ///
    /// Returns false if the handle was unknown or already revoked.
    pub fn revoke(&self, handle_url: &str) -> bool {
        let removed = self.lock().remove(handle_url).is_some();
        if removed {
            log::debug!("revoke: Reclaimed {}", handle_url);
        }
        removed
    }

    /// Whether a URL looks like a handle from this store
    pub fn is_handle(url: &str) -> bool {
        url.starts_with(HANDLE_PREFIX)
    }

    /// Number of live handles
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
