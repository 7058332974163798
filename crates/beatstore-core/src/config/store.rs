//! Client configuration tree
//!
//! Stored as YAML. Default location: ~/.config/beatstore/config.yaml

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use super::paths::default_download_dir;
use crate::types::{PROGRESS_TICK_MS, SNIPPET_SECONDS};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// REST backend settings
    pub api: ApiConfig,
    /// Snippet and playback settings
    pub preview: PreviewConfig,
    /// Where purchased downloads are written
    /// Default: ~/Music/beatstore
    pub download_dir: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            preview: PreviewConfig::default(),
            download_dir: default_download_dir(),
        }
    }
}

/// REST backend section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL every endpoint path is joined onto
    pub base_url: String,
    /// Bearer token for purchase/download endpoints
    pub token: Option<String>,
    /// Per-request timeout
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000/api".to_string(),
            token: None,
            timeout_secs: 30,
        }
    }
}

impl ApiConfig {
    /// Request timeout as a `Duration`
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

/// Preview section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreviewConfig {
    /// Maximum length of a derived snippet in seconds
    pub snippet_seconds: f64,
    /// Cadence of transport position updates in milliseconds
    pub tick_interval_ms: u64,
    /// Play the full-length asset when no snippet can be derived
    pub fallback_to_full_asset: bool,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            snippet_seconds: SNIPPET_SECONDS,
            tick_interval_ms: PROGRESS_TICK_MS,
            fallback_to_full_asset: true,
        }
    }
}

impl PreviewConfig {
    /// Snippet length, falling back to the default for non-positive values
    pub fn snippet_seconds(&self) -> f64 {
        if self.snippet_seconds.is_finite() && self.snippet_seconds > 0.0 {
            self.snippet_seconds
        } else {
            SNIPPET_SECONDS
        }
    }

    /// Tick interval as a `Duration` (at least 1ms)
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }
}
