//! Configuration for the beatstore client
//!
//! - Generic YAML config loading/saving
//! - Default config and download locations
//! - The `StoreConfig` tree (API endpoint, preview behaviour)
//!
//! # Usage
//!
//! ```ignore
//! use beatstore_core::config::{load_config, save_config, default_config_path, StoreConfig};
//!
//! let path = default_config_path();
//! let config: StoreConfig = load_config(&path);
//! save_config(&config, &path)?;
//! ```

mod io;
mod paths;
mod store;

pub use io::{load_config, save_config};
pub use paths::{default_config_path, default_download_dir};
pub use store::{ApiConfig, PreviewConfig, StoreConfig};
