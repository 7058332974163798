//! Standard locations for beatstore files

use std::path::PathBuf;

/// Get the default config file path
///
/// Returns: `~/.config/beatstore/config.yaml`
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
        .join("beatstore")
        .join("config.yaml")
}

/// Get the default directory purchased downloads are saved to
///
/// Returns: `~/Music/beatstore`
pub fn default_download_dir() -> PathBuf {
    dirs::audio_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join("Music")))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("beatstore")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_path_ends_with_file_name() {
        let path = default_config_path();
        assert!(path.ends_with("beatstore/config.yaml"));
    }

    #[test]
    fn test_download_dir_ends_with_beatstore() {
        assert!(default_download_dir().ends_with("beatstore"));
    }
}
