//! Platform application paths using the `dirs` crate.
//!
//! Layout:
//!
//! Config dir (settings):
//!   Windows: %APPDATA%\voicekey\
//!   macOS:   ~/Library/Application Support/voicekey/
//!   Linux:   ~/.config/voicekey/
//!
//! Data dir (temp recordings, model cache default):
//!   Windows: %LOCALAPPDATA%\voicekey\
//!   macOS:   ~/Library/Application Support/voicekey/
//!   Linux:   ~/.local/share/voicekey/

use std::path::PathBuf;

/// Holds all resolved application directory/file paths.
#[derive(Debug, Clone)]
pub struct AppPaths {
    /// Directory for `settings.toml`.
    pub config_dir: PathBuf,
    /// Full path to `settings.toml`.
    pub settings_file: PathBuf,
    /// Default scratch directory for temporary recording artifacts.
    pub temp_dir: PathBuf,
    /// Default cache directory offered to the speech model service.
    pub model_cache_dir: PathBuf,
}

impl AppPaths {
    const APP_NAME: &'static str = "voicekey";

    /// Resolves all paths using the `dirs` crate.
    ///
    /// Falls back to the current directory if the platform cannot provide a
    /// standard path (should be extremely rare in practice).
    pub fn new() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        let settings_file = config_dir.join("settings.toml");
        let temp_dir = data_dir.join("temp");
        let model_cache_dir = data_dir.join("models");

        Self {
            config_dir,
            settings_file,
            temp_dir,
            model_cache_dir,
        }
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}
