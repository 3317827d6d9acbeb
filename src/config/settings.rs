//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default`, `Clone` and
//! `PartialEq` so they can be round-tripped through TOML files and swapped
//! atomically at runtime.

use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::AppPaths;

// ---------------------------------------------------------------------------
// SttServiceConfig
// ---------------------------------------------------------------------------

/// Connection settings for the local speech-recognition service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SttServiceConfig {
    /// Base URL of the ASR HTTP service.
    pub base_url: String,
    /// Maximum seconds to wait for one transcription request.
    pub timeout_secs: u64,
}

impl Default for SttServiceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8090".into(),
            timeout_secs: 60,
        }
    }
}

// ---------------------------------------------------------------------------
// CleanupConfig
// ---------------------------------------------------------------------------

/// Connection settings for the LLM text-cleanup service.
///
/// An empty `base_url` or `api_key` means the service is unconfigured; the
/// pipeline then delivers the raw transcript and surfaces a one-time
/// configuration prompt (see the controller).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanupConfig {
    /// OpenAI-compatible endpoint base URL.
    pub base_url: String,
    /// Bearer token; empty when not configured.
    pub api_key: String,
    /// Model identifier sent to the API.
    pub model: String,
    /// Maximum seconds to wait for a cleanup response.
    pub timeout_secs: u64,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            base_url: "https://dashscope.aliyuncs.com/compatible-mode/v1".into(),
            api_key: String::new(),
            model: "qwen-flash".into(),
            timeout_secs: 30,
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// # Persistence
///
/// ```rust,no_run
/// use voicekey::config::AppConfig;
///
/// // Load (returns Default when file is missing)
/// let config = AppConfig::load().unwrap();
/// // config.save().unwrap();
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global toggle hotkey, e.g. `"ctrl+shift+space"`.
    pub hotkey: String,
    /// Maximum recording length in seconds; recording stops automatically.
    pub max_seconds: u64,
    /// Scratch directory override — `None` uses the platform default.
    pub temp_dir: Option<PathBuf>,
    /// Model cache directory override passed to the speech service
    /// environment — `None` uses the platform default.
    pub model_cache_dir: Option<PathBuf>,
    /// When `true`, the "cleanup service not configured" prompt is never
    /// shown again.
    pub suppress_missing_credentials_prompt: bool,
    /// Speech-recognition service settings.
    pub stt: SttServiceConfig,
    /// Text-cleanup service settings.
    pub cleanup: CleanupConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            hotkey: "ctrl+shift+space".into(),
            max_seconds: 300,
            temp_dir: None,
            model_cache_dir: None,
            suppress_missing_credentials_prompt: false,
            stt: SttServiceConfig::default(),
            cleanup: CleanupConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet
    /// (first-run scenario) so callers never need to special-case a missing
    /// file.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path (useful for tests).
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path (useful for tests).
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Scratch directory for temporary recording artifacts.
    pub fn temp_dir(&self) -> PathBuf {
        self.temp_dir
            .clone()
            .unwrap_or_else(|| AppPaths::new().temp_dir)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
