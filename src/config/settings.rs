//! Application settings and paths.
//!
//! Manages XDG-compliant paths for configuration and data.

use crate::bus::DEFAULT_CHANNEL_CAPACITY;
use crate::error::{ConfigError, ConfigResult};
use crate::scan_loop::{ScanMode, DEFAULT_POLL_TIMEOUT};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application directory paths following XDG Base Directory Specification.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Configuration directory (~/.config/tagwatch)
    pub config_dir: PathBuf,
    /// Data directory (~/.local/share/tagwatch)
    pub data_dir: PathBuf,
}

impl Paths {
    /// Resolve the XDG directories for this user.
    pub fn new() -> ConfigResult<Self> {
        let project = ProjectDirs::from("com", "tagwatch", "tagwatch")
            .ok_or(ConfigError::DirectoryNotFound)?;

        Ok(Self {
            config_dir: project.config_dir().to_path_buf(),
            data_dir: project.data_dir().to_path_buf(),
        })
    }

    /// Get the path to the settings file.
    pub fn settings_file(&self) -> PathBuf {
        self.config_dir.join("settings.json")
    }
}

/// Which [`ScanMode`] to build by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModeSetting {
    Single,
    Repeat,
}

/// Application-wide settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// Default scan mode.
    pub mode: ModeSetting,
    /// Pause between continuous-mode cycles, in milliseconds.
    pub idle_ms: u64,
    /// How long one poll waits for a tag, in seconds.
    pub poll_timeout_secs: u64,
    /// Per-channel event buffer.
    pub channel_capacity: usize,
    /// Default output format.
    pub default_output_format: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            mode: ModeSetting::Repeat,
            idle_ms: 2000,
            poll_timeout_secs: DEFAULT_POLL_TIMEOUT.as_secs(),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            default_output_format: "plain".to_string(),
        }
    }
}

impl AppSettings {
    /// Load settings from the default location, falling back to defaults
    /// when no file exists.
    pub fn load() -> ConfigResult<Self> {
        let file = Paths::new()?.settings_file();
        if !file.exists() {
            return Ok(Self::default());
        }
        Self::load_from(&file)
    }

    /// Load settings from a specific file.
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let settings: Self =
            serde_json::from_str(&content).map_err(|e| ConfigError::InvalidFormat(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Save settings to the default location.
    pub fn save(&self) -> ConfigResult<PathBuf> {
        let file = Paths::new()?.settings_file();
        self.save_to(&file)?;
        Ok(file)
    }

    /// Save settings to a specific file, creating parent directories.
    pub fn save_to(&self, path: &Path) -> ConfigResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).map_err(|e| ConfigError::WriteFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Check values the scan loop cannot work with.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.poll_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "poll_timeout_secs",
                reason: "must be at least 1 second".to_string(),
            });
        }
        if self.channel_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                field: "channel_capacity",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Build the configured scan mode.
    pub fn scan_mode(&self) -> ScanMode {
        match self.mode {
            ModeSetting::Single => ScanMode::single_scan(),
            ModeSetting::Repeat => ScanMode::repeat_polling(self.idle_duration()),
        }
    }

    pub fn idle_duration(&self) -> Duration {
        Duration::from_millis(self.idle_ms)
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_secs(self.poll_timeout_secs)
    }
}
