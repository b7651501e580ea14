//! Configuration management for notesync.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::sync::{MergeOptions, SyncOptions};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "notesync";

/// Default notes file name.
const NOTES_FILE_NAME: &str = "notes.json";

/// Default sync state file name.
const SYNC_STATE_FILE_NAME: &str = "sync_state.json";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `NOTESYNC_`)
/// 2. TOML config file at `~/.config/notesync/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage configuration.
    pub storage: StorageConfig,
    /// Sync configuration.
    pub sync: SyncConfig,
}

/// Storage-related configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the notes file.
    /// Defaults to `~/.local/share/notesync/notes.json`
    pub notes_path: Option<PathBuf>,
    /// Tombstones older than this many days are removed after a sync.
    /// Set to 0 to keep them forever.
    pub tombstone_retention_days: u32,
}

/// Sync-related configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Sync folder. Overrides the folder chosen with `notes remote set`.
    pub remote_dir: Option<PathBuf>,
    /// Edits closer together than this with different content conflict.
    /// Set to 0 to disable conflict detection.
    pub conflict_window_secs: u64,
    /// Seconds between syncs in watch mode.
    pub autosync_interval_secs: u64,
    /// Regexes matching conflict copies of the notes file in the sync folder.
    pub conflict_file_patterns: Vec<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            notes_path: None, // Will be resolved to default at runtime
            tombstone_retention_days: 30,
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            remote_dir: None,
            conflict_window_secs: 5,
            autosync_interval_secs: 60,
            conflict_file_patterns: default_conflict_file_patterns(),
        }
    }
}

/// Default patterns for conflict copies written by cloud clients.
#[must_use]
pub fn default_conflict_file_patterns() -> Vec<String> {
    vec![
        // OneDrive: notes-<MACHINE>.json
        r"^notes-.+\.json$".to_string(),
        // Dropbox: notes (Someone's conflicted copy 2024-01-01).json
        r"(?i)conflicted.*\.json$".to_string(),
    ]
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// Configuration is loaded in this order (later sources override earlier):
    /// 1. Default values
    /// 2. TOML config file (if exists)
    /// 3. Environment variables (prefixed with `NOTESYNC_`)
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file))
            .merge(Env::prefixed("NOTESYNC_").split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.sync.autosync_interval_secs == 0 {
            return Err(Error::ConfigValidation {
                message: "autosync_interval_secs must be greater than 0".to_string(),
            });
        }

        for pattern in &self.sync.conflict_file_patterns {
            if regex::Regex::new(pattern).is_err() {
                return Err(Error::ConfigValidation {
                    message: format!("invalid regex pattern: {pattern}"),
                });
            }
        }

        Ok(())
    }

    /// Get the notes file path, resolving defaults if not set.
    #[must_use]
    pub fn notes_path(&self) -> PathBuf {
        self.storage
            .notes_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(NOTES_FILE_NAME))
    }

    /// Get the sync state path. It lives next to the notes file.
    #[must_use]
    pub fn sync_state_path(&self) -> PathBuf {
        let notes = self.notes_path();
        match notes.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.join(SYNC_STATE_FILE_NAME),
            _ => PathBuf::from(SYNC_STATE_FILE_NAME),
        }
    }

    /// Get the tombstone retention as a chrono Duration.
    #[must_use]
    pub fn tombstone_retention(&self) -> Option<chrono::Duration> {
        if self.storage.tombstone_retention_days == 0 {
            None
        } else {
            Some(chrono::Duration::days(i64::from(
                self.storage.tombstone_retention_days,
            )))
        }
    }

    /// Get the age after which `notes purge` removes tombstones.
    ///
    /// An explicit `override_days` wins, and 0 then means "all tombstones".
    /// Without it the configured retention applies, where 0 keeps
    /// tombstones forever and `None` is returned.
    #[must_use]
    pub fn purge_retention(&self, override_days: Option<u32>) -> Option<chrono::Duration> {
        match override_days {
            Some(days) => Some(chrono::Duration::days(i64::from(days))),
            None => self.tombstone_retention(),
        }
    }

    /// Get the conflict window as a Duration.
    #[must_use]
    pub fn conflict_window(&self) -> Duration {
        Duration::from_secs(self.sync.conflict_window_secs)
    }

    /// Get the autosync interval as a Duration.
    #[must_use]
    pub fn autosync_interval(&self) -> Duration {
        Duration::from_secs(self.sync.autosync_interval_secs)
    }

    /// Build sync options from this configuration.
    #[must_use]
    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            merge: MergeOptions {
                conflict_window: self.conflict_window(),
            },
            tombstone_retention: self.tombstone_retention(),
        }
    }
}
