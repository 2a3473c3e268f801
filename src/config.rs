//! Persisted configuration record.
//!
//! The record holds the destination root and the date of the last cleanup
//! pass. It is stored as JSON:
//!
//! ```json
//! {
//!   "destination_directory": "/home/me/Archive",
//!   "last_cleanup_date": "2024-03-15T09:30:00+01:00"
//! }
//! ```
//!
//! An empty `destination_directory` means the destination was never set up.
//! Operations take the record by `&mut`, change it, and persist it through a
//! [`ConfigStore`] before they report success.

use chrono::{DateTime, FixedOffset, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File name of the record inside the home directory.
pub const CONFIG_FILE_NAME: &str = ".deskbroom.json";

/// Errors while locating, reading or writing configuration files.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not determine the home directory")]
    NoHomeDirectory,

    #[error("failed to read configuration {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("invalid configuration {}: {reason}", path.display())]
    Invalid { path: PathBuf, reason: String },

    #[error("failed to serialize configuration: {0}")]
    Serialize(String),

    #[error("failed to write configuration {}: {source}", path.display())]
    Write { path: PathBuf, source: io::Error },
}

/// The persisted record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Root of the archive. Empty when not configured yet.
    #[serde(default)]
    pub destination_directory: PathBuf,

    /// When the last cleanup pass completed.
    #[serde(default)]
    pub last_cleanup_date: Option<DateTime<FixedOffset>>,
}

impl Config {
    /// Returns the destination root, or `None` while it is unset.
    pub fn destination_root(&self) -> Option<&Path> {
        if self.destination_directory.as_os_str().is_empty() {
            None
        } else {
            Some(&self.destination_directory)
        }
    }

    /// Calendar day of the last cleanup, in the local timezone.
    pub fn last_cleanup_day(&self) -> Option<NaiveDate> {
        self.last_cleanup_date
            .map(|date| date.with_timezone(&Local).date_naive())
    }

    /// Records a completed cleanup at `now`.
    pub fn stamp_cleanup(&mut self, now: DateTime<Local>) {
        self.last_cleanup_date = Some(now.fixed_offset());
    }
}

/// Load/save access to the configuration record.
pub trait ConfigStore {
    /// Loads the record; a missing record yields the default one.
    fn load(&self) -> Result<Config, ConfigError>;

    /// Persists the record, replacing whatever was stored.
    fn save(&self, config: &Config) -> Result<(), ConfigError>;
}

/// Stores the record as a JSON file.
#[derive(Debug, Clone)]
pub struct JsonConfigStore {
    path: PathBuf,
}

impl JsonConfigStore {
    /// Creates a store backed by `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Creates a store at `~/.deskbroom.json`.
    pub fn in_home() -> Result<Self, ConfigError> {
        let home = dirs::home_dir().ok_or(ConfigError::NoHomeDirectory)?;
        Ok(Self::new(home.join(CONFIG_FILE_NAME)))
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl ConfigStore for JsonConfigStore {
    fn load(&self) -> Result<Config, ConfigError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "no configuration yet, using defaults");
                return Ok(Config::default());
            }
            Err(e) => {
                return Err(ConfigError::Read {
                    path: self.path.clone(),
                    source: e,
                });
            }
        };

        serde_json::from_str(&content).map_err(|e| ConfigError::Invalid {
            path: self.path.clone(),
            reason: e.to_string(),
        })
    }

    fn save(&self, config: &Config) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(config)
            .map_err(|e| ConfigError::Serialize(e.to_string()))?;

        // Write next to the target and rename over it so readers never see a
        // truncated record.
        let temp = self.temp_path();
        fs::write(&temp, json).map_err(|e| ConfigError::Write {
            path: temp.clone(),
            source: e,
        })?;
        fs::rename(&temp, &self.path).map_err(|e| ConfigError::Write {
            path: self.path.clone(),
            source: e,
        })?;

        tracing::debug!(path = %self.path.display(), "configuration saved");
        Ok(())
    }
}
