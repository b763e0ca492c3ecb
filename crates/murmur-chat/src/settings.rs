//! CLI settings
//!
//! Settings come from an optional TOML file:
//!
//! ```toml
//! [room]
//! message_capacity = 200
//! sync_on_write = true
//!
//! [logging]
//! default_level = "info"
//!
//! [logging.file]
//! directory = "/var/log/murmur"
//! ```
//!
//! Room files live in `--data-dir` unless the file names explicit paths.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use murmur_logging::LogConfig;
use murmur_room::RoomConfig;
use serde::{Deserialize, Serialize};

/// Everything the CLI can be configured with
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub room: RoomSection,
    pub logging: LogConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            room: RoomSection::default(),
            logging: LogConfig {
                // Interactive use: only surface problems
                default_level: "warn".to_string(),
                ..LogConfig::default()
            },
        }
    }
}

/// Room overrides; unset fields fall back to the data directory defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RoomSection {
    pub message_log: Option<PathBuf>,
    pub directory_journal: Option<PathBuf>,
    pub message_capacity: Option<usize>,
    pub sender_capacity: Option<usize>,
    pub sync_on_write: Option<bool>,
}

impl Settings {
    /// Load settings from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&text)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Room configuration rooted at `data_dir`
    pub fn room_config(&self, data_dir: &Path) -> RoomConfig {
        let mut config = RoomConfig::with_data_dir(data_dir);
        let room = &self.room;
        if let Some(path) = &room.message_log {
            config.message_log = path.clone();
        }
        if let Some(path) = &room.directory_journal {
            config.directory_journal = path.clone();
        }
        if let Some(capacity) = room.message_capacity {
            config = config.with_message_capacity(capacity);
        }
        if let Some(capacity) = room.sender_capacity {
            config = config.with_sender_capacity(capacity);
        }
        if let Some(sync) = room.sync_on_write {
            config = config.with_sync_on_write(sync);
        }
        config
    }
}

/// Expand a leading `~/` to the home directory
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(rest);
    }
    PathBuf::from(path)
}
