use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::StoreError;

/// Lowest accepted reminder poll period.
pub const MIN_POLL_INTERVAL_SECS: u64 = 5;

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("~/.local/share"))
        .join("nudge")
}

fn default_poll_interval() -> u64 {
    60
}

fn default_estimate() -> i64 {
    30
}

fn default_delay() -> i64 {
    15
}

fn default_advisor_timeout() -> u64 {
    15
}

fn default_true() -> bool {
    true
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct EngineConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_estimate")]
    pub default_estimate_minutes: i64,
    #[serde(default = "default_delay")]
    pub default_delay_minutes: i64,
    /// Endpoint of the mood advisor. Without it only local rules apply.
    #[serde(default)]
    pub advisor_url: Option<String>,
    #[serde(default = "default_advisor_timeout")]
    pub advisor_timeout_secs: u64,
    #[serde(default)]
    pub debug_logging: bool,
    #[serde(default = "default_true")]
    pub desktop_notifications: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            poll_interval_secs: default_poll_interval(),
            default_estimate_minutes: default_estimate(),
            default_delay_minutes: default_delay(),
            advisor_url: None,
            advisor_timeout_secs: default_advisor_timeout(),
            debug_logging: false,
            desktop_notifications: true,
        }
    }
}

impl EngineConfig {
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("nudge")
            .join("config.json")
    }

    /// Read the config file; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        match std::fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).map_err(|source| StoreError::Json {
                path: path.to_path_buf(),
                source,
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(StoreError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(self).map_err(|source| StoreError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        std::fs::write(path, json).map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn tasks_path(&self) -> PathBuf {
        self.data_dir.join("tasks.json")
    }

    /// Ensure the data directory exists.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.data_dir)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(MIN_POLL_INTERVAL_SECS))
    }

    pub fn advisor_timeout(&self) -> Duration {
        Duration::from_secs(self.advisor_timeout_secs.max(1))
    }
}
