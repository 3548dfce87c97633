//! Application configuration storage
//!
//! Settings live in `config.json` inside the data directory. A missing
//! file gives the defaults, and so does each missing field.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::constants::{paths, service, SNAPSHOT_KEY};

/// Full application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Base URL of the execution service
    #[serde(default = "default_service_url")]
    pub service_url: String,
    /// Timeout for one request to the service
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Where local snapshots are kept (default: `<data_dir>/snapshots`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot_dir: Option<PathBuf>,
    /// Snapshot slot used by `save` and `restore`
    #[serde(default = "default_snapshot_key")]
    pub snapshot_key: String,
    /// Run without the simulator viewer unless asked otherwise
    #[serde(default = "default_headless")]
    pub headless: bool,
}

fn default_service_url() -> String {
    service::URL.to_string()
}

fn default_request_timeout() -> u64 {
    service::REQUEST_TIMEOUT_SECS
}

fn default_snapshot_key() -> String {
    SNAPSHOT_KEY.to_string()
}

fn default_headless() -> bool {
    true
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            service_url: default_service_url(),
            request_timeout_secs: default_request_timeout(),
            snapshot_dir: None,
            snapshot_key: default_snapshot_key(),
            headless: default_headless(),
        }
    }
}

impl AppConfig {
    /// Load configuration from disk
    pub async fn load(data_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = data_dir.join(paths::CONFIG_FILE);

        if !config_path.exists() {
            log::debug!("No config at {:?}, using defaults", config_path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&config_path).await?;
        serde_json::from_str(&contents).map_err(ConfigError::Parse)
    }

    /// Save configuration to disk
    pub async fn save(&self, data_dir: &Path) -> Result<(), ConfigError> {
        fs::create_dir_all(data_dir).await?;

        let config_path = data_dir.join(paths::CONFIG_FILE);
        let contents = serde_json::to_string_pretty(self).map_err(ConfigError::Serialize)?;
        fs::write(&config_path, contents).await?;

        log::info!("Configuration saved to {:?}", config_path);
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Snapshot directory, resolved against the data directory
    pub fn snapshot_dir(&self, data_dir: &Path) -> PathBuf {
        match &self.snapshot_dir {
            Some(dir) if dir.is_absolute() => dir.clone(),
            Some(dir) => data_dir.join(dir),
            None => data_dir.join(paths::SNAPSHOT_DIR),
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(serde_json::Error),
    #[error("Failed to serialize config: {0}")]
    Serialize(serde_json::Error),
}
