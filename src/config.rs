//! Configuration management.
//!
//! Loaded from a TOML file; every field has a default so a missing file
//! just means defaults. Core components never read this ambiently — the
//! relevant pieces are passed into constructors.

use crate::pds::Session;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub pds: PdsConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub backup: BackupConfig,

    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PdsConfig {
    /// PDS service URL
    #[serde(default = "default_service_url")]
    pub service_url: String,

    /// Persisted session from the last login
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<Session>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Storage service URL
    #[serde(default = "default_storage_url")]
    pub service_url: String,

    /// Bearer token for the storage service
    #[serde(default)]
    pub token: String,

    /// Default space (DID or name) to upload into; prompts when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub space: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackupConfig {
    /// Backup root directory (default: ~/bsky-backup)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_service_url() -> String {
    crate::pds::DEFAULT_SERVICE_URL.to_string()
}

fn default_storage_url() -> String {
    "https://up.storacha.network".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for PdsConfig {
    fn default() -> Self {
        Self {
            service_url: default_service_url(),
            session: None,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            service_url: default_storage_url(),
            token: String::new(),
            space: None,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl BackupConfig {
    /// Backup root: configured path, or `~/bsky-backup`.
    pub fn root_dir(&self) -> PathBuf {
        if let Some(root) = &self.root {
            return root.clone();
        }
        directories::UserDirs::new()
            .map(|dirs| dirs.home_dir().join("bsky-backup"))
            .unwrap_or_else(|| PathBuf::from("bsky-backup"))
    }
}

impl Config {
    /// Default config file location (`~/.config/bsky-backup/config.toml` on Linux).
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "bsky-backup")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load from the given path, or the default location, falling back to
    /// defaults when no file exists yet.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::from_file(&path),
                _ => Ok(Config::default()),
            },
        }
    }

    /// Persist the configuration (session state, chosen options).
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
