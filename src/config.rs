use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct SegmentatorConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub report: ReportConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub log_level: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub db_path: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ReportConfig {
    /// Directory report files are written to.
    pub storage_dir: String,
    pub file_prefix: String,
    pub file_ext: String,
    /// Prefix of the URL a client fetches reports from.
    pub base_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let db_path = default_segmentator_dir()
            .join("segments.db")
            .to_string_lossy()
            .into_owned();
        Self { db_path }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        let storage_dir = default_segmentator_dir()
            .join("reports")
            .to_string_lossy()
            .into_owned();
        Self {
            storage_dir,
            file_prefix: "report_".into(),
            file_ext: ".csv".into(),
            base_url: "http://localhost:8000/reports".into(),
        }
    }
}

impl ReportConfig {
    pub fn resolved_storage_dir(&self) -> PathBuf {
        expand_tilde(&self.storage_dir)
    }
}

/// Returns `~/.segmentator/`, or `./.segmentator` when no home directory is known.
pub fn default_segmentator_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".segmentator")
}

/// Returns the default config file path: `~/.segmentator/config.toml`
pub fn default_config_path() -> PathBuf {
    default_segmentator_dir().join("config.toml")
}

impl SegmentatorConfig {
    /// Load config from TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            SegmentatorConfig::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides
    /// (SEGMENTATOR_DB, SEGMENTATOR_REPORT_DIR, SEGMENTATOR_LOG_LEVEL).
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("SEGMENTATOR_DB") {
            self.storage.db_path = val;
        }
        if let Ok(val) = std::env::var("SEGMENTATOR_REPORT_DIR") {
            self.report.storage_dir = val;
        }
        if let Ok(val) = std::env::var("SEGMENTATOR_LOG_LEVEL") {
            self.server.log_level = val;
        }
    }

    /// Resolve the database path, expanding `~` if needed.
    pub fn resolved_db_path(&self) -> PathBuf {
        expand_tilde(&self.storage.db_path)
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}
