//! Import configuration file handling
//!
//! Loads ~/.config/jira-import/config.yaml. Every field has a default, so a
//! missing file is equivalent to an empty one.

use crate::integrations::retry::RetryConfig;
use crate::store::StoreConfig;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Backoff settings for transient API failures
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrySettings {
    /// Retries after the first attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    #[serde(default = "default_jitter")]
    pub jitter: bool,
}

fn default_max_retries() -> u32 {
    4
}

fn default_initial_delay_ms() -> u64 {
    10_000
}

fn default_max_delay_ms() -> u64 {
    30_000
}

fn default_jitter() -> bool {
    true
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            jitter: default_jitter(),
        }
    }
}

impl RetrySettings {
    pub fn to_retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_retries: self.max_retries,
            initial_backoff: Duration::from_millis(self.initial_delay_ms),
            max_backoff: Duration::from_millis(self.max_delay_ms),
            multiplier: 2.0,
            jitter: self.jitter,
        }
    }
}

/// Importer configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportConfig {
    /// SQLite database file
    #[serde(default = "crate::store::default_database_path")]
    pub database: PathBuf,

    /// Records requested per page (`maxResults`)
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Rows per write transaction
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Page requests allowed in flight at once
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    #[serde(default)]
    pub retry: RetrySettings,
}

fn default_page_size() -> u32 {
    50
}

fn default_batch_size() -> usize {
    50
}

fn default_max_concurrent() -> usize {
    1
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            database: crate::store::default_database_path(),
            page_size: default_page_size(),
            batch_size: default_batch_size(),
            max_concurrent: default_max_concurrent(),
            retry: RetrySettings::default(),
        }
    }
}

impl ImportConfig {
    /// Load from the default path, falling back to defaults if it is absent
    pub fn load_default() -> Result<Self> {
        let path = Self::default_path();
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }
        Self::load(&path)
    }

    /// Load configuration from a specific path
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(crate::ImportError::Config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }

        tracing::info!(path = %path.display(), "Loading import configuration");

        let content = fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;

        tracing::debug!(
            database = %config.database.display(),
            page_size = config.page_size,
            batch_size = config.batch_size,
            "Configuration loaded successfully"
        );

        Ok(config)
    }

    /// Save configuration to a specific path
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        tracing::info!(path = %path.display(), "Saving import configuration");

        let yaml = serde_yaml::to_string(self)?;
        fs::write(path, yaml)?;

        Ok(())
    }

    /// Get the default config path (~/.config/jira-import/config.yaml)
    pub fn default_path() -> PathBuf {
        let mut path = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push(".config");
        path.push("jira-import");
        path.push("config.yaml");
        path
    }

    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            path: self.database.clone(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = ImportConfig::default();
        assert_eq!(config.page_size, 50);
        assert_eq!(config.batch_size, 50);
        assert_eq!(config.max_concurrent, 1);
        assert_eq!(config.retry.max_retries, 4);

        let retry = config.retry.to_retry_config();
        assert_eq!(retry.initial_backoff, Duration::from_secs(10));
        assert_eq!(retry.max_backoff, Duration::from_secs(30));
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.yaml");
        fs::write(&path, "page_size: 100\nretry:\n  max_retries: 2\n").unwrap();

        let config = ImportConfig::load(&path).unwrap();
        assert_eq!(config.page_size, 100);
        assert_eq!(config.batch_size, 50);
        assert_eq!(config.retry.max_retries, 2);
        assert_eq!(config.retry.initial_delay_ms, 10_000);
    }

    #[test]
    fn test_save_and_reload() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("config.yaml");

        let config = ImportConfig {
            database: temp_dir.path().join("import.db"),
            max_concurrent: 3,
            ..Default::default()
        };
        config.save(&path).unwrap();

        assert_eq!(ImportConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_missing_file_is_error() {
        let temp_dir = TempDir::new().unwrap();
        let err = ImportConfig::load(temp_dir.path().join("absent.yaml")).unwrap_err();
        assert!(err.to_string().contains("Config file not found"));
    }
}
