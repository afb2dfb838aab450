use crate::error::{Result, VaultError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Relative location of the models directory under the base directory
pub const MODELS_SUBDIR: &str = "whisper.cpp/models";

/// Main configuration structure
#[derive(Deserialize, Serialize, Clone, Debug, Default)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub download: DownloadConfig,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default)]
pub struct StorageConfig {
    /// Base directory; the current working directory when unset
    pub base_dir: Option<PathBuf>,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct DownloadConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,
    #[serde(default = "default_terminate_grace_secs")]
    pub terminate_grace_secs: u64,
}

// Default value functions
fn default_max_attempts() -> u32 {
    3
}
fn default_timeout_secs() -> u64 {
    600
}
fn default_retry_delay_secs() -> u64 {
    3
}
fn default_terminate_grace_secs() -> u64 {
    5
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            timeout_secs: default_timeout_secs(),
            retry_delay_secs: default_retry_delay_secs(),
            terminate_grace_secs: default_terminate_grace_secs(),
        }
    }
}

impl DownloadConfig {
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    #[must_use]
    pub const fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }

    #[must_use]
    pub const fn terminate_grace(&self) -> Duration {
        Duration::from_secs(self.terminate_grace_secs)
    }
}

impl Config {
    /// Load config from the default location, falling back to defaults
    pub fn load() -> Result<Self> {
        Self::load_from(&config_path()?)
    }

    /// Load config from an explicit path; a missing file yields defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content).map_err(|e| {
            VaultError::Config(format!("Failed to parse {}: {e}", path.display()))
        })?;
        config.validate()?;

        tracing::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Reject values the downloader cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.download.max_attempts == 0 {
            return Err(VaultError::Config(
                "download.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.download.timeout_secs == 0 {
            return Err(VaultError::Config(
                "download.timeout_secs must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Base directory, resolved against the current directory when unset
    pub fn base_dir(&self) -> Result<PathBuf> {
        match &self.storage.base_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(std::env::current_dir()?),
        }
    }

    /// Directory holding the `ggml-*.bin` files and the fetch script
    pub fn models_dir(&self) -> Result<PathBuf> {
        Ok(self.base_dir()?.join(MODELS_SUBDIR))
    }
}

/// Get config file path
pub fn config_path() -> Result<PathBuf> {
    let config_dir = if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
        PathBuf::from(xdg_config)
    } else {
        dirs::config_dir()
            .ok_or_else(|| VaultError::Config("Could not determine config directory".to_string()))?
    };

    Ok(config_dir.join("whisper-vault").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.download.max_attempts, 3);
        assert_eq!(config.download.timeout(), Duration::from_secs(600));
        assert_eq!(config.download.retry_delay(), Duration::from_secs(3));
        assert!(config.storage.base_dir.is_none());
    }

    #[test]
    fn test_partial_config_merges_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(&path, "[download]\nmax_attempts = 5\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.download.max_attempts, 5);
        assert_eq!(config.download.timeout_secs, 600);
        assert_eq!(config.download.retry_delay_secs, 3);
        assert!(config.storage.base_dir.is_none());
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config = Config::load_from(&temp_dir.path().join("nope.toml")).unwrap();
        assert_eq!(config.download.max_attempts, 3);
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(&path, "[download]\nmax_attempts = 0\n").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("max_attempts"));
    }

    #[test]
    fn test_malformed_toml_is_config_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        fs::write(&path, "[download\nmax_attempts = ").unwrap();

        assert!(matches!(
            Config::load_from(&path),
            Err(VaultError::Config(_))
        ));
    }

    #[test]
    fn test_models_dir_joins_subdir() {
        let mut config = Config::default();
        config.storage.base_dir = Some(PathBuf::from("/opt/app"));
        assert_eq!(
            config.models_dir().unwrap(),
            PathBuf::from("/opt/app/whisper.cpp/models")
        );
    }

    #[test]
    #[serial]
    fn test_config_path_honours_xdg() {
        let original = std::env::var("XDG_CONFIG_HOME").ok();
        std::env::set_var("XDG_CONFIG_HOME", "/tmp/xdg-test");

        let path = config_path().unwrap();
        assert_eq!(path, PathBuf::from("/tmp/xdg-test/whisper-vault/config.toml"));

        match original {
            Some(v) => std::env::set_var("XDG_CONFIG_HOME", v),
            None => std::env::remove_var("XDG_CONFIG_HOME"),
        }
    }

    #[test]
    #[serial]
    fn test_load_reads_xdg_config() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("whisper-vault");
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join("config.toml"),
            "[storage]\nbase_dir = \"/srv/models\"\n",
        )
        .unwrap();

        let original = std::env::var("XDG_CONFIG_HOME").ok();
        std::env::set_var("XDG_CONFIG_HOME", temp_dir.path());

        let config = Config::load().unwrap();
        assert_eq!(config.storage.base_dir, Some(PathBuf::from("/srv/models")));

        match original {
            Some(v) => std::env::set_var("XDG_CONFIG_HOME", v),
            None => std::env::remove_var("XDG_CONFIG_HOME"),
        }
    }
}
