//! Configuration module for whisper-vault
//!
//! Loads config from `$XDG_CONFIG_HOME/whisper-vault/config.toml` or the
//! platform config directory. Falls back to defaults if the file doesn't exist.
//! Partial configs are merged with defaults using serde's default attributes.
//!
//! # Example
//!
//! ```no_run
//! use whisper_vault::config::Config;
//!
//! let config = Config::load().expect("Failed to load config");
//! println!("Max attempts: {}", config.download.max_attempts);
//! println!("Models dir: {}", config.models_dir().unwrap().display());
//! ```

pub mod schema;

pub use schema::{Config, DownloadConfig, StorageConfig, MODELS_SUBDIR};
