use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for whisper-vault
#[derive(Error, Debug)]
pub enum VaultError {
    #[error("Unknown model '{name}'{}\n\nTroubleshooting:\n- List available models: whisper-vault list\n- Model names are case-sensitive (e.g. base.en, large-v3-turbo)", did_you_mean(.suggestion))]
    UnknownModel {
        name: String,
        suggestion: Option<&'static str>,
    },

    #[error("Environment not ready: {0}\n\nTroubleshooting:\n- Check storage.base_dir in ~/.config/whisper-vault/config.toml\n- The models directory must contain the whisper.cpp download script\n- Run with RUST_LOG=debug for more details")]
    Environment(String),

    #[error("Failed to download model '{model}' after {attempts} attempt(s): {reason}\n\nTroubleshooting:\n- Check internet connection\n- Re-run the download; partial files are resumed by the fetch script\n- Try increasing download.timeout_secs in config")]
    DownloadFailed {
        model: String,
        attempts: u32,
        reason: String,
    },

    #[error("Config error: {0}\n\nTroubleshooting:\n- Check config file: ~/.config/whisper-vault/config.toml\n- Run with RUST_LOG=debug for more details")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

/// Coarse error class reported to callers of the facade
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    UnknownModel,
    Environment,
    Download,
    Config,
    Io,
}

impl VaultError {
    /// Classify this error for the response envelope
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::UnknownModel { .. } => ErrorKind::UnknownModel,
            Self::Environment(_) => ErrorKind::Environment,
            Self::DownloadFailed { .. } => ErrorKind::Download,
            Self::Config(_) => ErrorKind::Config,
            Self::Io(_) | Self::Other(_) => ErrorKind::Io,
        }
    }
}

fn did_you_mean(suggestion: &Option<&'static str>) -> String {
    suggestion.map_or_else(String::new, |s| format!(". Did you mean '{s}'?"))
}

pub type Result<T> = std::result::Result<T, VaultError>;
