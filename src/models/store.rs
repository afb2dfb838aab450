use crate::config::Config;
use crate::error::Result;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

const FILE_PREFIX: &str = "ggml-";
const FILE_EXTENSION: &str = ".bin";

/// Information about an installed model file
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct InstalledModel {
    pub name: String,
    pub size_bytes: u64,
    pub size: String,
    pub path: PathBuf,
    pub modified: Option<String>,
}

/// Filesystem view of installed models
///
/// Holds no state besides the directory path: every query re-reads the
/// disk, so results always match what is currently installed.
#[derive(Debug, Clone)]
pub struct ModelStore {
    models_dir: PathBuf,
}

impl ModelStore {
    #[must_use]
    pub fn new(models_dir: impl Into<PathBuf>) -> Self {
        Self {
            models_dir: models_dir.into(),
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(config.models_dir()?))
    }

    #[must_use]
    pub fn models_dir(&self) -> &Path {
        &self.models_dir
    }

    /// Get path where the model file is stored
    #[must_use]
    pub fn model_path(&self, model_name: &str) -> PathBuf {
        self.models_dir
            .join(format!("{FILE_PREFIX}{model_name}{FILE_EXTENSION}"))
    }

    #[must_use]
    pub fn is_installed(&self, model_name: &str) -> bool {
        self.model_path(model_name).exists()
    }

    /// Size of the model file in bytes, `None` if absent
    #[must_use]
    pub fn size_of(&self, model_name: &str) -> Option<u64> {
        fs::metadata(self.model_path(model_name))
            .ok()
            .map(|m| m.len())
    }

    /// Scan the models directory for `ggml-<name>.bin` files
    pub fn list_installed(&self) -> Result<BTreeSet<String>> {
        let entries = match fs::read_dir(&self.models_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(BTreeSet::new()),
            Err(e) => return Err(e.into()),
        };

        let mut names = BTreeSet::new();
        for entry in entries.flatten() {
            if !entry.file_type().is_ok_and(|t| t.is_file()) {
                continue;
            }
            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                continue;
            };
            if let Some(name) = file_name
                .strip_prefix(FILE_PREFIX)
                .and_then(|rest| rest.strip_suffix(FILE_EXTENSION))
            {
                if !name.is_empty() {
                    names.insert(name.to_string());
                }
            }
        }

        Ok(names)
    }

    /// Installed models with size, path and modification time
    pub fn installed_models(&self) -> Result<Vec<InstalledModel>> {
        let names = self.list_installed()?;
        Ok(names
            .into_iter()
            .filter_map(|name| self.installed_model(&name))
            .collect())
    }

    /// Record for a single installed model, `None` if the file is missing
    #[must_use]
    pub fn installed_model(&self, model_name: &str) -> Option<InstalledModel> {
        let path = self.model_path(model_name);
        let metadata = fs::metadata(&path).ok()?;
        let modified = metadata
            .modified()
            .ok()
            .map(|t| chrono::DateTime::<chrono::Utc>::from(t).to_rfc3339());

        Some(InstalledModel {
            name: model_name.to_string(),
            size_bytes: metadata.len(),
            size: format_size(metadata.len()),
            path,
            modified,
        })
    }

    /// Remove an installed model file
    ///
    /// Returns `false` when there was nothing to remove.
    pub fn delete(&self, model_name: &str) -> Result<bool> {
        let path = self.model_path(model_name);
        match fs::remove_file(&path) {
            Ok(()) => {
                tracing::info!("Deleted model {model_name} ({})", path.display());
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

/// Format bytes as a human-readable string using 1024-based units
///
/// Values are rounded to two decimals and trailing zeros are dropped,
/// so 1536 formats as `1.5 KB` and 1 GiB as `1 GB`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];

    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    let rounded = (value * 100.0).round() / 100.0;
    format!("{rounded} {}", UNITS[unit])
}
