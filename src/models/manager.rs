use crate::config::Config;
use crate::error::{Result, VaultError};
use crate::models::download::{DownloadStatus, EventSender, ModelDownloader};
use crate::models::fetch::{self, FetchProgram};
use crate::models::registry::ModelInfo;
use crate::models::store::{format_size, InstalledModel, ModelStore};
use crate::response::Response;
use serde::Serialize;
use std::path::PathBuf;

/// Catalog entry combined with its on-disk state
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ModelStatus {
    pub info: &'static ModelInfo,
    pub installed: bool,
    pub path: PathBuf,
    pub size_bytes: Option<u64>,
    pub size: Option<String>,
}

/// Model manager for listing, installing and removing models
#[derive(Debug)]
pub struct ModelManager {
    downloader: ModelDownloader,
}

impl ModelManager {
    /// Create a manager using the fetch script for the host platform
    pub fn new(config: &Config) -> Result<Self> {
        Self::with_fetch_program(config, fetch::detect())
    }

    /// Create a manager with an explicit fetch program
    pub fn with_fetch_program(config: &Config, program: Box<dyn FetchProgram>) -> Result<Self> {
        config.validate()?;
        let store = ModelStore::from_config(config)?;
        tracing::debug!("Models directory: {}", store.models_dir().display());

        Ok(Self {
            downloader: ModelDownloader::with_program(store, config.download.clone(), program),
        })
    }

    #[must_use]
    pub const fn store(&self) -> &ModelStore {
        self.downloader.store()
    }

    /// All catalog entries in display order
    #[must_use]
    pub fn list_catalog(&self) -> Response<&'static [ModelInfo]> {
        Response::Ok(ModelInfo::all())
    }

    /// Installed models with size and path
    #[must_use]
    pub fn list_installed(&self) -> Response<Vec<InstalledModel>> {
        self.store().installed_models().into()
    }

    /// Catalog entry, install status, size and path for `name`
    #[must_use]
    pub fn get_info(&self, name: &str) -> Response<ModelStatus> {
        lookup(name).map(|info| self.status(info)).into()
    }

    /// Download `name`, reporting progress on `events`
    pub async fn download(&self, name: &str, events: &EventSender) -> Response<DownloadStatus> {
        let info = match lookup(name) {
            Ok(info) => info,
            Err(e) => return e.into(),
        };

        match self.downloader.download(info, events).await {
            Ok(DownloadStatus::AlreadyInstalled) => {
                Response::unchanged(format!("Model {name} is already installed"))
            }
            other => other.into(),
        }
    }

    /// Delete the model file for `name`
    #[must_use]
    pub fn delete(&self, name: &str) -> Response<String> {
        let info = match lookup(name) {
            Ok(info) => info,
            Err(e) => return e.into(),
        };

        if !self.store().is_installed(info.name) {
            tracing::info!("Model {name} is not installed, nothing to delete");
            return Response::unchanged(format!("Model {name} is not installed"));
        }

        match self.store().delete(info.name) {
            Ok(true) => Response::Ok(format!("Model {name} deleted successfully")),
            // Removed by someone else between the check and the delete
            Ok(false) => Response::unchanged(format!("Model {name} is not installed")),
            Err(e) => {
                tracing::error!("Failed to delete model {name}: {e}");
                e.into()
            }
        }
    }

    fn status(&self, info: &'static ModelInfo) -> ModelStatus {
        let store = self.store();
        let size_bytes = store.size_of(info.name);
        ModelStatus {
            info,
            installed: size_bytes.is_some(),
            path: store.model_path(info.name),
            size_bytes,
            size: size_bytes.map(format_size),
        }
    }
}

/// Validate a model name against the catalog
fn lookup(name: &str) -> Result<&'static ModelInfo> {
    ModelInfo::find(name).ok_or_else(|| VaultError::UnknownModel {
        name: name.to_string(),
        suggestion: ModelInfo::suggest(name),
    })
}
