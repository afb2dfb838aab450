#![allow(clippy::multiple_crate_versions)]

pub mod config;
pub mod error;
pub mod models;
pub mod response;

pub use error::{ErrorKind, Result, VaultError};
pub use models::{DownloadEvent, DownloadStatus, ModelInfo, ModelManager};
pub use response::Response;
