pub mod download;
pub mod fetch;
pub mod manager;
pub mod progress;
pub mod registry;
pub mod store;

pub use download::{DownloadEvent, DownloadStatus, EventSender, ModelDownloader};
pub use fetch::{FetchProgram, PosixFetch, WindowsFetch};
pub use manager::{ModelManager, ModelStatus};
pub use registry::ModelInfo;
pub use store::{format_size, InstalledModel, ModelStore};
