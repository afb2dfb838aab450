#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tokio::sync::mpsc;
use whisper_vault::config::{Config, DownloadConfig, MODELS_SUBDIR};
use whisper_vault::DownloadEvent;

/// Temporary base directory with a `whisper.cpp/models` tree
pub struct Sandbox {
    pub temp_dir: TempDir,
}

impl Sandbox {
    /// Base directory without a models directory
    pub fn empty() -> Self {
        Self {
            temp_dir: TempDir::new().expect("Failed to create temp dir"),
        }
    }

    /// Models directory containing a fake fetch script with `body`
    pub fn with_script(body: &str) -> Self {
        let sandbox = Self::empty();
        fs::create_dir_all(sandbox.models_dir()).unwrap();
        sandbox.write_script(body);
        sandbox
    }

    pub fn base_dir(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn models_dir(&self) -> PathBuf {
        self.base_dir().join(MODELS_SUBDIR)
    }

    pub fn write_script(&self, body: &str) {
        let script = format!("set -u\necho run >> spawns.log\n{body}\n");
        fs::write(self.models_dir().join("download-ggml-model.sh"), script).unwrap();
    }

    /// Number of times the fetch script has been started
    pub fn spawn_count(&self) -> usize {
        fs::read_to_string(self.models_dir().join("spawns.log"))
            .map(|s| s.lines().count())
            .unwrap_or(0)
    }

    pub fn config(&self, max_attempts: u32, timeout_secs: u64) -> Config {
        let mut config = Config::default();
        config.storage.base_dir = Some(self.base_dir().to_path_buf());
        config.download = DownloadConfig {
            max_attempts,
            timeout_secs,
            retry_delay_secs: 0,
            terminate_grace_secs: 1,
        };
        config
    }
}

/// Drain everything sent so far
pub fn collect(rx: &mut mpsc::UnboundedReceiver<DownloadEvent>) -> Vec<DownloadEvent> {
    std::iter::from_fn(|| rx.try_recv().ok()).collect()
}

pub fn progress_percents(events: &[DownloadEvent]) -> Vec<u8> {
    events
        .iter()
        .filter_map(|e| match e {
            DownloadEvent::Progress { percent, .. } => Some(*percent),
            _ => None,
        })
        .collect()
}

pub fn error_lines(events: &[DownloadEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            DownloadEvent::Error { error, .. } => Some(error.clone()),
            _ => None,
        })
        .collect()
}

pub fn log_lines(events: &[DownloadEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            DownloadEvent::Log { log, .. } => Some(log.clone()),
            _ => None,
        })
        .collect()
}

/// `(success, exit_code)` of the final event, asserting it is a completion
pub fn completion(events: &[DownloadEvent]) -> (bool, i32) {
    match events.last() {
        Some(DownloadEvent::Completion {
            success, exit_code, ..
        }) => (*success, *exit_code),
        other => panic!("Expected completion as last event, got {other:?}"),
    }
}
