use crate::config::DownloadConfig;
use crate::error::{Result, VaultError};
use crate::models::fetch::{self, FetchProgram};
use crate::models::progress::{classify, LineKind, LineSplitter, ProgressTracker, StreamKind};
use crate::models::registry::ModelInfo;
use crate::models::store::{format_size, ModelStore};
use serde::Serialize;
use std::collections::VecDeque;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Child;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep, sleep_until, timeout_at, Instant};

/// How long to keep reading buffered output after the script exits
const OUTPUT_DRAIN_GRACE: Duration = Duration::from_secs(2);

/// Lines of output kept per attempt for failure reports
const OUTPUT_TAIL_LINES: usize = 20;

/// Notification emitted while a download runs
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DownloadEvent {
    Progress {
        model: String,
        percent: u8,
        log: String,
    },
    Log {
        model: String,
        log: String,
    },
    Error {
        model: String,
        error: String,
    },
    /// Always the last event of a download call
    Completion {
        model: String,
        success: bool,
        exit_code: i32,
        log: String,
    },
}

pub type EventSender = mpsc::UnboundedSender<DownloadEvent>;

/// Successful result of a download call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DownloadStatus {
    AlreadyInstalled,
    Downloaded { attempts: u32 },
}

/// Why a single attempt did not produce the model file
#[derive(Error, Debug)]
pub enum AttemptError {
    #[error("failed to start fetch script: {source}. {hint}")]
    Spawn {
        #[source]
        source: std::io::Error,
        hint: String,
    },

    #[error("fetch script exited with code {code}")]
    Exit { code: i32 },

    #[error("fetch script was terminated by a signal")]
    Signaled,

    #[error("fetch script timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("fetch script reported success but the model file is missing")]
    NotInstalled,

    #[error("failed to wait for fetch script: {0}")]
    Wait(#[source] std::io::Error),
}

/// State of one spawn-to-exit run of the fetch script
struct DownloadAttempt<'a> {
    model: &'a str,
    number: u32,
    tracker: ProgressTracker,
    tail: VecDeque<String>,
    events: &'a EventSender,
}

impl<'a> DownloadAttempt<'a> {
    fn new(model: &'a str, number: u32, events: &'a EventSender) -> Self {
        Self {
            model,
            number,
            tracker: ProgressTracker::new(),
            tail: VecDeque::with_capacity(OUTPUT_TAIL_LINES),
            events,
        }
    }

    fn observe(&mut self, stream: StreamKind, line: String) {
        match classify(stream, &line) {
            LineKind::Progress(percent) => {
                if self.tracker.observe(percent) {
                    tracing::debug!(model = self.model, attempt = self.number, percent, "progress");
                    self.send(DownloadEvent::Progress {
                        model: self.model.to_string(),
                        percent,
                        log: line.clone(),
                    });
                }
            }
            LineKind::Problem => {
                tracing::warn!(model = self.model, attempt = self.number, "{line}");
                self.send(DownloadEvent::Error {
                    model: self.model.to_string(),
                    error: line.clone(),
                });
            }
            LineKind::Status => {
                tracing::info!(model = self.model, attempt = self.number, "{line}");
                self.send(DownloadEvent::Log {
                    model: self.model.to_string(),
                    log: line.clone(),
                });
            }
            LineKind::Noise => {
                tracing::debug!(model = self.model, ?stream, "{line}");
            }
        }

        if self.tail.len() == OUTPUT_TAIL_LINES {
            self.tail.pop_front();
        }
        self.tail.push_back(line);
    }

    fn send(&self, event: DownloadEvent) {
        // A listener that went away must not fail the download
        self.events.send(event).ok();
    }
}

/// Downloads models by supervising the platform fetch script
#[derive(Debug)]
pub struct ModelDownloader {
    store: ModelStore,
    config: DownloadConfig,
    program: Box<dyn FetchProgram>,
}

impl ModelDownloader {
    /// Create a downloader using the fetch script for the host platform
    #[must_use]
    pub fn new(store: ModelStore, config: DownloadConfig) -> Self {
        Self::with_program(store, config, fetch::detect())
    }

    #[must_use]
    pub fn with_program(
        store: ModelStore,
        config: DownloadConfig,
        program: Box<dyn FetchProgram>,
    ) -> Self {
        Self {
            store,
            config,
            program,
        }
    }

    #[must_use]
    pub const fn store(&self) -> &ModelStore {
        &self.store
    }

    #[must_use]
    pub const fn config(&self) -> &DownloadConfig {
        &self.config
    }

    /// Download `model` using the configured attempt budget
    pub async fn download(
        &self,
        model: &'static ModelInfo,
        events: &EventSender,
    ) -> Result<DownloadStatus> {
        self.download_with_attempts(model, self.config.max_attempts, events)
            .await
    }

    /// Download `model`, retrying up to `max_attempts` times
    ///
    /// Environment problems and `max_attempts == 0` fail immediately
    /// without spawning anything. Every call ends with exactly one
    /// `Completion` event.
    pub async fn download_with_attempts(
        &self,
        model: &'static ModelInfo,
        max_attempts: u32,
        events: &EventSender,
    ) -> Result<DownloadStatus> {
        let name = model.name;

        if max_attempts == 0 {
            complete(events, name, false, format!("Cannot download {name}: no attempts allowed"));
            return Err(VaultError::Config(
                "max_attempts must be at least 1".to_string(),
            ));
        }

        if let Err(e) = self.check_environment() {
            tracing::error!("Cannot download {name}: {e}");
            complete(events, name, false, format!("Cannot download {name}: environment not ready"));
            return Err(e);
        }

        if self.store.is_installed(name) {
            tracing::info!("Model {name} is already installed");
            complete(events, name, true, format!("Model {name} is already installed"));
            return Ok(DownloadStatus::AlreadyInstalled);
        }

        tracing::info!("Downloading model {name} ({}), up to {max_attempts} attempt(s)", model.size);

        let mut last_error = AttemptError::NotInstalled;
        for attempt in 1..=max_attempts {
            events
                .send(DownloadEvent::Log {
                    model: name.to_string(),
                    log: format!("Downloading model: {name} (attempt {attempt}/{max_attempts})"),
                })
                .ok();

            let outcome = self.run_attempt(name, attempt, events).await;

            // A zero exit code is only trusted once the file is on disk
            match outcome {
                Ok(()) if self.store.is_installed(name) => {
                    let size = self
                        .store
                        .size_of(name)
                        .map_or_else(|| "unknown size".to_string(), format_size);
                    tracing::info!("Downloaded model {name} ({size}) on attempt {attempt}");
                    complete(
                        events,
                        name,
                        true,
                        format!("Model {name} downloaded successfully ({size})"),
                    );
                    return Ok(DownloadStatus::Downloaded { attempts: attempt });
                }
                Ok(()) => last_error = AttemptError::NotInstalled,
                Err(e) => last_error = e,
            }

            tracing::warn!("Attempt {attempt}/{max_attempts} for {name} failed: {last_error}");
            events
                .send(DownloadEvent::Error {
                    model: name.to_string(),
                    error: format!("Attempt {attempt}/{max_attempts} failed: {last_error}"),
                })
                .ok();

            if attempt < max_attempts {
                // Resuming is up to the fetch script; we only report it
                if let Some(partial) = self.store.size_of(name) {
                    events
                        .send(DownloadEvent::Log {
                            model: name.to_string(),
                            log: format!(
                                "Partial download found ({}), next attempt will resume",
                                format_size(partial)
                            ),
                        })
                        .ok();
                }
                sleep(self.config.retry_delay()).await;
            }
        }

        tracing::error!("Giving up on {name} after {max_attempts} attempt(s): {last_error}");
        complete(
            events,
            name,
            false,
            format!("Failed to download model: {name} ({last_error})"),
        );
        Err(VaultError::DownloadFailed {
            model: name.to_string(),
            attempts: max_attempts,
            reason: last_error.to_string(),
        })
    }

    /// Models directory and fetch script must both exist
    fn check_environment(&self) -> Result<()> {
        let models_dir = self.store.models_dir();
        if !models_dir.is_dir() {
            return Err(VaultError::Environment(format!(
                "models directory {} does not exist",
                models_dir.display()
            )));
        }

        let script = fetch::script_path(self.program.as_ref(), models_dir);
        if !script.is_file() {
            return Err(VaultError::Environment(format!(
                "fetch script {} not found",
                script.display()
            )));
        }

        Ok(())
    }

    /// Spawn the fetch script once and supervise it until it exits or times out
    async fn run_attempt(
        &self,
        model: &str,
        number: u32,
        events: &EventSender,
    ) -> std::result::Result<(), AttemptError> {
        let mut cmd = self.program.command(model);
        cmd.current_dir(self.store.models_dir())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // The script's own children (curl, wget) join its group
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = cmd.spawn().map_err(|source| AttemptError::Spawn {
            source,
            hint: self.program.spawn_hint(),
        })?;
        let deadline = Instant::now() + self.config.timeout();
        #[cfg(unix)]
        let _group = ProcessGroup::of(&child);

        tracing::debug!(model, attempt = number, pid = ?child.id(), "Fetch script started");

        let (line_tx, mut line_rx) = mpsc::unbounded_channel();
        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(tokio::spawn(pump(stdout, StreamKind::Stdout, line_tx.clone())));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(tokio::spawn(pump(stderr, StreamKind::Stderr, line_tx.clone())));
        }
        drop(line_tx);

        let mut attempt = DownloadAttempt::new(model, number, events);

        let waited = loop {
            tokio::select! {
                Some((stream, line)) = line_rx.recv() => attempt.observe(stream, line),
                status = child.wait() => break Some(status),
                () = sleep_until(deadline) => break None,
            }
        };

        let result = match waited {
            Some(status) => {
                // Output written just before exit may still be in the pipes
                let drain_deadline = Instant::now() + OUTPUT_DRAIN_GRACE;
                while let Ok(Some((stream, line))) = timeout_at(drain_deadline, line_rx.recv()).await {
                    attempt.observe(stream, line);
                }
                status.map_err(AttemptError::Wait).and_then(exit_result)
            }
            None => {
                tracing::warn!(model, attempt = number, "Fetch script timed out, terminating");
                self.terminate(&mut child).await;
                Err(AttemptError::Timeout {
                    secs: self.config.timeout_secs,
                })
            }
        };

        abort_readers(readers);

        if result.is_err() {
            for line in &attempt.tail {
                tracing::debug!(model, attempt = number, "output: {line}");
            }
        }
        result
    }

    /// Ask the script and its children to stop, then kill whatever ignores the request
    async fn terminate(&self, child: &mut Child) {
        #[cfg(unix)]
        {
            use nix::sys::signal::Signal;

            if let Some(group) = ProcessGroup::of(child) {
                let pgid = group.0.as_raw();
                if group.signal(Signal::SIGTERM) {
                    let exited = tokio::time::timeout(self.config.terminate_grace(), child.wait())
                        .await
                        .is_ok();
                    if exited {
                        tracing::debug!(pgid, "Fetch script exited after SIGTERM");
                    } else {
                        tracing::warn!(pgid, "Fetch script ignored SIGTERM, killing");
                    }
                    // Children may outlive the script itself
                    group.signal(Signal::SIGKILL);
                    if exited {
                        return;
                    }
                }
            }
        }

        #[cfg(windows)]
        {
            if let Some(pid) = child.id() {
                let killed = tokio::process::Command::new("taskkill")
                    .args(["/pid", &pid.to_string(), "/t", "/f"])
                    .stdin(Stdio::null())
                    .stdout(Stdio::null())
                    .stderr(Stdio::null())
                    .status()
                    .await;
                match killed {
                    Ok(status) if status.success() => {
                        tracing::debug!(pid, "Fetch script tree killed with taskkill");
                    }
                    Ok(status) => tracing::warn!(pid, %status, "taskkill failed"),
                    Err(e) => tracing::warn!(pid, error = %e, "Failed to run taskkill"),
                }
            }
        }

        if let Err(e) = child.kill().await {
            tracing::warn!(error = %e, "Failed to kill fetch script");
        }
    }
}

/// Process group of a running fetch script
///
/// Dropping it kills any member still alive, so nothing the script
/// started keeps writing once the attempt is over.
#[cfg(unix)]
struct ProcessGroup(nix::unistd::Pid);

#[cfg(unix)]
impl ProcessGroup {
    fn of(child: &Child) -> Option<Self> {
        child
            .id()
            .and_then(|pid| i32::try_from(pid).ok())
            .map(|pid| Self(nix::unistd::Pid::from_raw(pid)))
    }

    /// Signal every member, returning false once the group is gone
    fn signal(&self, signal: nix::sys::signal::Signal) -> bool {
        use nix::errno::Errno;

        match nix::sys::signal::killpg(self.0, signal) {
            Ok(()) => true,
            Err(Errno::ESRCH) => false,
            Err(e) => {
                tracing::warn!(pgid = self.0.as_raw(), ?signal, error = %e, "Failed to signal process group");
                false
            }
        }
    }
}

#[cfg(unix)]
impl Drop for ProcessGroup {
    fn drop(&mut self) {
        if self.signal(nix::sys::signal::Signal::SIGKILL) {
            tracing::debug!(pgid = self.0.as_raw(), "Killed leftover fetch processes");
        }
    }
}

fn exit_result(status: ExitStatus) -> std::result::Result<(), AttemptError> {
    match status.code() {
        Some(0) => Ok(()),
        Some(code) => Err(AttemptError::Exit { code }),
        None => Err(AttemptError::Signaled),
    }
}

fn complete(events: &EventSender, model: &str, success: bool, log: String) {
    events
        .send(DownloadEvent::Completion {
            model: model.to_string(),
            success,
            exit_code: i32::from(!success),
            log,
        })
        .ok();
}

fn abort_readers(readers: Vec<JoinHandle<()>>) {
    for reader in readers {
        reader.abort();
    }
}

/// Read a pipe to EOF, forwarding complete lines
async fn pump<R>(mut reader: R, stream: StreamKind, tx: mpsc::UnboundedSender<(StreamKind, String)>)
where
    R: AsyncRead + Unpin,
{
    let mut splitter = LineSplitter::new();
    let mut buf = [0u8; 4096];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                for line in splitter.push(&buf[..n]) {
                    if tx.send((stream, line)).is_err() {
                        return;
                    }
                }
            }
            Err(e) => {
                tracing::debug!(?stream, error = %e, "Output read failed");
                break;
            }
        }
    }
    if let Some(line) = splitter.finish() {
        tx.send((stream, line)).ok();
    }
}
