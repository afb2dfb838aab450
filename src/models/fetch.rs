use std::fmt::Debug;
use std::path::Path;
use tokio::process::Command;

/// How the external fetch script is launched on this platform
///
/// Selected once when the downloader is built, so the attempt loop never
/// branches on the host OS.
pub trait FetchProgram: Send + Sync + Debug {
    /// File name of the script inside the models directory
    fn script_name(&self) -> &str;

    /// Build the command fetching `model`; the caller sets the working
    /// directory and stdio
    fn command(&self, model: &str) -> Command;

    /// Remediation hint attached to spawn failures
    fn spawn_hint(&self) -> String;
}

/// `bash download-ggml-model.sh <model>`
#[derive(Debug, Clone, Copy, Default)]
pub struct PosixFetch;

impl FetchProgram for PosixFetch {
    fn script_name(&self) -> &str {
        "download-ggml-model.sh"
    }

    fn command(&self, model: &str) -> Command {
        let mut cmd = Command::new("bash");
        cmd.arg(self.script_name()).arg(model);
        cmd
    }

    fn spawn_hint(&self) -> String {
        interpreter_hint(
            "bash",
            "Install bash or add it to PATH",
            "Check that download-ggml-model.sh is readable (chmod +r)",
        )
    }
}

/// `cmd /C download-ggml-model.cmd <model>`
#[derive(Debug, Clone, Copy, Default)]
pub struct WindowsFetch;

impl FetchProgram for WindowsFetch {
    fn script_name(&self) -> &str {
        "download-ggml-model.cmd"
    }

    fn command(&self, model: &str) -> Command {
        let mut cmd = Command::new("cmd");
        cmd.arg("/C").arg(self.script_name()).arg(model);
        cmd
    }

    fn spawn_hint(&self) -> String {
        interpreter_hint(
            "cmd",
            "Ensure %SystemRoot%\\System32 is on PATH",
            "Check that download-ggml-model.cmd is not blocked (Properties > Unblock)",
        )
    }
}

fn interpreter_hint(interpreter: &str, missing: &str, present: &str) -> String {
    match which::which(interpreter) {
        Ok(path) => format!("{interpreter} found at {}. {present}", path.display()),
        Err(_) => format!("{interpreter} not found in PATH. {missing}"),
    }
}

/// Fetch program for the host platform
#[must_use]
pub fn detect() -> Box<dyn FetchProgram> {
    if cfg!(windows) {
        Box::new(WindowsFetch)
    } else {
        Box::new(PosixFetch)
    }
}

/// Path of the program's script under `models_dir`
#[must_use]
pub fn script_path(program: &dyn FetchProgram, models_dir: &Path) -> std::path::PathBuf {
    models_dir.join(program.script_name())
}
