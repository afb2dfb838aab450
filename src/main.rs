#![allow(clippy::multiple_crate_versions)]

use anyhow::Context;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;
use whisper_vault::config::Config;
use whisper_vault::models::ModelStatus;
use whisper_vault::{DownloadEvent, DownloadStatus, ModelInfo, ModelManager, Response};

#[derive(Parser)]
#[command(name = "whisper-vault")]
#[command(about = "Manage whisper.cpp ggml models", long_about = None)]
struct Cli {
    /// Base directory containing whisper.cpp/models
    #[arg(long, global = true)]
    base_dir: Option<PathBuf>,

    /// Config file [default: ~/.config/whisper-vault/config.toml]
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print results (and download events) as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List available models
    List,
    /// List installed models
    Installed,
    /// Show details about a model
    Info { model: String },
    /// Download a model
    Download {
        model: String,
        /// Maximum number of fetch attempts
        #[arg(long)]
        attempts: Option<u32>,
    },
    /// Delete an installed model
    Delete { model: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so `--json` output stays parseable
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
    .context("Failed to load config")?;

    if let Some(dir) = cli.base_dir {
        config.storage.base_dir = Some(dir);
    }
    if let Commands::Download {
        attempts: Some(n), ..
    } = cli.command
    {
        config.download.max_attempts = n;
    }

    let manager = ModelManager::new(&config).context("Failed to set up model manager")?;

    let success = match &cli.command {
        Commands::List => render(&manager.list_catalog(), cli.json, |models| {
            print_catalog(&manager, models);
        })?,
        Commands::Installed => render(&manager.list_installed(), cli.json, |models| {
            if models.is_empty() {
                println!("No models installed yet");
            }
            for m in models {
                println!("✓ {:<18} {:>10}  {}", m.name, m.size, m.path.display());
            }
        })?,
        Commands::Info { model } => render(&manager.get_info(model), cli.json, print_status)?,
        Commands::Download { model, .. } => download(&manager, model, cli.json).await?,
        Commands::Delete { model } => render(&manager.delete(model), cli.json, |message| {
            println!("✓ {message}");
        })?,
    };

    if !success {
        std::process::exit(1);
    }
    Ok(())
}

/// Print a response, returning whether it counts as success
fn render<T: Serialize>(
    response: &Response<T>,
    json: bool,
    print_ok: impl FnOnce(&T),
) -> anyhow::Result<bool> {
    if json {
        println!("{}", serde_json::to_string_pretty(response)?);
    } else {
        match response {
            Response::Ok(data) => print_ok(data),
            Response::Unchanged { message } => println!("{message}"),
            Response::Error { message, .. } => eprintln!("Error: {message}"),
        }
    }
    Ok(response.is_success())
}

fn print_catalog(manager: &ModelManager, models: &[ModelInfo]) {
    let installed = manager.store().list_installed().unwrap_or_default();
    for (index, model) in models.iter().enumerate() {
        let star = if model.recommended { "*" } else { " " };
        let status = if installed.contains(model.name) {
            "installed"
        } else {
            "-"
        };
        println!(
            "{star} {:>2}. {:<18} {:<10} {status}",
            index + 1,
            model.name,
            model.size
        );
        println!("       {}", model.description);
    }
}

fn print_status(status: &ModelStatus) {
    println!("Model:       {}", status.info.name);
    println!("Size:        {}", status.info.size);
    println!("Description: {}", status.info.description);
    println!("English:     {}", if status.info.english_only { "only" } else { "multilingual" });
    println!("Installed:   {}", if status.installed { "yes" } else { "no" });
    if let Some(size) = &status.size {
        println!("On disk:     {size}");
    }
    println!("Path:        {}", status.path.display());
}

/// Run a download, rendering events as a single redrawn progress line
async fn download(manager: &ModelManager, model: &str, json: bool) -> anyhow::Result<bool> {
    let (tx, mut rx) = mpsc::unbounded_channel();

    let bar = if json {
        ProgressBar::hidden()
    } else {
        ProgressBar::new(100)
    };
    bar.set_style(
        ProgressStyle::with_template("{msg:16} [{bar:40.cyan/blue}] {pos:>3}%")?
            .progress_chars("=> "),
    );
    bar.set_message(model.to_string());

    let run = async move {
        let response = manager.download(model, &tx).await;
        drop(tx);
        response
    };

    let show = async {
        while let Some(event) = rx.recv().await {
            if json {
                if let Ok(line) = serde_json::to_string(&event) {
                    println!("{line}");
                }
                continue;
            }
            match event {
                DownloadEvent::Progress { percent, .. } => bar.set_position(u64::from(percent)),
                DownloadEvent::Log { log, .. } => bar.println(log),
                DownloadEvent::Error { error, .. } => bar.println(format!("! {error}")),
                DownloadEvent::Completion { success, log, .. } => {
                    if success {
                        bar.finish_and_clear();
                    } else {
                        bar.abandon();
                    }
                    tracing::debug!("{log}");
                }
            }
        }
    };

    let (response, ()) = tokio::join!(run, show);

    render(&response, json, |status| match status {
        DownloadStatus::AlreadyInstalled => println!("Model {model} is already installed"),
        DownloadStatus::Downloaded { attempts } => {
            let size = manager
                .store()
                .installed_model(model)
                .map_or_else(|| "unknown size".to_string(), |m| m.size);
            println!("✓ Downloaded {model} ({size}) in {attempts} attempt(s)");
        }
    })
}
