use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rollcall_core::{Gallery, Ledger, Session, SessionCommand, SessionSummary};
use rollcall_hw::Camera;
use rollcall_models::{OnnxDetector, OnnxVerifier};
use std::path::PathBuf;
use tokio::sync::mpsc;

mod config;
mod console;

use config::Config;
use console::ConsoleAnnotator;

#[derive(Parser)]
#[command(name = "rollcall", about = "Face-recognition attendance tracker")]
struct Cli {
    /// Path to a TOML config file (falls back to $ROLLCALL_CONFIG)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a live attendance session
    Run {
        /// V4L2 device path (overrides config)
        #[arg(short, long)]
        device: Option<String>,
        /// Gallery directory of reference images (overrides config)
        #[arg(short, long)]
        gallery: Option<PathBuf>,
    },
    /// List enrolled identities
    Gallery {
        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// List V4L2 capture devices
    Devices {
        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let mut config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Run { device, gallery } => {
            if let Some(device) = device {
                config.camera_device = device;
            }
            if let Some(gallery) = gallery {
                config.gallery_dir = gallery;
            }
            run(config).await
        }
        Commands::Gallery { json } => list_gallery(&config, json),
        Commands::Devices { json } => list_devices(json),
    }
}

async fn run(config: Config) -> Result<()> {
    let (cmd_tx, cmd_rx) = mpsc::channel::<SessionCommand>(8);

    let stdin_task = tokio::spawn(console::read_commands(cmd_tx.clone()));
    let ctrl_c_tx = cmd_tx;
    let ctrl_c_task = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = ctrl_c_tx.send(SessionCommand::Quit).await;
        }
    });

    println!("Commands: 'save <name>' enrolls the current unknown face, 'quit' ends the session.");

    let summary = tokio::task::spawn_blocking(move || run_session(config, cmd_rx))
        .await
        .context("session thread panicked")??;

    stdin_task.abort();
    ctrl_c_task.abort();

    println!(
        "Session ended: {} present over {} frames, ledger at {}",
        summary.present,
        summary.frames,
        summary.ledger_path.display()
    );
    Ok(())
}

/// Open every resource up front (fail-fast), then hand control to the
/// session loop until the operator quits or the camera fails.
fn run_session(
    config: Config,
    commands: mpsc::Receiver<SessionCommand>,
) -> Result<SessionSummary> {
    let camera =
        Camera::open(&config.camera_device).context("failed to open camera")?;
    let detector = OnnxDetector::load(
        &config.detector_model_path(),
        config.confidence_threshold,
    )
    .context("failed to load detector model")?;
    let verifier = OnnxVerifier::load(&config.verifier_model_path(), config.match_threshold)
        .context("failed to load verifier model")?;

    let gallery = Gallery::load(&config.gallery_dir).context("failed to load gallery")?;
    let ledger = Ledger::open_for(&config.ledger_dir, chrono::Local::now().date_naive())
        .context("failed to open ledger")?;

    let stream = camera.stream().context("failed to start capture stream")?;

    let session = Session::new(
        stream,
        detector,
        verifier,
        ConsoleAnnotator::new(),
        gallery,
        ledger,
        commands,
    );
    Ok(session.run()?)
}

fn list_gallery(config: &Config, json: bool) -> Result<()> {
    let gallery = Gallery::load(&config.gallery_dir)?;
    if json {
        let value = serde_json::json!({
            "dir": config.gallery_dir.display().to_string(),
            "count": gallery.len(),
            "identities": gallery.names(),
        });
        println!("{value}");
    } else if gallery.is_empty() {
        println!("No identities enrolled in {}", config.gallery_dir.display());
    } else {
        for name in gallery.names() {
            println!("{name}");
        }
    }
    Ok(())
}

fn list_devices(json: bool) -> Result<()> {
    let devices = Camera::list_devices();
    if json {
        let value: Vec<_> = devices
            .iter()
            .map(|d| {
                serde_json::json!({
                    "path": d.path,
                    "name": d.name,
                    "driver": d.driver,
                    "bus": d.bus,
                })
            })
            .collect();
        println!("{}", serde_json::Value::Array(value));
    } else if devices.is_empty() {
        println!("No V4L2 capture devices found");
    } else {
        for d in devices {
            println!("{}  {} ({})", d.path, d.name, d.driver);
        }
    }
    Ok(())
}
