//! parallax - run a Parallax manager in-process
//!
//! Subcommands:
//! - `parallax simulate` - manager, empty reality and one application over
//!   in-memory channels, logging the user's pose as frames arrive
//! - `parallax config` - print the effective configuration and its sources

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use parallax::{ids, telemetry, Parallax, PoseStatus};
use plxconf::PlxConfig;
use plxproto::MessageChannel;
use tracing::info;

#[derive(Parser)]
#[command(name = "parallax")]
#[command(about = "Distributed AR context manager")]
#[command(version)]
struct Cli {
    /// Config file (overrides ./parallax.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a manager with one application until the frame count is reached
    Simulate {
        /// Frames to run before shutting down
        #[arg(short, long, default_value = "120")]
        frames: u64,

        /// Reality to install instead of the configured default
        #[arg(long)]
        reality: Option<String>,
    },

    /// Print the effective configuration
    Config {
        /// Also list the files and env vars that contributed
        #[arg(long)]
        sources: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (config, sources) = PlxConfig::load_with_sources_from(cli.config.as_deref())
        .context("Failed to load configuration")?;

    match cli.command {
        Commands::Config { sources: show } => {
            print!("{}", config.to_toml());
            if show {
                println!();
                for file in &sources.files {
                    println!("# file: {}", file.display());
                }
                for var in &sources.env_overrides {
                    println!("# env: {}", var);
                }
            }
        }
        Commands::Simulate { frames, reality } => {
            telemetry::init(&config.telemetry.log_level);
            simulate(config, frames, reality).await?;
        }
    }

    Ok(())
}

async fn simulate(mut config: PlxConfig, frames: u64, reality: Option<String>) -> Result<()> {
    if let Some(uri) = reality {
        config.reality.default_uri = uri;
    }

    let manager = Parallax::manager(config.clone());
    let app = Parallax::application(config.clone());

    let (manager_side, app_side) = MessageChannel::new().into_ports();
    let app_session = manager.accept(manager_side)?;
    app.connect(app_side)?;

    let (done_tx, mut done_rx) = tokio::sync::mpsc::unbounded_channel();
    let seen = Arc::new(AtomicU64::new(0));
    let context = app.context.clone();
    let counter = seen.clone();
    app.context.update_event().add_listener(move |frame| {
        let count = counter.fetch_add(1, Ordering::SeqCst) + 1;
        let pose = context.get_pose(ids::USER);
        if pose.status.contains(PoseStatus::FOUND) {
            info!(frame = frame.frame_number, "User found");
        }
        if let Some(position) = pose.position {
            tracing::debug!(
                frame = frame.frame_number,
                x = position.x,
                y = position.y,
                z = position.z,
                "User pose"
            );
        }
        if count >= frames {
            let _ = done_tx.send(());
        }
    });

    manager.install_default_reality()?;

    // Focus once the application's configuration has arrived.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !app_session.is_connected() {
        if tokio::time::Instant::now() > deadline {
            anyhow::bail!("application never connected");
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    manager.focus.set_focus(&app_session)?;

    tokio::select! {
        _ = done_rx.recv() => {}
        _ = tokio::signal::ctrl_c() => info!("Interrupted"),
    }

    info!(frames = seen.load(Ordering::SeqCst), "Simulation finished");
    app.shutdown();
    manager.shutdown();
    Ok(())
}
