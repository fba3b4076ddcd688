//! CircleNote CLI
//!
//! Turns ordinary videos into round video notes: centered square crop,
//! circular mask, at most 20 seconds, H.264/AAC in MP4.
//!
//! # Usage
//!
//! ```bash
//! circlenote convert -i holiday.mov -o holiday.note.mp4
//! circlenote batch -o notes/ clips/
//! circlenote watch --inbox drop/ --outbox notes/
//! circlenote limits
//! ```
//!
//! Exit codes: 0 success, 2 a job failed, 1 anything else.

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use circlenote::adapters::TracingLogAdapter;
use circlenote::cli::commands::{self, CommandStatus};
use circlenote::cli::{Cli, Commands};
use circlenote::config_initialization::initialize_settings;

fn main() -> ExitCode {
    match run() {
        Ok(CommandStatus::Success) => ExitCode::SUCCESS,
        Ok(CommandStatus::JobFailed) => ExitCode::from(2),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<CommandStatus> {
    // Parse command line arguments
    let cli = Cli::parse();

    let (settings, source) = initialize_settings(&cli).context("Failed to load configuration")?;
    TracingLogAdapter::init(&settings.logging).context("Failed to initialize logging")?;
    match &source {
        Some(path) => info!(config = %path.display(), "configuration loaded"),
        None => info!("using default configuration"),
    }

    let command = match cli.command {
        Commands::Limits(args) => return commands::limits(args, &settings),
        other => other,
    };

    circlenote::init().context("Failed to initialize FFmpeg")?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    runtime.block_on(async move {
        let shutdown = CancellationToken::new();
        let signal_token = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received, cancelling jobs");
                signal_token.cancel();
            }
        });

        match command {
            Commands::Convert(args) => commands::convert(args, settings, shutdown).await,
            Commands::Batch(args) => commands::batch(args, settings, shutdown).await,
            Commands::Watch(args) => commands::watch(args, settings, shutdown).await,
            Commands::Limits(args) => commands::limits(args, &settings),
        }
    })
}
