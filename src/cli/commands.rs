//! Command implementations

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::adapters::{LocalFileSource, Settings, TomlConfigAdapter};
use crate::app::{
    replies, AppContainer, DefaultAppContainer, InboxWatcher, JobOutcome, JobReport,
    ServiceError, StatusUpdate,
};
use crate::cli::args::{BatchArgs, ConvertArgs, LimitsArgs, WatchArgs};
use crate::ports::SourcePort;
use crate::utils::path::{discover_inputs, note_file_name};
use crate::utils::{format_duration, format_file_size};

/// How a command ended, for the process exit code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandStatus {
    Success,
    /// At least one job ended in `Failed`
    JobFailed,
}

/// Execute the convert command
pub async fn convert(
    args: ConvertArgs,
    settings: Settings,
    shutdown: CancellationToken,
) -> Result<CommandStatus> {
    if args.output.exists() && !args.force {
        anyhow::bail!(
            "Output file already exists: {} (use --force to replace it)",
            args.output.display()
        );
    }

    let (tx, rx) = mpsc::unbounded_channel();
    let container = DefaultAppContainer::with_status_listener(settings, shutdown, tx);
    let printer = (!args.json).then(|| tokio::spawn(print_progress(rx)));

    let source = LocalFileSource::new(&args.input).with_declared_duration(args.declared_duration);
    info!(input = %args.input.display(), output = %args.output.display(), "converting");
    let interactor = container.pipeline_interactor();
    let outcome = interactor
        .run(&source, container.shutdown_token().child_token())
        .await;

    // Closing the last sender ends the progress printer
    drop(interactor);
    drop(container);
    if let Some(printer) = printer {
        let _ = printer.await;
    }

    let JobOutcome {
        report, artifact, ..
    } = outcome;
    if let Some(artifact) = artifact {
        let dest = artifact
            .persist(&args.output)
            .with_context(|| format!("Failed to write {}", args.output.display()))?;
        if args.json {
            print_json(&report)?;
        } else {
            println!("{}", success_line(&report, &dest.display().to_string()));
        }
        return Ok(CommandStatus::Success);
    }

    if args.json {
        print_json(&report)?;
    } else {
        eprintln!("{}", failure_line(&report));
    }
    Ok(CommandStatus::JobFailed)
}

/// Execute the batch command
pub async fn batch(
    args: BatchArgs,
    settings: Settings,
    shutdown: CancellationToken,
) -> Result<CommandStatus> {
    std::fs::create_dir_all(&args.output_dir)
        .with_context(|| format!("Failed to create {}", args.output_dir.display()))?;
    let inputs = discover_inputs(&args.inputs, std::slice::from_ref(&args.output_dir))
        .context("Failed to collect inputs")?;
    if inputs.is_empty() {
        anyhow::bail!("No input files found");
    }

    let container = DefaultAppContainer::new(settings, shutdown);
    let pool = container.worker_pool();
    info!(count = inputs.len(), workers = pool.workers(), "starting batch");

    let sources: Vec<Arc<dyn SourcePort>> = inputs
        .iter()
        .map(|p| Arc::new(LocalFileSource::new(p)) as Arc<dyn SourcePort>)
        .collect();
    let outcomes = pool.run_all(sources).await?;

    let mut status = CommandStatus::Success;
    let mut reports = Vec::with_capacity(outcomes.len());
    for (input, outcome) in inputs.iter().zip(outcomes) {
        let JobOutcome {
            report, artifact, ..
        } = outcome;
        match artifact {
            Some(artifact) => {
                let dest = args.output_dir.join(note_file_name(input));
                match artifact.persist(&dest) {
                    Ok(dest) if !args.json => {
                        println!("{}", success_line(&report, &dest.display().to_string()))
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!(output = %dest.display(), error = %e, "failed to write note");
                        status = CommandStatus::JobFailed;
                    }
                }
            }
            None => {
                status = CommandStatus::JobFailed;
                if !args.json {
                    eprintln!("{}", failure_line(&report));
                }
            }
        }
        reports.push(report);
    }

    if args.json {
        print_json(&reports)?;
    } else {
        let failed = reports.iter().filter(|r| !r.succeeded()).count();
        println!(
            "{} converted, {} failed",
            reports.len() - failed,
            failed
        );
    }
    Ok(status)
}

/// Execute the watch command under the supervisor
pub async fn watch(
    args: WatchArgs,
    settings: Settings,
    shutdown: CancellationToken,
) -> Result<CommandStatus> {
    let poll = Duration::try_from_secs_f64(args.poll_interval)
        .context("Invalid --poll-interval")?;
    let min_age = Duration::try_from_secs_f64(args.min_age).context("Invalid --min-age")?;

    let container = DefaultAppContainer::new(settings, shutdown.clone());
    let pool = container.worker_pool();
    let supervisor = container.supervisor();
    println!("{}\n", replies::welcome_text());
    println!("{}", replies::help_text(&container.settings().limits));

    let result = supervisor
        .run("inbox-watcher", |attempt| {
            let mut watcher = InboxWatcher::new(Arc::clone(&pool), &args.inbox, &args.outbox)
                .with_poll_interval(poll)
                .with_min_age(min_age);
            let shutdown = shutdown.clone();
            async move {
                if attempt > 0 {
                    info!(attempt, "inbox watcher restarted");
                }
                watcher.run(&shutdown).await.map_err(ServiceError::from)
            }
        })
        .await;

    result.context("Inbox watcher stopped")?;
    Ok(CommandStatus::Success)
}

/// Execute the limits command
pub fn limits(args: LimitsArgs, settings: &Settings) -> Result<CommandStatus> {
    if args.json {
        print_json(settings)?;
    } else {
        println!("{}", TomlConfigAdapter::render(settings)?);
        println!("{}", replies::help_text(&settings.limits));
    }
    Ok(CommandStatus::Success)
}

async fn print_progress(mut rx: mpsc::UnboundedReceiver<StatusUpdate>) {
    while let Some((_, status)) = rx.recv().await {
        if let Some(text) = replies::progress_text(&status) {
            eprintln!("{}", text);
        }
    }
}

fn success_line(report: &JobReport, dest: &str) -> String {
    let duration = report
        .output_duration_seconds
        .and_then(|s| Duration::try_from_secs_f64(s).ok())
        .map(format_duration)
        .unwrap_or_else(|| "--:--.---".to_string());
    format!(
        "{} -> {} ({}, {} frames, {})",
        report.source,
        dest,
        format_file_size(report.output_bytes.unwrap_or(0)),
        report.output_frames.unwrap_or(0),
        duration
    )
}

fn failure_line(report: &JobReport) -> String {
    format!(
        "{}: {} [{}]",
        report.source,
        report.failure_message.as_deref().unwrap_or("failed"),
        report.failure_code.as_deref().unwrap_or("unknown")
    )
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize report")?;
    println!("{}", json);
    Ok(())
}
