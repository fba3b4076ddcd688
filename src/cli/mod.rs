//! CLI module for CircleNote
//!
//! This module handles command-line argument parsing and command execution.
//! Every global flag can also be set through a `CIRCLENOTE_*` environment
//! variable; flags win over the environment, which wins over the config file.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::adapters::LogFormat;

pub mod args;
pub mod commands;

/// CircleNote - Round video notes from ordinary videos
///
/// Crops a video to a centered square, masks it to a circle, caps its
/// duration and encodes it as H.264/AAC MP4.
#[derive(Parser, Debug)]
#[command(name = "circlenote")]
#[command(about = "CircleNote - Turn any video into a round video note")]
#[command(version)]
#[command(long_about = None)]
pub struct Cli {
    /// Configuration file (default: ./circlenote.toml if present)
    #[arg(long, global = true, env = "CIRCLENOTE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log filter, e.g. `info` or `circlenote=debug`
    #[arg(long, global = true, env = "CIRCLENOTE_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Log output format
    #[arg(long, value_enum, global = true, env = "CIRCLENOTE_LOG_FORMAT")]
    pub log_format: Option<LogFormat>,

    /// Directory for per-job scratch files
    #[arg(long, global = true, env = "CIRCLENOTE_SCRATCH_DIR")]
    pub scratch_dir: Option<PathBuf>,

    /// Jobs allowed to run at once
    #[arg(long, global = true, env = "CIRCLENOTE_WORKERS")]
    pub workers: Option<usize>,

    #[command(flatten)]
    pub limits: args::LimitArgs,

    /// The command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Convert one video into a video note
    Convert(args::ConvertArgs),
    /// Convert many videos, walking directories
    Batch(args::BatchArgs),
    /// Watch an inbox directory and convert everything dropped into it
    Watch(args::WatchArgs),
    /// Print the effective limits and the help text
    Limits(args::LimitsArgs),
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_convert_with_overrides() {
        let cli = Cli::try_parse_from([
            "circlenote",
            "convert",
            "-i",
            "in.mov",
            "-o",
            "out.mp4",
            "--size",
            "480",
            "--declared-duration",
            "31.5",
            "--log-format",
            "json",
        ])
        .unwrap();
        assert_eq!(cli.limits.size, Some(480));
        assert_eq!(cli.log_format, Some(LogFormat::Json));
        match cli.command {
            Commands::Convert(args) => {
                assert_eq!(args.input, PathBuf::from("in.mov"));
                assert_eq!(args.declared_duration, Some(31.5));
                assert!(!args.json);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_batch_requires_inputs() {
        assert!(Cli::try_parse_from(["circlenote", "batch", "-o", "out"]).is_err());
    }
}
