//! Command-line argument definitions

use std::path::PathBuf;

use clap::Args;

/// Overrides for the per-job limits, shared by all commands
#[derive(Args, Debug, Default, Clone)]
pub struct LimitArgs {
    /// Maximum accepted source size in bytes
    #[arg(long, global = true, env = "CIRCLENOTE_MAX_BYTES")]
    pub max_bytes: Option<u64>,

    /// Declared durations above this many seconds are flagged
    #[arg(long, global = true, env = "CIRCLENOTE_MAX_DURATION")]
    pub max_duration: Option<f64>,

    /// Output is cut to this many seconds
    #[arg(long, global = true, env = "CIRCLENOTE_CLAMP_DURATION")]
    pub clamp_duration: Option<f64>,

    /// Side of the square output in pixels (even)
    #[arg(long, global = true, env = "CIRCLENOTE_SIZE")]
    pub size: Option<u32>,

    /// Output frame rate
    #[arg(long, global = true, env = "CIRCLENOTE_FPS")]
    pub fps: Option<u32>,

    /// Video encoder name
    #[arg(long, global = true, env = "CIRCLENOTE_VIDEO_CODEC")]
    pub video_codec: Option<String>,

    /// Audio encoder name
    #[arg(long, global = true, env = "CIRCLENOTE_AUDIO_CODEC")]
    pub audio_codec: Option<String>,
}

/// Arguments for the convert command
#[derive(Args, Debug)]
pub struct ConvertArgs {
    /// Input video file path
    #[arg(short, long)]
    pub input: PathBuf,

    /// Output MP4 path
    #[arg(short, long)]
    pub output: PathBuf,

    /// Duration the sender claims for the video, in seconds
    #[arg(long)]
    pub declared_duration: Option<f64>,

    /// Replace the output if it already exists
    #[arg(short, long)]
    pub force: bool,

    /// Print the job report as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the batch command
#[derive(Args, Debug)]
pub struct BatchArgs {
    /// Input files or directories
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Directory the notes are written to
    #[arg(short, long)]
    pub output_dir: PathBuf,

    /// Print all job reports as a JSON array
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the watch command
#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Directory new videos are dropped into
    #[arg(long, env = "CIRCLENOTE_INBOX")]
    pub inbox: PathBuf,

    /// Directory finished notes are written to
    #[arg(long, env = "CIRCLENOTE_OUTBOX")]
    pub outbox: PathBuf,

    /// Seconds between inbox scans
    #[arg(long, default_value = "2.0")]
    pub poll_interval: f64,

    /// Seconds a file must stay unmodified before it is picked up
    #[arg(long, default_value = "1.0")]
    pub min_age: f64,
}

/// Arguments for the limits command
#[derive(Args, Debug)]
pub struct LimitsArgs {
    /// Print the effective settings as JSON instead of TOML
    #[arg(long)]
    pub json: bool,
}
