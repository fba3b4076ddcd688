//! Configuration initialization and hierarchy management

use std::path::PathBuf;

use tracing::debug;

use crate::adapters::{Settings, TomlConfigAdapter};
use crate::cli::Cli;
use crate::error::CircleNoteResult;

/// Resolve settings with precedence CLI > environment > file > defaults.
///
/// Environment variables reach us through clap, so by the time a flag is
/// `Some` it already reflects the higher of the two.
pub fn initialize_settings(cli: &Cli) -> CircleNoteResult<(Settings, Option<PathBuf>)> {
    let (mut settings, source) = TomlConfigAdapter::load(cli.config.as_deref())?;
    apply_cli_overrides(&mut settings, cli);
    settings.validate()?;
    Ok((settings, source))
}

/// Apply every flag that was given onto `settings`
pub fn apply_cli_overrides(settings: &mut Settings, cli: &Cli) {
    let mut applied = 0;
    let mut set = |name: &str| {
        debug!(setting = name, "command-line override");
        applied += 1;
    };

    if let Some(level) = &cli.log_level {
        settings.logging.level = level.clone();
        set("logging.level");
    }
    if let Some(format) = cli.log_format {
        settings.logging.format = format;
        set("logging.format");
    }
    if let Some(dir) = &cli.scratch_dir {
        settings.scratch_dir = Some(dir.clone());
        set("scratch_dir");
    }
    if let Some(workers) = cli.workers {
        settings.workers = workers;
        set("workers");
    }

    let overrides = &cli.limits;
    let limits = &mut settings.limits;
    if let Some(v) = overrides.max_bytes {
        limits.max_bytes = v;
        set("limits.max_bytes");
    }
    if let Some(v) = overrides.max_duration {
        limits.max_duration_seconds = v;
        set("limits.max_duration_seconds");
    }
    if let Some(v) = overrides.clamp_duration {
        limits.clamp_duration_seconds = v;
        set("limits.clamp_duration_seconds");
    }
    if let Some(v) = overrides.size {
        limits.target_square_size = v;
        set("limits.target_square_size");
    }
    if let Some(v) = overrides.fps {
        limits.target_fps = v;
        set("limits.target_fps");
    }
    if let Some(v) = &overrides.video_codec {
        limits.video_codec = v.clone();
        set("limits.video_codec");
    }
    if let Some(v) = &overrides.audio_codec {
        limits.audio_codec = v.clone();
        set("limits.audio_codec");
    }

    debug!(count = applied, "command-line overrides applied");
}
