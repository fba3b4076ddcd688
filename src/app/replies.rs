//! Text replies shown to the person who sent a video

use crate::domain::errors::FailureKind;
use crate::domain::model::{JobStatus, Limits, MIB};

/// Greeting for a new conversation
pub fn welcome_text() -> &'static str {
    "I turn videos into round video notes.\n\nJust send me a video and I will convert it into a circle."
}

/// Help text built from the effective limits
pub fn help_text(limits: &Limits) -> String {
    format!(
        "Help:\n\n\
         - Send a video file and get a round video note back\n\
         - Videos up to {} seconds (longer ones are cut)\n\
         - Files up to {} MB\n\n\
         Commands:\n\
         /start - begin\n\
         /help - this help\n\
         /status - service status",
        format_seconds(limits.clamp_duration_seconds),
        limits.max_bytes / MIB,
    )
}

/// Reply for the status command
pub fn status_text(active_jobs: usize) -> String {
    if active_jobs == 0 {
        "The service is running. Send me a video!".to_string()
    } else {
        format!(
            "The service is running, {} video{} in progress.",
            active_jobs,
            if active_jobs == 1 { "" } else { "s" }
        )
    }
}

/// Progress line for a job status; `None` where nothing should be shown
pub fn progress_text(status: &JobStatus) -> Option<&'static str> {
    match status {
        JobStatus::Validating | JobStatus::Decoding => Some("Processing video..."),
        JobStatus::Transforming => Some("Creating the circle..."),
        JobStatus::Encoding => Some("Almost done..."),
        JobStatus::Succeeded => Some("Sending..."),
        JobStatus::Pending | JobStatus::Failed(_) => None,
    }
}

/// Reply sent when a job fails
pub fn failure_text(kind: &FailureKind) -> String {
    format!("Error: {}", kind.user_message())
}

fn format_seconds(seconds: f64) -> String {
    if seconds.fract() == 0.0 {
        format!("{}", seconds as u64)
    } else {
        format!("{:.1}", seconds)
    }
}
