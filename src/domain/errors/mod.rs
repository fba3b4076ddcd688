// Domain errors - Terminal failure kinds of a conversion job

use std::fmt;

/// Reason a job ended in `Failed`.
///
/// Every kind maps to a distinct, stable `code()` and `user_message()` so the
/// calling layer can tell the requester what to do next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    /// Declared or on-disk size exceeds `max_bytes`
    TooLarge,
    /// Materialized source has zero bytes
    EmptyFile,
    /// Decoded source reports a non-positive width or height
    InvalidDimensions,
    /// Source container or codec could not be opened or read
    DecodeFailed(String),
    /// Output could not be produced
    EncodeFailed(String),
    /// Job abandoned because of an external cancellation signal
    Cancelled,
}

impl FailureKind {
    /// Stable machine-readable identifier
    pub fn code(&self) -> &'static str {
        match self {
            FailureKind::TooLarge => "too_large",
            FailureKind::EmptyFile => "empty_file",
            FailureKind::InvalidDimensions => "invalid_dimensions",
            FailureKind::DecodeFailed(_) => "decode_failed",
            FailureKind::EncodeFailed(_) => "encode_failed",
            FailureKind::Cancelled => "cancelled",
        }
    }

    /// Human-readable guidance for the requester
    pub fn user_message(&self) -> &'static str {
        match self {
            FailureKind::TooLarge => {
                "The video is too big. Please send a smaller file."
            }
            FailureKind::EmptyFile => {
                "The file arrived empty. Please send the video again."
            }
            FailureKind::InvalidDimensions => {
                "The video has no usable picture. Please send a different video."
            }
            FailureKind::DecodeFailed(_) => {
                "The video could not be read. Please send it in a common format such as MP4."
            }
            FailureKind::EncodeFailed(_) => {
                "The video note could not be created. Please try again later."
            }
            FailureKind::Cancelled => "Processing was cancelled.",
        }
    }

    /// Failures caused by the input itself rather than by the pipeline
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            FailureKind::TooLarge | FailureKind::EmptyFile | FailureKind::InvalidDimensions
        )
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::TooLarge => write!(f, "Source exceeds the size limit"),
            FailureKind::EmptyFile => write!(f, "Source file is empty"),
            FailureKind::InvalidDimensions => write!(f, "Source has invalid frame dimensions"),
            FailureKind::DecodeFailed(msg) => write!(f, "Decode failed: {}", msg),
            FailureKind::EncodeFailed(msg) => write!(f, "Encode failed: {}", msg),
            FailureKind::Cancelled => write!(f, "Job cancelled"),
        }
    }
}

impl std::error::Error for FailureKind {}
