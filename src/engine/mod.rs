//! Frame-level media engine
//!
//! Pure frame transforms (`mask`, `resample`, `assembler`) plus the libav
//! plumbing around them (`decoder`, `audio`, `scale`, `encoder`).

pub mod assembler;
pub mod audio;
pub mod decoder;
pub mod encoder;
pub mod mask;
pub mod resample;
pub mod scale;

pub use assembler::{ClipAssembler, FrameResizer, FrameSource};
pub use encoder::{EncodeProfile, EncodeStats, NoteEncoder};
pub use mask::{apply_circle_mask, CircleMask};
pub use resample::FrameSchedule;

/// Emit a progress event every this many output frames
pub const PROGRESS_INTERVAL: u64 = 30;
