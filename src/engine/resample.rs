//! Frame-rate normalization schedule
//!
//! Output frame `n` sits at `n / fps` seconds and shows the latest source
//! frame whose timestamp is `<= n / fps`. The first source frame also covers
//! any leading gap. Sources faster than the target rate drop frames, slower
//! ones repeat them; the mapping depends only on timestamps, so it is
//! deterministic for a given source.

/// Tolerance for timestamps that land on a slot boundary after float rounding
const SLOT_EPSILON: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameSchedule {
    fps: f64,
    total_frames: u64,
}

impl FrameSchedule {
    /// Schedule covering `duration_seconds` of output at `fps`
    pub fn new(fps: u32, duration_seconds: f64) -> Self {
        let fps = fps.max(1) as f64;
        let total_frames = if duration_seconds.is_finite() && duration_seconds > 0.0 {
            ((duration_seconds * fps) - SLOT_EPSILON).ceil().max(1.0) as u64
        } else {
            0
        };
        Self { fps, total_frames }
    }

    /// Number of output frames in the clip
    pub fn total_frames(&self) -> u64 {
        self.total_frames
    }

    /// Presentation time of output frame `index`
    pub fn slot_time(&self, index: u64) -> f64 {
        index as f64 / self.fps
    }

    /// Exact output duration: frame count over frame rate
    pub fn output_duration(&self, frames: u64) -> f64 {
        frames as f64 / self.fps
    }

    /// First output slot that a source frame at `pts` would take over.
    ///
    /// Every slot before it belongs to earlier source frames. Capped at
    /// `total_frames`.
    pub fn first_slot_at(&self, pts: f64) -> u64 {
        if !(pts > 0.0) {
            return 0;
        }
        let slot = ((pts * self.fps) - SLOT_EPSILON).ceil().max(0.0) as u64;
        slot.min(self.total_frames)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_frames_is_ceiling() {
        assert_eq!(FrameSchedule::new(30, 20.0).total_frames(), 600);
        assert_eq!(FrameSchedule::new(30, 1.01).total_frames(), 31);
        assert_eq!(FrameSchedule::new(30, 0.0).total_frames(), 0);
        assert_eq!(FrameSchedule::new(30, f64::NAN).total_frames(), 0);
        // Short sources still produce one frame
        assert_eq!(FrameSchedule::new(30, 0.001).total_frames(), 1);
    }

    #[test]
    fn test_first_slot_on_boundaries() {
        let schedule = FrameSchedule::new(30, 2.0);
        assert_eq!(schedule.first_slot_at(0.0), 0);
        assert_eq!(schedule.first_slot_at(1.0 / 30.0), 1);
        // Rounding noise just past a boundary stays on that boundary
        assert_eq!(schedule.first_slot_at(10.0 / 30.0 + 1e-9), 10);
        assert_eq!(schedule.first_slot_at(10.5 / 30.0), 11);
    }

    #[test]
    fn test_first_slot_of_odd_timestamps() {
        let schedule = FrameSchedule::new(30, 2.0);
        assert_eq!(schedule.first_slot_at(-0.5), 0);
        assert_eq!(schedule.first_slot_at(f64::NAN), 0);
        assert_eq!(schedule.first_slot_at(60.0), 60);
    }

    #[test]
    fn test_slot_times_and_duration() {
        let schedule = FrameSchedule::new(25, 1.0);
        assert_eq!(schedule.slot_time(0), 0.0);
        assert!((schedule.slot_time(5) - 0.2).abs() < 1e-12);
        assert!((schedule.output_duration(25) - 1.0).abs() < 1e-12);
    }
}
