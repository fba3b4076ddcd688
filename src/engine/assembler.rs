//! Clip assembler: decoded frames in, finished note frames out
//!
//! Pulls source frames lazily, applies the frame-rate schedule, and for every
//! source frame that is actually shown runs crop, resize and mask exactly
//! once. Repeated output slots reuse the processed frame. The sequence is
//! single-pass; a second pass needs a fresh decoder.

use tracing::debug;

use crate::domain::errors::FailureKind;
use crate::domain::model::{CropPlan, Frame};
use crate::engine::mask::CircleMask;
use crate::engine::resample::FrameSchedule;

/// Forward-only supply of decoded RGB frames with timestamps rebased to zero
pub trait FrameSource {
    fn next_frame(&mut self) -> Result<Option<Frame>, FailureKind>;
}

/// Scales a square RGB frame to `side` x `side`
pub trait FrameResizer {
    fn resize(&mut self, frame: &Frame, side: u32) -> Result<Frame, FailureKind>;
}

pub struct ClipAssembler<S, R> {
    source: S,
    resizer: R,
    crop: CropPlan,
    target_side: u32,
    mask: CircleMask,
    schedule: FrameSchedule,
    /// Stop after the last source frame instead of holding it to the schedule end
    trim_to_source: bool,

    next_slot: u64,
    slot_limit: u64,
    current: Option<Frame>,
    processed: Option<Frame>,
    pending: Option<Frame>,
    source_done: bool,
    failed: bool,
    source_frames: u64,
    processed_frames: u64,
}

impl<S: FrameSource, R: FrameResizer> ClipAssembler<S, R> {
    pub fn new(
        source: S,
        resizer: R,
        crop: CropPlan,
        target_side: u32,
        schedule: FrameSchedule,
    ) -> Self {
        Self {
            source,
            resizer,
            crop,
            target_side,
            mask: CircleMask::new(target_side),
            schedule,
            trim_to_source: false,
            next_slot: 0,
            slot_limit: schedule.total_frames(),
            current: None,
            processed: None,
            pending: None,
            source_done: false,
            failed: false,
            source_frames: 0,
            processed_frames: 0,
        }
    }

    /// End the clip at the last decoded frame when the source is shorter
    /// than the schedule (used when the container reports no duration)
    pub fn trim_to_source(mut self) -> Self {
        self.trim_to_source = true;
        self
    }

    /// Output frames emitted so far
    pub fn emitted(&self) -> u64 {
        self.next_slot
    }

    /// Source frames pulled from the decoder so far
    pub fn source_frames(&self) -> u64 {
        self.source_frames
    }

    /// Source frames that went through crop, resize and mask
    pub fn processed_frames(&self) -> u64 {
        self.processed_frames
    }

    /// Make `current` the source frame that owns `next_slot`
    fn advance(&mut self) -> Result<bool, FailureKind> {
        loop {
            if self.pending.is_none() && !self.source_done {
                match self.source.next_frame()? {
                    Some(frame) => {
                        self.source_frames += 1;
                        self.pending = Some(frame);
                    }
                    None => {
                        self.source_done = true;
                        self.on_source_end();
                    }
                }
            }

            let takes_over = match &self.pending {
                Some(next) => {
                    self.current.is_none()
                        || self.schedule.first_slot_at(next.pts) <= self.next_slot
                }
                None => false,
            };
            if !takes_over {
                break;
            }
            self.current = self.pending.take();
            self.processed = None;
        }

        Ok(self.current.is_some() && self.next_slot < self.slot_limit)
    }

    fn on_source_end(&mut self) {
        debug!(source_frames = self.source_frames, "source exhausted");
        if !self.trim_to_source {
            return;
        }
        if let Some(last) = &self.current {
            let last_slot = self.schedule.first_slot_at(last.pts) + 1;
            self.slot_limit = self.slot_limit.min(last_slot.max(self.next_slot + 1));
        }
    }

    fn render_current(&mut self) -> Result<Frame, FailureKind> {
        if self.processed.is_none() {
            let raw = self.current.as_ref().ok_or_else(|| {
                FailureKind::DecodeFailed("no source frame available".to_string())
            })?;
            if !self.crop.fits_within(raw.width, raw.height) {
                return Err(FailureKind::DecodeFailed(format!(
                    "decoded frame {}x{} does not contain crop {:?}",
                    raw.width, raw.height, self.crop
                )));
            }

            let square = raw.crop(&self.crop);
            let mut sized = if square.width == self.target_side {
                square
            } else {
                self.resizer.resize(&square, self.target_side)?
            };
            self.mask.apply(&mut sized);
            self.processed = Some(sized);
            self.processed_frames += 1;
        }

        let mut frame = self
            .processed
            .clone()
            .ok_or_else(|| FailureKind::EncodeFailed("processed frame missing".to_string()))?;
        frame.pts = self.schedule.slot_time(self.next_slot);
        Ok(frame)
    }
}

impl<S: FrameSource, R: FrameResizer> Iterator for ClipAssembler<S, R> {
    type Item = Result<Frame, FailureKind>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.next_slot >= self.slot_limit {
            return None;
        }

        let step = self.advance().and_then(|ready| {
            if ready {
                self.render_current().map(Some)
            } else {
                Ok(None)
            }
        });

        match step {
            Ok(Some(frame)) => {
                self.next_slot += 1;
                Some(Ok(frame))
            }
            Ok(None) => None,
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    struct VecSource {
        frames: VecDeque<Result<Frame, FailureKind>>,
    }

    impl VecSource {
        fn solid(width: u32, height: u32, rate: f64, count: usize) -> Self {
            let pts: Vec<f64> = (0..count).map(|i| i as f64 / rate).collect();
            Self::at(width, height, &pts)
        }

        /// One frame per timestamp, shaded by its index
        fn at(width: u32, height: u32, pts: &[f64]) -> Self {
            let frames = pts
                .iter()
                .enumerate()
                .map(|(i, &pts)| {
                    let shade = (i % 200) as u8 + 20;
                    let mut frame = Frame::black(width, height, pts);
                    frame.data.fill(shade);
                    Ok(frame)
                })
                .collect();
            Self { frames }
        }
    }

    /// Source index shown in each output frame, read back from the shade
    fn source_indices(frames: &[Frame]) -> Vec<usize> {
        frames
            .iter()
            .map(|f| f.pixel(8, 8)[0] as usize - 20)
            .collect()
    }

    impl FrameSource for VecSource {
        fn next_frame(&mut self) -> Result<Option<Frame>, FailureKind> {
            self.frames.pop_front().transpose()
        }
    }

    /// Nearest-neighbour scaling, counting calls
    #[derive(Default)]
    struct NearestResizer {
        calls: usize,
    }

    impl FrameResizer for &mut NearestResizer {
        fn resize(&mut self, frame: &Frame, side: u32) -> Result<Frame, FailureKind> {
            self.calls += 1;
            let mut out = Frame::black(side, side, frame.pts);
            for y in 0..side {
                for x in 0..side {
                    let sx = x * frame.width / side;
                    let sy = y * frame.height / side;
                    out.set_pixel(x, y, frame.pixel(sx, sy));
                }
            }
            Ok(out)
        }
    }

    fn assemble(
        source: VecSource,
        resizer: &mut NearestResizer,
        fps: u32,
        duration: f64,
    ) -> Vec<Frame> {
        let crop = CropPlan { x0: 8, y0: 0, side: 32 };
        let schedule = FrameSchedule::new(fps, duration);
        ClipAssembler::new(source, resizer, crop, 16, schedule)
            .collect::<Result<Vec<_>, _>>()
            .unwrap()
    }

    #[test]
    fn test_frames_are_square_masked_and_retimed() {
        let mut resizer = NearestResizer::default();
        let frames = assemble(VecSource::solid(48, 32, 30.0, 30), &mut resizer, 30, 1.0);

        assert_eq!(frames.len(), 30);
        for (n, frame) in frames.iter().enumerate() {
            assert_eq!((frame.width, frame.height), (16, 16));
            assert!((frame.pts - n as f64 / 30.0).abs() < 1e-9);
            assert_eq!(frame.pixel(0, 0), [0, 0, 0]);
            assert_ne!(frame.pixel(8, 8), [0, 0, 0]);
        }
    }

    #[test]
    fn test_duplicates_are_not_reprocessed() {
        let mut resizer = NearestResizer::default();
        // 10 fps source stretched to 30 fps
        let frames = assemble(VecSource::solid(48, 32, 10.0, 10), &mut resizer, 30, 1.0);
        assert_eq!(frames.len(), 30);
        assert_eq!(resizer.calls, 10);
        assert_eq!(frames[0].data, frames[2].data);
        assert_ne!(frames[2].data, frames[3].data);
    }

    #[test]
    fn test_same_rate_shows_every_frame_once() {
        let mut resizer = NearestResizer::default();
        let frames = assemble(VecSource::solid(48, 32, 30.0, 60), &mut resizer, 30, 2.0);
        assert_eq!(source_indices(&frames), (0..60).collect::<Vec<_>>());
    }

    #[test]
    fn test_double_rate_drops_every_other_frame() {
        let mut resizer = NearestResizer::default();
        let frames = assemble(VecSource::solid(48, 32, 60.0, 60), &mut resizer, 30, 1.0);
        let shown = source_indices(&frames);
        assert_eq!(shown.len(), 30);
        assert!(shown.iter().enumerate().all(|(n, &src)| src == n * 2));
        // Dropped frames are never cropped or masked
        assert_eq!(resizer.calls, 30);
    }

    #[test]
    fn test_first_frame_fills_leading_gap() {
        let mut resizer = NearestResizer::default();
        // First frame arrives late at 0.25s
        let source = VecSource::at(48, 32, &[0.25, 0.5, 0.75]);
        let frames = assemble(source, &mut resizer, 10, 1.0);
        assert_eq!(source_indices(&frames), vec![0, 0, 0, 0, 0, 1, 1, 1, 2, 2]);
    }

    #[test]
    fn test_mapping_is_deterministic() {
        let pts: Vec<f64> = (0..72).map(|i| i as f64 / 23.976).collect();
        let mut first = NearestResizer::default();
        let mut second = NearestResizer::default();
        let a = assemble(VecSource::at(48, 32, &pts), &mut first, 30, 3.0);
        let b = assemble(VecSource::at(48, 32, &pts), &mut second, 30, 3.0);
        assert_eq!(a.len(), 90);
        assert_eq!(source_indices(&a), source_indices(&b));
    }

    #[test]
    fn test_clamp_stops_pulling_early() {
        let mut resizer = NearestResizer::default();
        let crop = CropPlan { x0: 8, y0: 0, side: 32 };
        let schedule = FrameSchedule::new(30, 2.0);
        let mut assembler = ClipAssembler::new(
            VecSource::solid(48, 32, 30.0, 300),
            &mut resizer,
            crop,
            16,
            schedule,
        );

        let count = assembler.by_ref().count();
        assert_eq!(count, 60);
        assert!(assembler.source_frames() <= 62);
    }

    #[test]
    fn test_short_source_holds_last_frame() {
        let mut resizer = NearestResizer::default();
        let frames = assemble(VecSource::solid(48, 32, 30.0, 15), &mut resizer, 30, 1.0);
        assert_eq!(frames.len(), 30);
        assert_eq!(frames[14].data, frames[29].data);
    }

    #[test]
    fn test_trim_to_source_without_duration() {
        let mut resizer = NearestResizer::default();
        let crop = CropPlan { x0: 8, y0: 0, side: 32 };
        let schedule = FrameSchedule::new(30, 20.0);
        let frames: Vec<_> = ClipAssembler::new(
            VecSource::solid(48, 32, 30.0, 15),
            &mut resizer,
            crop,
            16,
            schedule,
        )
        .trim_to_source()
        .collect::<Result<_, _>>()
        .unwrap();
        assert_eq!(frames.len(), 15);
    }

    #[test]
    fn test_empty_source_yields_nothing() {
        let mut resizer = NearestResizer::default();
        let frames = assemble(VecSource::solid(48, 32, 30.0, 0), &mut resizer, 30, 1.0);
        assert!(frames.is_empty());
    }

    #[test]
    fn test_decode_error_ends_sequence() {
        let mut source = VecSource::solid(48, 32, 30.0, 3);
        source
            .frames
            .push_back(Err(FailureKind::DecodeFailed("corrupt packet".to_string())));
        let mut resizer = NearestResizer::default();
        let crop = CropPlan { x0: 8, y0: 0, side: 32 };
        let mut assembler =
            ClipAssembler::new(source, &mut resizer, crop, 16, FrameSchedule::new(30, 1.0));

        let results: Vec<_> = assembler.by_ref().collect();
        assert!(matches!(
            results.last(),
            Some(Err(FailureKind::DecodeFailed(_)))
        ));
        assert!(assembler.next().is_none());
    }
}
