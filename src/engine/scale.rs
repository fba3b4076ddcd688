//! Conversions between libav frames and packed RGB frames

use ffmpeg_next as ffmpeg;
use ffmpeg::format::Pixel;
use ffmpeg::software::scaling::{Context as ScaleCtx, Flags as ScaleFlags};
use ffmpeg::util::frame::video::Video as VideoFrame;

use crate::domain::errors::FailureKind;
use crate::domain::model::Frame;
use crate::engine::assembler::FrameResizer;

/// Copy an RGB24 libav frame (rows may be padded) into a tight `Frame`
pub fn frame_from_video(video: &VideoFrame, pts: f64) -> Frame {
    let width = video.width();
    let height = video.height();
    let row_bytes = width as usize * Frame::CHANNELS;
    let stride = video.stride(0);
    let plane = video.data(0);

    let mut data = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        data.extend_from_slice(&plane[start..start + row_bytes]);
    }

    Frame {
        width,
        height,
        pts,
        data,
    }
}

/// Copy a `Frame` into a freshly allocated RGB24 libav frame
pub fn video_from_frame(frame: &Frame) -> VideoFrame {
    let mut video = VideoFrame::new(Pixel::RGB24, frame.width, frame.height);
    let row_bytes = frame.row_len();
    let stride = video.stride(0);
    let plane = video.data_mut(0);

    for (row, src) in frame.data.chunks_exact(row_bytes).enumerate() {
        let start = row * stride;
        plane[start..start + row_bytes].copy_from_slice(src);
    }
    video
}

/// Bilinear RGB-to-RGB scaler, rebuilt only when the input side changes
#[derive(Default)]
pub struct SwsResizer {
    scaler: Option<(u32, u32, ScaleCtx)>,
}

impl SwsResizer {
    pub fn new() -> Self {
        Self::default()
    }

    fn scaler_for(&mut self, from: u32, to: u32) -> Result<&mut ScaleCtx, FailureKind> {
        let stale = !matches!(&self.scaler, Some((f, t, _)) if *f == from && *t == to);
        if stale {
            let ctx = ScaleCtx::get(
                Pixel::RGB24,
                from,
                from,
                Pixel::RGB24,
                to,
                to,
                ScaleFlags::BILINEAR,
            )
            .map_err(|e| FailureKind::EncodeFailed(format!("create resize context: {}", e)))?;
            self.scaler = Some((from, to, ctx));
        }

        match self.scaler.as_mut() {
            Some((_, _, ctx)) => Ok(ctx),
            None => Err(FailureKind::EncodeFailed("resize context unavailable".to_string())),
        }
    }
}

impl FrameResizer for SwsResizer {
    fn resize(&mut self, frame: &Frame, side: u32) -> Result<Frame, FailureKind> {
        let input = video_from_frame(frame);
        let scaler = self.scaler_for(frame.width, side)?;

        let mut output = VideoFrame::empty();
        scaler
            .run(&input, &mut output)
            .map_err(|e| FailureKind::EncodeFailed(format!("resize frame: {}", e)))?;

        Ok(frame_from_video(&output, frame.pts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rgb_copy_survives_row_padding() {
        let mut frame = Frame::black(7, 3, 0.5);
        for y in 0..3 {
            for x in 0..7 {
                frame.set_pixel(x, y, [x as u8 * 30, y as u8 * 80, 9]);
            }
        }

        let video = video_from_frame(&frame);
        assert!(video.stride(0) >= frame.row_len());

        let back = frame_from_video(&video, 0.5);
        assert_eq!(back, frame);
    }

    #[test]
    fn test_resize_uniform_frame() {
        ffmpeg::init().unwrap();
        let mut frame = Frame::black(64, 64, 0.0);
        frame.data.fill(128);

        let mut resizer = SwsResizer::new();
        let out = resizer.resize(&frame, 32).unwrap();

        assert_eq!((out.width, out.height), (32, 32));
        assert!(out.data.iter().all(|&v| (v as i32 - 128).abs() <= 2));
    }
}
