//! Video demux and decode via libav

use std::path::Path;

use ffmpeg_next as ffmpeg;
use ffmpeg::format::Pixel;
use ffmpeg::media::Type as MediaType;
use ffmpeg::software::scaling::{Context as ScaleCtx, Flags as ScaleFlags};
use ffmpeg::util::frame::video::Video as VideoFrame;
use ffmpeg::{codec, format, Packet, Rational};
use tracing::{debug, warn};

use crate::domain::errors::FailureKind;
use crate::domain::model::{Frame, SourceInfo};
use crate::engine::assembler::FrameSource;
use crate::engine::scale::frame_from_video;

fn decode_err(context: &str, e: ffmpeg::Error) -> FailureKind {
    FailureKind::DecodeFailed(format!("{}: {}", context, e))
}

fn open_input(path: &Path) -> Result<format::context::Input, FailureKind> {
    format::input(path).map_err(|e| decode_err("open source", e))
}

/// Stream start time in seconds; `None` when unset
pub(crate) fn stream_start_seconds(stream: &format::stream::Stream) -> Option<f64> {
    let start = stream.start_time();
    if start == ffmpeg::ffi::AV_NOPTS_VALUE {
        return None;
    }
    Some(start as f64 * f64::from(stream.time_base())).filter(|s| s.is_finite())
}

/// Read dimensions, duration and stream layout without decoding frames
pub fn probe(path: &Path) -> Result<SourceInfo, FailureKind> {
    let input = open_input(path)?;

    let stream = input
        .streams()
        .best(MediaType::Video)
        .ok_or_else(|| FailureKind::DecodeFailed("no video stream".to_string()))?;

    let decoder = codec::context::Context::from_parameters(stream.parameters())
        .map_err(|e| decode_err("video decoder context", e))?
        .decoder()
        .video()
        .map_err(|e| decode_err("open video decoder", e))?;

    let container_duration = input.duration();
    let duration_seconds = if container_duration > 0 {
        Some(container_duration as f64 / ffmpeg::ffi::AV_TIME_BASE as f64)
    } else if stream.duration() > 0 {
        Some(stream.duration() as f64 * f64::from(stream.time_base()))
    } else {
        None
    };

    let rate = stream.avg_frame_rate();
    let frame_rate = if rate.numerator() > 0 && rate.denominator() > 0 {
        Some(f64::from(rate))
    } else {
        None
    };

    let info = SourceInfo {
        width: decoder.width(),
        height: decoder.height(),
        duration_seconds,
        frame_rate,
        has_audio: input.streams().best(MediaType::Audio).is_some(),
    };
    debug!(
        width = info.width,
        height = info.height,
        duration = ?info.duration_seconds,
        fps = ?info.frame_rate,
        has_audio = info.has_audio,
        "probed source"
    );
    Ok(info)
}

/// Decoded frames of the best video stream as RGB24 at the stream's display size
pub struct LibavFrameSource {
    input: format::context::Input,
    stream_index: usize,
    time_base: Rational,
    decoder: ffmpeg::decoder::Video,
    width: u32,
    height: u32,
    scaler: Option<(Pixel, u32, u32, ScaleCtx)>,
    decoded: VideoFrame,
    first_timestamp: Option<i64>,
    start_seconds: Option<f64>,
    last_pts: f64,
    frame_interval: f64,
    flushing: bool,
}

impl LibavFrameSource {
    pub fn open(path: &Path) -> Result<Self, FailureKind> {
        let input = open_input(path)?;

        let (stream_index, time_base, parameters, rate, start_seconds) = {
            let stream = input
                .streams()
                .best(MediaType::Video)
                .ok_or_else(|| FailureKind::DecodeFailed("no video stream".to_string()))?;
            (
                stream.index(),
                stream.time_base(),
                stream.parameters(),
                stream.avg_frame_rate(),
                stream_start_seconds(&stream),
            )
        };

        let decoder = codec::context::Context::from_parameters(parameters)
            .map_err(|e| decode_err("video decoder context", e))?
            .decoder()
            .video()
            .map_err(|e| decode_err("open video decoder", e))?;

        let frame_interval = if rate.numerator() > 0 && rate.denominator() > 0 {
            1.0 / f64::from(rate)
        } else {
            1.0 / 30.0
        };

        Ok(Self {
            width: decoder.width(),
            height: decoder.height(),
            input,
            stream_index,
            time_base,
            decoder,
            scaler: None,
            decoded: VideoFrame::empty(),
            first_timestamp: None,
            start_seconds,
            last_pts: -1.0,
            frame_interval,
            flushing: false,
        })
    }

    /// Start time of the video stream in seconds, when the container records one
    pub fn start_seconds(&self) -> Option<f64> {
        self.start_seconds
    }

    /// Push the next packet of our stream into the decoder, or signal EOF
    fn feed(&mut self) -> Result<(), FailureKind> {
        loop {
            let mut packet = Packet::empty();
            match packet.read(&mut self.input) {
                Ok(()) => {
                    if packet.stream() != self.stream_index {
                        continue;
                    }
                    match self.decoder.send_packet(&packet) {
                        Ok(()) => return Ok(()),
                        Err(ffmpeg::Error::InvalidData) => {
                            warn!("skipping corrupt video packet");
                            continue;
                        }
                        Err(e) => return Err(decode_err("send video packet", e)),
                    }
                }
                Err(ffmpeg::Error::Eof) => {
                    self.flushing = true;
                    return self
                        .decoder
                        .send_eof()
                        .map_err(|e| decode_err("flush video decoder", e));
                }
                Err(e) => return Err(decode_err("read packet", e)),
            }
        }
    }

    /// Seconds since the first frame; never moves backwards
    fn rebased_pts(&mut self) -> f64 {
        let pts = match self.decoded.timestamp().or_else(|| self.decoded.pts()) {
            Some(ts) => {
                let first = *self.first_timestamp.get_or_insert(ts);
                (ts - first) as f64 * f64::from(self.time_base)
            }
            None => self.last_pts + self.frame_interval,
        };
        let pts = pts.max(self.last_pts.max(0.0));
        self.last_pts = pts;
        pts
    }

    fn convert(&mut self) -> Result<Frame, FailureKind> {
        let format = self.decoded.format();
        let (in_w, in_h) = (self.decoded.width(), self.decoded.height());
        let stale = !matches!(&self.scaler, Some((f, w, h, _)) if *f == format && *w == in_w && *h == in_h);
        if stale {
            let ctx = ScaleCtx::get(
                format,
                in_w,
                in_h,
                Pixel::RGB24,
                self.width,
                self.height,
                ScaleFlags::BILINEAR,
            )
            .map_err(|e| decode_err("create colour converter", e))?;
            self.scaler = Some((format, in_w, in_h, ctx));
        }

        let pts = self.rebased_pts();
        let mut rgb = VideoFrame::empty();
        match self.scaler.as_mut() {
            Some((_, _, _, ctx)) => ctx
                .run(&self.decoded, &mut rgb)
                .map_err(|e| decode_err("convert frame to rgb", e))?,
            None => {
                return Err(FailureKind::DecodeFailed(
                    "colour converter unavailable".to_string(),
                ))
            }
        }

        Ok(frame_from_video(&rgb, pts))
    }
}

impl FrameSource for LibavFrameSource {
    fn next_frame(&mut self) -> Result<Option<Frame>, FailureKind> {
        loop {
            if self.decoder.receive_frame(&mut self.decoded).is_ok() {
                return self.convert().map(Some);
            }
            if self.flushing {
                return Ok(None);
            }
            self.feed()?;
        }
    }
}
