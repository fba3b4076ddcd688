//! H.264 + AAC MP4 writer for finished note frames
//!
//! Stream 0 is H.264 (YUV420P, square pixels), stream 1 is AAC (planar
//! float stereo, 44.1 kHz). Video pts is the output frame index in `1/fps`;
//! audio pts is the sample counter in `1/44100`. Audio is pumped after every
//! video frame so the muxer receives both streams interleaved, and it always
//! stops at exactly `frames / fps` seconds.

use std::path::Path;

use ffmpeg_next as ffmpeg;
use ffmpeg::format::sample::Type as SampleType;
use ffmpeg::format::{Pixel, Sample};
use ffmpeg::software::scaling::{Context as ScaleCtx, Flags as ScaleFlags};
use ffmpeg::util::channel_layout::ChannelLayout;
use ffmpeg::util::frame::audio::Audio as AudioFrame;
use ffmpeg::util::frame::video::Video as VideoFrame;
use ffmpeg::{codec, encoder, format, Dictionary, Packet, Rational};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::domain::errors::FailureKind;
use crate::domain::model::{Frame, Limits};
use crate::engine::audio::{AudioDemux, AudioFifo, AUDIO_RATE};
use crate::engine::scale::video_from_frame;

const VIDEO_STREAM: usize = 0;
const AUDIO_STREAM: usize = 1;

/// Fixed output profile
#[derive(Debug, Clone, PartialEq)]
pub struct EncodeProfile {
    pub side: u32,
    pub fps: u32,
    pub video_codec: String,
    pub audio_codec: String,
    pub crf: u8,
    pub preset: String,
    pub audio_bit_rate: usize,
}

impl EncodeProfile {
    pub fn from_limits(limits: &Limits) -> Self {
        Self {
            side: limits.target_square_size,
            fps: limits.target_fps,
            video_codec: limits.video_codec.clone(),
            audio_codec: limits.audio_codec.clone(),
            crf: 23,
            preset: "veryfast".to_string(),
            audio_bit_rate: 128_000,
        }
    }

    /// Audio samples that line up with the end of `frames` video frames
    pub fn samples_for_frames(&self, frames: u64) -> u64 {
        frames * AUDIO_RATE as u64 / self.fps.max(1) as u64
    }
}

fn encode_err(context: &str, e: ffmpeg::Error) -> FailureKind {
    FailureKind::EncodeFailed(format!("{}: {}", context, e))
}

/// Look up an encoder by name, falling back to the default encoder for `id`
fn find_encoder(name: &str, id: codec::Id) -> Result<ffmpeg::Codec, FailureKind> {
    match encoder::find_by_name(name) {
        Some(found) if found.id() == id => Ok(found),
        Some(found) => Err(FailureKind::EncodeFailed(format!(
            "encoder {} produces {:?}, expected {:?}",
            name,
            found.id(),
            id
        ))),
        None => {
            warn!(encoder = name, "encoder not available, using default for codec");
            encoder::find(id).ok_or_else(|| {
                FailureKind::EncodeFailed(format!("no encoder available for {:?}", id))
            })
        }
    }
}

/// Summary of a finished encode
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EncodeStats {
    pub frames: u64,
    pub audio_samples: u64,
}

pub struct NoteEncoder {
    octx: format::context::Output,
    profile: EncodeProfile,
    cancel: CancellationToken,

    video: encoder::Video,
    video_tb: Rational,
    video_ost_tb: Rational,
    to_yuv: ScaleCtx,
    frames_written: u64,

    audio: encoder::Audio,
    audio_tb: Rational,
    audio_ost_tb: Rational,
    audio_frame_size: usize,
    small_last_frame: bool,
    fifo: AudioFifo,
    audio_source: Option<AudioDemux>,
    samples_sent: u64,
}

impl NoteEncoder {
    /// Create the output file, open both encoders and write the header
    pub fn open(
        output: &Path,
        profile: EncodeProfile,
        audio_source: Option<AudioDemux>,
        cancel: CancellationToken,
    ) -> Result<Self, FailureKind> {
        let mut octx = format::output(output).map_err(|e| encode_err("open output", e))?;
        let global_header = octx
            .format()
            .flags()
            .contains(format::Flags::GLOBAL_HEADER);

        let video_tb = Rational::new(1, profile.fps as i32);
        let h264 = find_encoder(&profile.video_codec, codec::Id::H264)?;
        let video = {
            let mut ost = octx
                .add_stream(h264)
                .map_err(|e| encode_err("add video stream", e))?;

            let mut enc = codec::context::Context::new_with_codec(h264)
                .encoder()
                .video()
                .map_err(|e| encode_err("video encoder context", e))?;
            enc.set_width(profile.side);
            enc.set_height(profile.side);
            enc.set_format(Pixel::YUV420P);
            enc.set_time_base(video_tb);
            enc.set_frame_rate(Some(Rational::new(profile.fps as i32, 1)));
            enc.set_aspect_ratio(Rational::new(1, 1));
            if global_header {
                enc.set_flags(codec::Flags::GLOBAL_HEADER);
            }

            let mut opts = Dictionary::new();
            opts.set("crf", &profile.crf.to_string());
            opts.set("preset", &profile.preset);

            let opened = enc
                .open_with(opts)
                .map_err(|e| encode_err("open video encoder", e))?;
            ost.set_parameters(&opened);
            ost.set_time_base(video_tb);
            opened
        };

        let audio_tb = Rational::new(1, AUDIO_RATE as i32);
        let aac = find_encoder(&profile.audio_codec, codec::Id::AAC)?;
        let small_last_frame = aac
            .capabilities()
            .contains(codec::capabilities::Capabilities::SMALL_LAST_FRAME);
        let audio = {
            let mut ost = octx
                .add_stream(aac)
                .map_err(|e| encode_err("add audio stream", e))?;

            let mut enc = codec::context::Context::new_with_codec(aac)
                .encoder()
                .audio()
                .map_err(|e| encode_err("audio encoder context", e))?;
            enc.set_rate(AUDIO_RATE as i32);
            enc.set_channel_layout(ChannelLayout::STEREO);
            enc.set_format(Sample::F32(SampleType::Planar));
            enc.set_bit_rate(profile.audio_bit_rate);
            enc.set_time_base(audio_tb);
            if global_header {
                enc.set_flags(codec::Flags::GLOBAL_HEADER);
            }

            let opened = enc
                .open_as(aac)
                .map_err(|e| encode_err("open audio encoder", e))?;
            ost.set_parameters(&opened);
            ost.set_time_base(audio_tb);
            opened
        };
        let audio_frame_size = match audio.frame_size() {
            0 => 1024,
            n => n as usize,
        };

        octx.write_header()
            .map_err(|e| encode_err("write output header", e))?;

        // The muxer may pick its own stream time bases while writing the header
        let video_ost_tb = octx
            .stream(VIDEO_STREAM)
            .map(|s| s.time_base())
            .ok_or_else(|| FailureKind::EncodeFailed("video stream missing".to_string()))?;
        let audio_ost_tb = octx
            .stream(AUDIO_STREAM)
            .map(|s| s.time_base())
            .ok_or_else(|| FailureKind::EncodeFailed("audio stream missing".to_string()))?;

        let to_yuv = ScaleCtx::get(
            Pixel::RGB24,
            profile.side,
            profile.side,
            Pixel::YUV420P,
            profile.side,
            profile.side,
            ScaleFlags::BILINEAR,
        )
        .map_err(|e| encode_err("create yuv converter", e))?;

        info!(
            output = %output.display(),
            side = profile.side,
            fps = profile.fps,
            source_audio = audio_source.is_some(),
            "encoder opened"
        );

        Ok(Self {
            octx,
            profile,
            cancel,
            video,
            video_tb,
            video_ost_tb,
            to_yuv,
            frames_written: 0,
            audio,
            audio_tb,
            audio_ost_tb,
            audio_frame_size,
            small_last_frame,
            fifo: AudioFifo::new(),
            audio_source,
            samples_sent: 0,
        })
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    /// Encode the next output frame and the audio that accompanies it
    pub fn write_frame(&mut self, frame: &Frame) -> Result<(), FailureKind> {
        if frame.width != self.profile.side || frame.height != self.profile.side {
            return Err(FailureKind::EncodeFailed(format!(
                "frame is {}x{}, expected {}x{}",
                frame.width, frame.height, self.profile.side, self.profile.side
            )));
        }

        let rgb = video_from_frame(frame);
        let mut yuv = VideoFrame::empty();
        self.to_yuv
            .run(&rgb, &mut yuv)
            .map_err(|e| encode_err("convert frame to yuv", e))?;
        yuv.set_pts(Some(self.frames_written as i64));

        self.video
            .send_frame(&yuv)
            .map_err(|e| encode_err("send video frame", e))?;
        self.drain_video()?;
        self.frames_written += 1;

        let target = self.profile.samples_for_frames(self.frames_written);
        self.pump_audio(target, false)
    }

    /// Flush both encoders, close the audio at the video end, write the trailer
    pub fn finish(mut self) -> Result<EncodeStats, FailureKind> {
        self.video
            .send_eof()
            .map_err(|e| encode_err("flush video encoder", e))?;
        self.drain_video()?;

        let target = self.profile.samples_for_frames(self.frames_written);
        self.pump_audio(target, true)?;
        self.audio
            .send_eof()
            .map_err(|e| encode_err("flush audio encoder", e))?;
        self.drain_audio()?;

        self.octx
            .write_trailer()
            .map_err(|e| encode_err("write trailer", e))?;

        debug!(
            frames = self.frames_written,
            samples = self.samples_sent,
            "encoder finished"
        );
        Ok(EncodeStats {
            frames: self.frames_written,
            audio_samples: self.samples_sent,
        })
    }

    fn drain_video(&mut self) -> Result<(), FailureKind> {
        let mut packet = Packet::empty();
        while self.video.receive_packet(&mut packet).is_ok() {
            packet.set_stream(VIDEO_STREAM);
            packet.rescale_ts(self.video_tb, self.video_ost_tb);
            packet
                .write_interleaved(&mut self.octx)
                .map_err(|e| encode_err("write video packet", e))?;
        }
        Ok(())
    }

    fn drain_audio(&mut self) -> Result<(), FailureKind> {
        let mut packet = Packet::empty();
        while self.audio.receive_packet(&mut packet).is_ok() {
            packet.set_stream(AUDIO_STREAM);
            packet.rescale_ts(self.audio_tb, self.audio_ost_tb);
            packet
                .write_interleaved(&mut self.octx)
                .map_err(|e| encode_err("write audio packet", e))?;
        }
        Ok(())
    }

    /// Make sure `samples` are buffered, from the source while it lasts, then silence
    fn buffer_audio(&mut self, samples: usize) {
        if self.fifo.len() >= samples {
            return;
        }
        if let Some(source) = self.audio_source.as_mut() {
            if let Err(e) = source.fill(&mut self.fifo, samples) {
                warn!(error = %e, "source audio unreadable, continuing with silence");
                self.audio_source = None;
            } else if source.is_done() {
                self.audio_source = None;
            }
        }
        if self.fifo.len() < samples {
            self.fifo.push_silence(samples - self.fifo.len());
        }
    }

    /// Encode audio up to `target` samples. A trailing partial frame is only
    /// sent on the final pump.
    fn pump_audio(&mut self, target: u64, final_pump: bool) -> Result<(), FailureKind> {
        loop {
            if self.cancel.is_cancelled() {
                return Err(FailureKind::Cancelled);
            }

            let remaining = target.saturating_sub(self.samples_sent);
            let frame_size = self.audio_frame_size;
            let samples = if remaining >= frame_size as u64 {
                frame_size
            } else if final_pump && remaining > 0 {
                remaining as usize
            } else {
                break;
            };

            self.buffer_audio(samples);
            let (left, right) = self.fifo.pop(samples);

            // Encoders without small-last-frame support get a zero-padded full frame
            let frame_len = if samples < frame_size && !self.small_last_frame {
                frame_size
            } else {
                samples
            };
            let mut frame = AudioFrame::new(
                Sample::F32(SampleType::Planar),
                frame_len,
                ChannelLayout::STEREO,
            );
            frame.set_rate(AUDIO_RATE);
            frame.set_pts(Some(self.samples_sent as i64));
            write_plane(frame.plane_mut::<f32>(0), &left);
            write_plane(frame.plane_mut::<f32>(1), &right);

            self.audio
                .send_frame(&frame)
                .map_err(|e| encode_err("send audio frame", e))?;
            self.drain_audio()?;
            self.samples_sent += samples as u64;
        }

        if final_pump {
            // Anything left is past the video end
            self.fifo.clear();
        }
        Ok(())
    }
}

fn write_plane(dst: &mut [f32], src: &[f32]) {
    let n = src.len().min(dst.len());
    dst[..n].copy_from_slice(&src[..n]);
    dst[n..].fill(0.0);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_from_default_limits() {
        let profile = EncodeProfile::from_limits(&Limits::default());
        assert_eq!(profile.side, 320);
        assert_eq!(profile.fps, 30);
        assert_eq!(profile.video_codec, "libx264");
        assert_eq!(profile.crf, 23);
        assert_eq!(profile.preset, "veryfast");
    }

    #[test]
    fn test_audio_ends_with_video() {
        let profile = EncodeProfile::from_limits(&Limits::default());
        // 20 s at 30 fps
        assert_eq!(profile.samples_for_frames(600), 20 * 44_100);
        assert_eq!(profile.samples_for_frames(1), 1_470);
        assert_eq!(profile.samples_for_frames(0), 0);
    }

    #[test]
    fn test_write_plane_pads() {
        let mut dst = [1.0f32; 4];
        write_plane(&mut dst, &[0.5, 0.25]);
        assert_eq!(dst, [0.5, 0.25, 0.0, 0.0]);
    }
}
