//! Source audio: independent demux, resample to stereo float, FIFO buffering
//!
//! Audio is read from its own demux of the source so that video decoding
//! never has to hold audio packets. Everything is converted to planar f32
//! stereo at [`AUDIO_RATE`] before it reaches the FIFO.

use std::path::Path;

use ffmpeg_next as ffmpeg;
use ffmpeg::format::sample::Type as SampleType;
use ffmpeg::format::Sample;
use ffmpeg::media::Type as MediaType;
use ffmpeg::software::resampling;
use ffmpeg::util::channel_layout::ChannelLayout;
use ffmpeg::util::frame::audio::Audio as AudioFrame;
use ffmpeg::{codec, format, Packet};
use tracing::{debug, warn};

use crate::domain::errors::FailureKind;
use crate::engine::decoder::stream_start_seconds;

/// Output sample rate
pub const AUDIO_RATE: u32 = 44_100;

/// Offsets beyond this are treated as broken timestamps and ignored
const MAX_START_OFFSET_SECONDS: f64 = 30.0;

/// How the audio must be shifted so its first sample lines up with the first video frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartAlignment {
    Aligned,
    /// Audio starts late: prepend this many silent samples
    Pad(usize),
    /// Audio starts early: discard this many leading samples
    Trim(usize),
}

impl StartAlignment {
    /// Alignment for audio starting at `audio_start` against video starting at `video_start`
    pub fn between(audio_start: Option<f64>, video_start: Option<f64>) -> Self {
        let (Some(audio), Some(video)) = (audio_start, video_start) else {
            return Self::Aligned;
        };
        let offset = audio - video;
        if !offset.is_finite() || offset.abs() > MAX_START_OFFSET_SECONDS {
            warn!(offset, "ignoring implausible audio start offset");
            return Self::Aligned;
        }
        let samples = (offset.abs() * AUDIO_RATE as f64).round() as usize;
        match samples {
            0 => Self::Aligned,
            n if offset > 0.0 => Self::Pad(n),
            n => Self::Trim(n),
        }
    }
}

/// Planar stereo sample buffer
#[derive(Debug, Default)]
pub struct AudioFifo {
    left: Vec<f32>,
    right: Vec<f32>,
}

impl AudioFifo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Samples buffered per channel
    pub fn len(&self) -> usize {
        self.left.len()
    }

    pub fn is_empty(&self) -> bool {
        self.left.is_empty()
    }

    /// Append one block; a mono block (empty `right`) is duplicated to both channels
    pub fn push(&mut self, left: &[f32], right: &[f32]) {
        self.left.extend_from_slice(left);
        if right.is_empty() {
            self.right.extend_from_slice(left);
        } else {
            debug_assert_eq!(left.len(), right.len());
            self.right.extend_from_slice(right);
        }
    }

    pub fn push_silence(&mut self, samples: usize) {
        self.left.resize(self.left.len() + samples, 0.0);
        self.right.resize(self.right.len() + samples, 0.0);
    }

    /// Remove `n` samples from the front, zero-padding if fewer are buffered
    pub fn pop(&mut self, n: usize) -> (Vec<f32>, Vec<f32>) {
        let available = self.left.len().min(n);
        let mut left: Vec<f32> = self.left.drain(..available).collect();
        let mut right: Vec<f32> = self.right.drain(..available).collect();
        left.resize(n, 0.0);
        right.resize(n, 0.0);
        (left, right)
    }

    pub fn clear(&mut self) {
        self.left.clear();
        self.right.clear();
    }
}

/// Decoder for the best audio stream of a source
pub struct AudioDemux {
    input: format::context::Input,
    stream_index: usize,
    decoder: ffmpeg::decoder::Audio,
    resampler: Option<resampling::Context>,
    raw: AudioFrame,
    start_seconds: Option<f64>,
    pending_pad: usize,
    pending_trim: usize,
    flushing: bool,
    done: bool,
}

fn audio_err(context: &str, e: ffmpeg::Error) -> FailureKind {
    FailureKind::DecodeFailed(format!("{}: {}", context, e))
}

impl AudioDemux {
    /// Open the source's audio; `Ok(None)` when it has no audio stream
    pub fn open(path: &Path) -> Result<Option<Self>, FailureKind> {
        let input = format::input(path).map_err(|e| audio_err("open source for audio", e))?;

        let (stream_index, parameters, start_seconds) = match input.streams().best(MediaType::Audio) {
            Some(stream) => (stream.index(), stream.parameters(), stream_start_seconds(&stream)),
            None => return Ok(None),
        };

        let decoder = codec::context::Context::from_parameters(parameters)
            .map_err(|e| audio_err("audio decoder context", e))?
            .decoder()
            .audio()
            .map_err(|e| audio_err("open audio decoder", e))?;

        debug!(stream_index, rate = decoder.rate(), "opened source audio");
        Ok(Some(Self {
            input,
            stream_index,
            decoder,
            resampler: None,
            raw: AudioFrame::empty(),
            start_seconds,
            pending_pad: 0,
            pending_trim: 0,
            flushing: false,
            done: false,
        }))
    }

    /// Shift the audio so it starts together with a video stream starting at `video_start`
    pub fn align_to(&mut self, video_start: Option<f64>) {
        let alignment = StartAlignment::between(self.start_seconds, video_start);
        if alignment != StartAlignment::Aligned {
            debug!(?alignment, audio_start = ?self.start_seconds, ?video_start, "aligning audio start");
        }
        (self.pending_pad, self.pending_trim) = match alignment {
            StartAlignment::Aligned => (0, 0),
            StartAlignment::Pad(n) => (n, 0),
            StartAlignment::Trim(n) => (0, n),
        };
    }

    /// All source audio has been decoded
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Decode until `fifo` holds at least `want` samples or the stream ends
    pub fn fill(&mut self, fifo: &mut AudioFifo, want: usize) -> Result<(), FailureKind> {
        if self.pending_pad > 0 {
            fifo.push_silence(self.pending_pad);
            self.pending_pad = 0;
        }
        while fifo.len() < want && !self.done {
            if self.decoder.receive_frame(&mut self.raw).is_ok() {
                self.resample_into(fifo)?;
                continue;
            }
            if self.flushing {
                self.done = true;
                break;
            }
            self.feed()?;
        }
        Ok(())
    }

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
                            warn!("skipping corrupt audio packet");
                            continue;
                        }
                        Err(e) => return Err(audio_err("send audio packet", e)),
                    }
                }
                Err(ffmpeg::Error::Eof) => {
                    self.flushing = true;
                    return self
                        .decoder
                        .send_eof()
                        .map_err(|e| audio_err("flush audio decoder", e));
                }
                Err(e) => return Err(audio_err("read audio packet", e)),
            }
        }
    }

    fn resample_into(&mut self, fifo: &mut AudioFifo) -> Result<(), FailureKind> {
        let samples = self.raw.samples();
        let rate = self.raw.rate();
        if samples == 0 || rate == 0 {
            return Ok(());
        }

        if self.resampler.is_none() {
            let layout = self.raw.channel_layout();
            let layout = if layout.is_empty() {
                ChannelLayout::default(self.raw.channels() as i32)
            } else {
                layout
            };
            let ctx = resampling::Context::get(
                self.raw.format(),
                layout,
                rate,
                Sample::F32(SampleType::Planar),
                ChannelLayout::STEREO,
                AUDIO_RATE,
            )
            .map_err(|e| audio_err("create audio resampler", e))?;
            self.resampler = Some(ctx);
        }

        // Pre-size the output so upsampling never backs up inside swresample
        let capacity = (samples as u64 * AUDIO_RATE as u64 / rate as u64) as usize + 256;
        let mut converted = AudioFrame::new(
            Sample::F32(SampleType::Planar),
            capacity,
            ChannelLayout::STEREO,
        );

        if let Some(resampler) = self.resampler.as_mut() {
            resampler
                .run(&self.raw, &mut converted)
                .map_err(|e| audio_err("resample audio", e))?;
        }

        let produced = converted.samples();
        let skip = self.pending_trim.min(produced);
        self.pending_trim -= skip;
        if produced > skip {
            fifo.push(
                &converted.plane::<f32>(0)[skip..produced],
                &converted.plane::<f32>(1)[skip..produced],
            );
        }
        Ok(())
    }
}
