// LibAV adapter - Probing and note transcoding through ffmpeg-next

use std::path::Path;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::domain::errors::*;
use crate::domain::model::*;
use crate::engine::audio::AudioDemux;
use crate::engine::decoder::{self, LibavFrameSource};
use crate::engine::scale::SwsResizer;
use crate::engine::{ClipAssembler, EncodeProfile, FrameSchedule, NoteEncoder, PROGRESS_INTERVAL};
use crate::ports::*;

/// Media backend built on libavformat/libavcodec/libswscale/libswresample
#[derive(Debug, Clone, Default)]
pub struct LibavTranscoder;

impl LibavTranscoder {
    pub fn new() -> Self {
        Self
    }
}

impl TranscodePort for LibavTranscoder {
    fn probe(&self, source: &Path) -> Result<SourceInfo, FailureKind> {
        decoder::probe(source)
    }

    fn transcode(
        &self,
        request: &TranscodeRequest,
        cancel: &CancellationToken,
        events: &mut dyn FnMut(TranscodeEvent),
    ) -> Result<TranscodeSummary, FailureKind> {
        let limits = &request.limits;
        let duration = request.effective_duration();
        let schedule = FrameSchedule::new(limits.target_fps, duration);

        let source = LibavFrameSource::open(&request.source)?;
        let video_start = source.start_seconds();
        let mut assembler = ClipAssembler::new(
            source,
            SwsResizer::new(),
            request.crop,
            limits.target_square_size,
            schedule,
        );
        if request.info.duration_seconds.is_none() {
            assembler = assembler.trim_to_source();
        }

        let audio = if request.info.has_audio {
            match AudioDemux::open(&request.source) {
                Ok(Some(mut audio)) => {
                    audio.align_to(video_start);
                    Some(audio)
                }
                Ok(None) => None,
                Err(e) => {
                    warn!(error = %e, "source audio unusable, writing a silent track");
                    None
                }
            }
        } else {
            None
        };
        let source_audio = audio.is_some();

        let mut encoder = NoteEncoder::open(
            &request.output,
            EncodeProfile::from_limits(limits),
            audio,
            cancel.clone(),
        )?;
        events(TranscodeEvent::EncoderOpened);

        for frame in assembler.by_ref() {
            if cancel.is_cancelled() {
                return Err(FailureKind::Cancelled);
            }
            encoder.write_frame(&frame?)?;

            let written = encoder.frames_written();
            if written % PROGRESS_INTERVAL == 0 {
                events(TranscodeEvent::Progress { frames: written });
            }
        }
        if cancel.is_cancelled() {
            return Err(FailureKind::Cancelled);
        }
        if encoder.frames_written() == 0 {
            return Err(FailureKind::DecodeFailed(
                "source contains no decodable video frames".to_string(),
            ));
        }

        let stats = encoder.finish()?;
        let summary = TranscodeSummary {
            frames: stats.frames,
            duration_seconds: schedule.output_duration(stats.frames),
            source_audio,
        };
        info!(
            frames = summary.frames,
            duration = summary.duration_seconds,
            source_frames = assembler.source_frames(),
            processed_frames = assembler.processed_frames(),
            "transcode complete"
        );
        Ok(summary)
    }
}
