//! # Export
//!
//! Pull-based render loops that hand frames and audio chunks to sinks, and
//! an ffmpeg-backed encoder built on top of them. Cancellation is checked
//! between frames.

mod ffmpeg;
mod sink;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::audio::AudioClip;
use crate::clip::Timeline;
use crate::error::{ExportError, Result};
use crate::video::VideoClip;

pub use ffmpeg::{EncodedVideo, FfmpegEncoder};
pub use sink::{AudioSink, PngSequenceSink, VideoSink, WavSink};

/// Shared flag for stopping a render from another thread or task.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// What a finished render produced.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderStats {
    /// Video frames, or audio sample frames
    pub frames: usize,
    /// Seconds of media rendered
    pub duration: f64,
    pub elapsed: Duration,
}

/// Render `[0, duration)` of `clip` at `fps` into `sink`.
pub fn render_video(clip: &VideoClip, fps: f64, sink: &mut dyn VideoSink, cancel: &CancelToken) -> Result<RenderStats> {
    let started = Instant::now();
    let frames = clip.iter_frames(fps)?;
    let total = frames.len();
    info!("Rendering '{}': {} frames at {} fps", clip.name(), total, fps);

    let mut written = 0;
    for item in frames {
        if cancel.is_cancelled() {
            return Err(ExportError::Cancelled { frames: written }.into());
        }
        let (t, frame) = item?;
        let mask = clip.mask_at(t)?;
        sink.write_frame(written, &frame, mask.as_ref())?;
        written += 1;

        if written % 100 == 0 {
            debug!("Rendered {}/{} frames", written, total);
        }
    }
    sink.finish()?;

    let stats = RenderStats {
        frames: written,
        duration: clip.require_duration("rendering")?,
        elapsed: started.elapsed(),
    };
    info!("Rendered {} frames in {:.2?}", stats.frames, stats.elapsed);
    Ok(stats)
}

/// Render `[0, duration)` of `clip` at `sample_rate` into `sink`, in chunks
/// of `chunk_size` sample frames.
pub fn render_audio(
    clip: &AudioClip,
    sample_rate: u32,
    chunk_size: usize,
    sink: &mut dyn AudioSink,
    cancel: &CancelToken,
) -> Result<RenderStats> {
    let started = Instant::now();
    info!("Rendering audio '{}' at {} Hz", clip.name(), sample_rate);

    let mut written = 0;
    for chunk in clip.iter_chunks(chunk_size, sample_rate)? {
        if cancel.is_cancelled() {
            return Err(ExportError::Cancelled { frames: written }.into());
        }
        let chunk = chunk?;
        sink.write_chunk(&chunk)?;
        written += chunk.frame_count();
    }
    sink.finish()?;

    let stats = RenderStats {
        frames: written,
        duration: clip.require_duration("rendering")?,
        elapsed: started.elapsed(),
    };
    info!("Rendered {} sample frames in {:.2?}", stats.frames, stats.elapsed);
    Ok(stats)
}
