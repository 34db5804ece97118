use rayon::prelude::*;
use tracing::{debug, info};

use crate::clip::Timeline;
use crate::error::{ClipError, Result, VideoError};
use crate::time::TimeBase;
use crate::video::clip::VideoClip;
use crate::video::types::Frame;

/// Evaluates independent frame times of one clip on a rayon pool.
///
/// Frames are computed without the memo. Stateful clips (world clips, or
/// composites containing one) are refused, since their frames depend on
/// query order.
pub struct BatchRenderer {
    pool: rayon::ThreadPool,
    threads: usize,
}

impl BatchRenderer {
    /// A pool of `threads` workers, or one per CPU.
    pub fn new(threads: Option<usize>) -> Result<Self> {
        let threads = threads.unwrap_or_else(num_cpus::get);
        if threads == 0 {
            return Err(VideoError::InvalidParameters {
                details: "batch rendering needs at least one thread".to_string(),
            }
            .into());
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .map_err(|e| VideoError::InvalidParameters {
                details: format!("failed to build rayon thread pool: {}", e),
            })?;
        info!("Batch renderer using {} threads", threads);
        Ok(Self { pool, threads })
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Frames at each of `times`, in the same order.
    pub fn render_frames(&self, clip: &VideoClip, times: &[f64]) -> Result<Vec<Frame>> {
        if clip.is_stateful() {
            return Err(ClipError::StatefulClip {
                clip: clip.name().to_string(),
            }
            .into());
        }

        debug!("Rendering {} frames of '{}' in parallel", times.len(), clip.name());
        self.pool
            .install(|| times.par_iter().map(|&t| clip.frame_at_uncached(t)).collect())
    }

    /// Every frame of `[0, duration)` at `fps`.
    pub fn render_all(&self, clip: &VideoClip, fps: f64) -> Result<Vec<Frame>> {
        let duration = clip.require_duration("batch rendering")?;
        let times = TimeBase::new(fps)?.frame_times(duration);
        self.render_frames(clip, &times)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::video::sources::World;
    use crate::CompositorError;

    fn gradient() -> VideoClip {
        VideoClip::from_fn("gradient", Some((1, 1)), Some(1.0), |t| {
            Ok(Frame::new_filled(1, 1, [(t * 100.0).round() as u8, 0, 0]))
        })
    }

    #[test]
    fn test_parallel_frames_match_sequential() {
        let renderer = BatchRenderer::new(Some(3)).unwrap();
        let clip = gradient();
        let frames = renderer.render_all(&clip, 10.0).unwrap();
        assert_eq!(frames.len(), 10);
        for (i, frame) in frames.iter().enumerate() {
            assert_eq!(*frame, clip.frame_at(i as f64 / 10.0).unwrap());
        }
    }

    struct Ticker(f64);

    impl World for Ticker {
        fn clock(&self) -> f64 {
            self.0
        }

        fn step(&mut self) -> Result<()> {
            self.0 += 1.0;
            Ok(())
        }

        fn render(&self) -> Result<Frame> {
            Ok(Frame::new_black(1, 1))
        }
    }

    #[test]
    fn test_stateful_clip_refused() {
        let renderer = BatchRenderer::new(Some(2)).unwrap();
        let clip = VideoClip::from_world("ticker", Ticker(0.0), Some(3.0)).unwrap();
        let err = renderer.render_frames(&clip, &[0.0, 1.0]).unwrap_err();
        assert!(matches!(err, CompositorError::Clip(ClipError::StatefulClip { .. })));
    }

    #[test]
    fn test_zero_threads_rejected() {
        assert!(BatchRenderer::new(Some(0)).is_err());
        assert!(BatchRenderer::new(None).unwrap().threads() >= 1);
    }
}
