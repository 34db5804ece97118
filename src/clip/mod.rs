//! # Clip Core
//!
//! A clip is a mapping `t -> frame` plus a [`Timing`] that places it on a
//! parent timeline. The same core serves video frames, opacity masks and
//! audio samples: [`Clip<F>`] is generic over the frame type.
//!
//! Clips are values. Every timeline operation consumes a clip and returns a
//! new one; frame functions are shared behind `Arc`, so copies are cheap and
//! independent transform chains never observe each other.

mod pipeline;
mod time_map;
mod timeline;
mod timing;

pub use pipeline::{ConstantSource, FnFilter, FnSource, FrameFilter, FramePipeline, FrameSource};
pub use time_map::{TimeMap, MIRROR_NUDGE};
pub use timeline::Timeline;
pub use timing::Timing;

use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{ClipError, Result};

/// Bound shared by every frame type a clip can carry.
pub trait FrameData: Clone + Send + Sync + 'static {}

impl<T: Clone + Send + Sync + 'static> FrameData for T {}

/// Which side channels receive a transform together with the main frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApplyTo {
    pub mask: bool,
    pub audio: bool,
}

impl ApplyTo {
    pub const ALL: Self = Self { mask: true, audio: true };
    pub const NONE: Self = Self { mask: false, audio: false };
    pub const MASK: Self = Self { mask: true, audio: false };
}

/// Single-slot cache of the last evaluated frame.
struct FrameMemo<F> {
    slot: Mutex<Option<(f64, F)>>,
}

impl<F: Clone> FrameMemo<F> {
    fn new() -> Self {
        Self { slot: Mutex::new(None) }
    }

    fn get(&self, t: f64) -> Option<F> {
        match &*self.slot.lock() {
            Some((last_t, frame)) if *last_t == t => Some(frame.clone()),
            _ => None,
        }
    }

    fn store(&self, t: f64, frame: &F) {
        *self.slot.lock() = Some((t, frame.clone()));
    }
}

// A copied clip starts with an empty cache.
impl<F: Clone> Clone for FrameMemo<F> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

/// A named, timed frame pipeline.
#[derive(Clone)]
pub struct Clip<F: FrameData> {
    name: String,
    timing: Timing,
    pipeline: FramePipeline<F>,
    memo: Option<FrameMemo<F>>,
}

impl<F: FrameData> Clip<F> {
    pub fn new<S>(name: impl Into<String>, source: S, duration: Option<f64>) -> Self
    where
        S: FrameSource<F> + 'static,
    {
        Self::from_shared(name, Arc::new(source), duration)
    }

    pub fn from_shared(name: impl Into<String>, source: Arc<dyn FrameSource<F>>, duration: Option<f64>) -> Self {
        Self {
            name: name.into(),
            timing: Timing::from_duration(duration),
            pipeline: FramePipeline::new(source),
            memo: None,
        }
    }

    pub fn from_fn<G>(name: impl Into<String>, duration: Option<f64>, func: G) -> Self
    where
        G: Fn(f64) -> Result<F> + Send + Sync + 'static,
    {
        Self::new(name, FnSource::new(func), duration)
    }

    /// A clip showing `frame` at every time.
    pub fn constant(name: impl Into<String>, frame: F, duration: Option<f64>) -> Self {
        Self::new(name, ConstantSource::new(frame), duration)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Cache the last evaluated frame, so repeated queries at the same `t`
    /// skip the pipeline.
    pub fn with_memoize(mut self, enabled: bool) -> Self {
        self.memo = enabled.then(FrameMemo::new);
        self
    }

    pub fn is_memoized(&self) -> bool {
        self.memo.is_some()
    }

    /// The frame at clip-local time `t`.
    pub fn frame_at(&self, t: f64) -> Result<F> {
        let Some(memo) = &self.memo else {
            return self.pipeline.frame_at(t);
        };
        if let Some(frame) = memo.get(t) {
            return Ok(frame);
        }
        let frame = self.pipeline.frame_at(t)?;
        memo.store(t, &frame);
        Ok(frame)
    }

    /// Evaluate without touching the memo, for concurrent callers.
    pub fn frame_at_uncached(&self, t: f64) -> Result<F> {
        self.pipeline.frame_at(t)
    }

    /// Append a frame filter.
    ///
    /// When both the clip and the filter ignore time, the filter is run once
    /// here and the clip becomes a constant holding the result.
    pub fn image_transform<T>(self, filter: T) -> Result<Self>
    where
        T: FrameFilter<F> + 'static,
    {
        self.with_filter(Arc::new(filter))
    }

    pub fn with_filter(mut self, filter: Arc<dyn FrameFilter<F>>) -> Result<Self> {
        if self.pipeline.is_time_invariant() && filter.is_time_invariant() {
            let frame = filter.apply(self.pipeline.frame_at(0.0)?, 0.0)?;
            self.pipeline = FramePipeline::new(Arc::new(ConstantSource::new(frame)));
        } else {
            self.pipeline.push_filter(filter);
        }
        self.reset_memo();
        Ok(self)
    }

    /// Append a closure filter.
    pub fn map_frames<G>(self, name: &str, func: G) -> Result<Self>
    where
        G: Fn(F, f64) -> Result<F> + Send + Sync + 'static,
    {
        self.image_transform(FnFilter::new(name, func))
    }

    pub fn is_time_invariant(&self) -> bool {
        self.pipeline.is_time_invariant()
    }

    pub fn is_stateful(&self) -> bool {
        self.pipeline.is_stateful()
    }

    /// Where in the original source the frame for `t` comes from.
    pub fn source_time(&self, t: f64) -> f64 {
        self.pipeline.source_time(t)
    }

    pub fn pipeline(&self) -> &FramePipeline<F> {
        &self.pipeline
    }

    /// Replace the timing without validation, for derived side channels.
    pub(crate) fn with_timing(mut self, timing: Timing) -> Self {
        self.timing = timing;
        self
    }

    fn reset_memo(&mut self) {
        if self.memo.is_some() {
            self.memo = Some(FrameMemo::new());
        }
    }
}

impl<F: FrameData> Timeline for Clip<F> {
    fn name(&self) -> &str {
        &self.name
    }

    fn timing(&self) -> Timing {
        self.timing
    }

    fn map_timing<U>(mut self, update: U) -> Result<Self>
    where
        U: Fn(Timing) -> std::result::Result<Timing, String>,
    {
        match update(self.timing) {
            Ok(timing) => {
                self.timing = timing;
                Ok(self)
            }
            Err(reason) => {
                Err(ClipError::invalid_range(&self.name, self.timing.start(), self.timing.end(), reason).into())
            }
        }
    }

    fn time_transform(mut self, map: TimeMap, keep_duration: bool) -> Self {
        self.pipeline.push_time(map);
        if !keep_duration {
            self.timing = self.timing.open_ended();
        }
        self.reset_memo();
        self
    }
}

impl<F: FrameData> std::fmt::Debug for Clip<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Clip")
            .field("name", &self.name)
            .field("timing", &self.timing)
            .field("stages", &self.pipeline.len())
            .field("memoized", &self.memo.is_some())
            .finish()
    }
}
