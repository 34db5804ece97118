//! Frame sources, frame filters and the ordered pipeline that chains them.

use std::sync::Arc;

use crate::error::Result;

use super::time_map::TimeMap;

/// Produces the frame shown at clip-local time `t`.
pub trait FrameSource<F>: Send + Sync {
    fn frame_at(&self, t: f64) -> Result<F>;

    /// The same frame is returned for every `t`.
    fn is_time_invariant(&self) -> bool {
        false
    }

    /// Evaluation mutates hidden state, so queries must arrive in time order.
    fn is_stateful(&self) -> bool {
        false
    }
}

/// A per-frame transform `(frame, t) -> frame`.
pub trait FrameFilter<F>: Send + Sync {
    fn name(&self) -> &str;

    fn apply(&self, frame: F, t: f64) -> Result<F>;

    fn is_time_invariant(&self) -> bool {
        false
    }

    /// Output grid size for an input of `input`, when it can be known
    /// without rendering.
    fn output_size(&self, input: (u32, u32)) -> Option<(u32, u32)> {
        Some(input)
    }
}

type SourceFn<F> = Arc<dyn Fn(f64) -> Result<F> + Send + Sync>;
type FilterFn<F> = Arc<dyn Fn(F, f64) -> Result<F> + Send + Sync>;

/// Source backed by a closure.
pub struct FnSource<F> {
    func: SourceFn<F>,
}

impl<F> FnSource<F> {
    pub fn new<G>(func: G) -> Self
    where
        G: Fn(f64) -> Result<F> + Send + Sync + 'static,
    {
        Self { func: Arc::new(func) }
    }
}

impl<F> FrameSource<F> for FnSource<F> {
    fn frame_at(&self, t: f64) -> Result<F> {
        (self.func)(t)
    }
}

/// Source returning one fixed frame.
pub struct ConstantSource<F> {
    frame: F,
}

impl<F> ConstantSource<F> {
    pub fn new(frame: F) -> Self {
        Self { frame }
    }
}

impl<F: Clone + Send + Sync> FrameSource<F> for ConstantSource<F> {
    fn frame_at(&self, _t: f64) -> Result<F> {
        Ok(self.frame.clone())
    }

    fn is_time_invariant(&self) -> bool {
        true
    }
}

/// Filter backed by a closure.
pub struct FnFilter<F> {
    name: String,
    func: FilterFn<F>,
    time_invariant: bool,
}

impl<F> FnFilter<F> {
    pub fn new<G>(name: impl Into<String>, func: G) -> Self
    where
        G: Fn(F, f64) -> Result<F> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(func),
            time_invariant: false,
        }
    }

    /// Filter that ignores `t`.
    pub fn per_frame<G>(name: impl Into<String>, func: G) -> Self
    where
        F: 'static,
        G: Fn(F) -> Result<F> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(move |frame: F, _t: f64| func(frame)),
            time_invariant: true,
        }
    }
}

impl<F> FrameFilter<F> for FnFilter<F> {
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, frame: F, t: f64) -> Result<F> {
        (self.func)(frame, t)
    }

    fn is_time_invariant(&self) -> bool {
        self.time_invariant
    }

    fn output_size(&self, _input: (u32, u32)) -> Option<(u32, u32)> {
        None
    }
}

enum Stage<F> {
    Time(TimeMap),
    Filter(Arc<dyn FrameFilter<F>>),
}

impl<F> Clone for Stage<F> {
    fn clone(&self) -> Self {
        match self {
            Self::Time(map) => Self::Time(map.clone()),
            Self::Filter(filter) => Self::Filter(Arc::clone(filter)),
        }
    }
}

/// A source followed by an ordered list of time maps and filters.
///
/// Stages are stored in the order they were added. Evaluating at `t` walks
/// the stages backwards to find the source time (so a later time map wraps
/// the earlier ones), then runs the filters forwards, each with the time it
/// saw when it was added.
pub struct FramePipeline<F> {
    source: Arc<dyn FrameSource<F>>,
    stages: Vec<Stage<F>>,
}

impl<F> Clone for FramePipeline<F> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
            stages: self.stages.clone(),
        }
    }
}

impl<F> FramePipeline<F> {
    pub fn new(source: Arc<dyn FrameSource<F>>) -> Self {
        Self {
            source,
            stages: Vec::new(),
        }
    }

    pub fn push_time(&mut self, map: TimeMap) {
        self.stages.push(Stage::Time(map));
    }

    pub fn push_filter(&mut self, filter: Arc<dyn FrameFilter<F>>) {
        self.stages.push(Stage::Filter(filter));
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// The time at which the underlying source is sampled for output time `t`.
    pub fn source_time(&self, t: f64) -> f64 {
        self.stages.iter().rev().fold(t, |t, stage| match stage {
            Stage::Time(map) => map.apply(t),
            Stage::Filter(_) => t,
        })
    }

    pub fn frame_at(&self, t: f64) -> Result<F> {
        let mut filter_times = Vec::new();
        let mut local = t;
        for stage in self.stages.iter().rev() {
            match stage {
                Stage::Time(map) => local = map.apply(local),
                Stage::Filter(_) => filter_times.push(local),
            }
        }

        let mut frame = self.source.frame_at(local)?;
        let filters = self.stages.iter().filter_map(|stage| match stage {
            Stage::Filter(filter) => Some(filter),
            Stage::Time(_) => None,
        });
        for (filter, filter_t) in filters.zip(filter_times.iter().rev()) {
            frame = filter.apply(frame, *filter_t)?;
        }
        Ok(frame)
    }

    /// Time maps never break invariance; filters and the source may.
    pub fn is_time_invariant(&self) -> bool {
        self.source.is_time_invariant()
            && self.stages.iter().all(|stage| match stage {
                Stage::Time(_) => true,
                Stage::Filter(filter) => filter.is_time_invariant(),
            })
    }

    pub fn is_stateful(&self) -> bool {
        self.source.is_stateful()
    }

    /// Output size after every filter, given the source size.
    pub fn output_size(&self, source_size: (u32, u32)) -> Option<(u32, u32)> {
        self.stages.iter().try_fold(source_size, |size, stage| match stage {
            Stage::Time(_) => Some(size),
            Stage::Filter(filter) => filter.output_size(size),
        })
    }
}
