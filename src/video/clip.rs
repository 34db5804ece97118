use tracing::debug;

use crate::audio::AudioClip;
use crate::clip::{ApplyTo, Clip, FrameFilter, FramePipeline, FrameSource, TimeMap, Timeline, Timing};
use crate::effects::VideoEffect;
use crate::error::Result;
use crate::time::TimeBase;
use crate::video::position::{Placement, Position};
use crate::video::types::{Frame, MaskFrame, Raster};

/// A clip of opacity grids, owned by a [`VideoClip`].
pub type MaskClip = Clip<MaskFrame>;

/// Fully opaque mask shaped like whatever the colour pipeline renders.
struct OpaqueLike {
    frames: FramePipeline<Frame>,
}

impl FrameSource<MaskFrame> for OpaqueLike {
    fn frame_at(&self, t: f64) -> Result<MaskFrame> {
        let (width, height) = self.frames.frame_at(t)?.size();
        Ok(MaskFrame::opaque(width, height))
    }

    fn is_time_invariant(&self) -> bool {
        self.frames.is_time_invariant()
    }

    fn is_stateful(&self) -> bool {
        self.frames.is_stateful()
    }
}

/// A video clip: colour frames plus an optional mask and audio track, a
/// position on the parent canvas and a stacking order.
///
/// The mask and audio are owned by the clip. Timing changes and time
/// transforms reach them as well, so all three stay aligned.
#[derive(Clone)]
pub struct VideoClip {
    core: Clip<Frame>,
    mask: Option<MaskClip>,
    audio: Option<AudioClip>,
    position: Position,
    layer_index: i32,
    size: Option<(u32, u32)>,
    fps: Option<f64>,
}

impl VideoClip {
    /// Wrap a frame clip. `size` is the frame size when known up front.
    pub fn new(core: Clip<Frame>, size: Option<(u32, u32)>) -> Self {
        Self {
            core,
            mask: None,
            audio: None,
            position: Position::default(),
            layer_index: 0,
            size,
            fps: None,
        }
    }

    pub fn core(&self) -> &Clip<Frame> {
        &self.core
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.core = self.core.with_name(name);
        self
    }

    /// Frame size, when known without rendering.
    pub fn size(&self) -> Option<(u32, u32)> {
        self.size
    }

    /// Frame size, rendering the first frame if it is not known.
    pub fn resolved_size(&self) -> Result<(u32, u32)> {
        match self.size {
            Some(size) => Ok(size),
            None => Ok(self.core.frame_at(0.0)?.size()),
        }
    }

    /// Native frame rate, for sources that have one.
    pub fn fps(&self) -> Option<f64> {
        self.fps
    }

    pub fn with_fps(mut self, fps: Option<f64>) -> Self {
        self.fps = fps;
        self
    }

    pub fn frame_at(&self, t: f64) -> Result<Frame> {
        self.core.frame_at(t)
    }

    /// Evaluate without the memo, for concurrent callers.
    pub fn frame_at_uncached(&self, t: f64) -> Result<Frame> {
        self.core.frame_at_uncached(t)
    }

    pub fn mask(&self) -> Option<&MaskClip> {
        self.mask.as_ref()
    }

    pub fn mask_at(&self, t: f64) -> Result<Option<MaskFrame>> {
        self.mask.as_ref().map(|mask| mask.frame_at(t)).transpose()
    }

    /// Attach `mask`; it takes over this clip's timing.
    pub fn with_mask(mut self, mask: MaskClip) -> Self {
        self.mask = Some(mask.with_timing(self.core.timing()));
        self
    }

    pub fn without_mask(mut self) -> Self {
        self.mask = None;
        self
    }

    /// Attach a fully opaque mask, unless the clip already has one.
    pub fn with_opaque_mask(self) -> Self {
        if self.mask.is_some() {
            return self;
        }
        let mask = match self.size {
            Some((width, height)) => Clip::constant("mask", MaskFrame::opaque(width, height), None),
            None => Clip::new(
                "mask",
                OpaqueLike {
                    frames: self.core.pipeline().clone(),
                },
                None,
            ),
        };
        self.with_mask(mask)
    }

    pub fn audio(&self) -> Option<&AudioClip> {
        self.audio.as_ref()
    }

    /// Attach `audio`, moved to start with this clip.
    pub fn with_audio(mut self, audio: AudioClip) -> Result<Self> {
        self.audio = Some(audio.with_start(self.start(), true)?);
        Ok(self)
    }

    pub fn without_audio(mut self) -> Self {
        self.audio = None;
        self
    }

    /// Replace the audio track (if any) with `func(audio)`.
    pub fn map_audio<G>(mut self, func: G) -> Result<Self>
    where
        G: FnOnce(AudioClip) -> Result<AudioClip>,
    {
        self.audio = self.audio.map(func).transpose()?;
        Ok(self)
    }

    pub fn position(&self) -> &Position {
        &self.position
    }

    pub fn with_position(mut self, position: Position) -> Self {
        self.position = position;
        self
    }

    /// Placement at clip-local time `t`.
    pub fn position_at(&self, t: f64) -> Placement {
        self.position.at(t)
    }

    pub fn layer_index(&self) -> i32 {
        self.layer_index
    }

    /// Stacking order in a composite; higher layers are drawn on top.
    pub fn with_layer_index(mut self, layer_index: i32) -> Self {
        self.layer_index = layer_index;
        self
    }

    pub fn with_memoize(mut self, enabled: bool) -> Self {
        self.core = self.core.with_memoize(enabled);
        self.mask = self.mask.map(|mask| mask.with_memoize(enabled));
        self
    }

    /// Transform colour frames only. The mask is left alone.
    pub fn image_transform<T>(mut self, filter: T) -> Result<Self>
    where
        T: FrameFilter<Frame> + 'static,
    {
        self.size = self.size.and_then(|size| filter.output_size(size));
        self.core = self.core.image_transform(filter)?;
        Ok(self)
    }

    /// Transform the mask only; a clip without a mask is returned as is.
    pub fn mask_transform<T>(mut self, filter: T) -> Result<Self>
    where
        T: FrameFilter<MaskFrame> + 'static,
    {
        if let Some(mask) = self.mask.take() {
            self.mask = Some(mask.image_transform(filter)?);
        }
        Ok(self)
    }

    /// Apply a geometric filter to colour frames and mask alike.
    pub fn raster_transform<T>(self, filter: T) -> Result<Self>
    where
        T: FrameFilter<Frame> + FrameFilter<MaskFrame> + Clone + 'static,
    {
        let clip = self.mask_transform(filter.clone())?;
        clip.image_transform(filter)
    }

    /// [`Timeline::time_transform`] with explicit control over which side
    /// channels follow.
    pub fn time_transform_with(mut self, map: TimeMap, keep_duration: bool, apply_to: ApplyTo) -> Self {
        self.core = self.core.time_transform(map.clone(), keep_duration);
        if apply_to.mask {
            self.mask = self.mask.map(|mask| mask.time_transform(map.clone(), keep_duration));
        }
        if apply_to.audio {
            self.audio = self.audio.map(|audio| audio.time_transform(map, keep_duration));
        }
        self
    }

    /// Apply `effects` in order.
    pub fn with_effects(self, effects: &[&dyn VideoEffect]) -> Result<Self> {
        effects.iter().try_fold(self, |clip, effect| {
            debug!("Applying effect '{}' to '{}'", effect.name(), clip.name());
            effect.apply(clip)
        })
    }

    /// Frames and masks are the same at every time.
    pub fn is_time_invariant(&self) -> bool {
        self.core.is_time_invariant() && self.mask.as_ref().map_or(true, |mask| mask.is_time_invariant())
    }

    pub fn is_stateful(&self) -> bool {
        self.core.is_stateful()
            || self.mask.as_ref().is_some_and(|mask| mask.is_stateful())
            || self.audio.as_ref().is_some_and(AudioClip::is_stateful)
    }

    /// Frames over `[0, duration)` sampled at `fps`.
    pub fn iter_frames(&self, fps: f64) -> Result<FrameIter<'_>> {
        let duration = self.require_duration("iterating frames")?;
        let timebase = TimeBase::new(fps)?;
        Ok(FrameIter {
            clip: self,
            timebase,
            total: timebase.frame_count(duration),
            next: 0,
        })
    }

    pub fn source_time(&self, t: f64) -> f64 {
        self.core.source_time(t)
    }
}

impl Timeline for VideoClip {
    fn name(&self) -> &str {
        self.core.name()
    }

    fn timing(&self) -> Timing {
        self.core.timing()
    }

    fn map_timing<U>(mut self, update: U) -> Result<Self>
    where
        U: Fn(Timing) -> std::result::Result<Timing, String>,
    {
        self.core = self.core.map_timing(&update)?;
        self.mask = self.mask.map(|mask| mask.map_timing(&update)).transpose()?;
        self.audio = self.audio.map(|audio| audio.map_timing(&update)).transpose()?;
        Ok(self)
    }

    fn time_transform(self, map: TimeMap, keep_duration: bool) -> Self {
        self.time_transform_with(map, keep_duration, ApplyTo::ALL)
    }
}

impl std::fmt::Debug for VideoClip {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VideoClip")
            .field("core", &self.core)
            .field("mask", &self.mask)
            .field("audio", &self.audio)
            .field("position", &self.position)
            .field("layer_index", &self.layer_index)
            .field("size", &self.size)
            .finish()
    }
}

/// Restartable iterator over `(t, frame)` pairs of a [`VideoClip`].
#[derive(Clone)]
pub struct FrameIter<'a> {
    clip: &'a VideoClip,
    timebase: TimeBase,
    total: usize,
    next: usize,
}

impl FrameIter<'_> {
    pub fn restart(&mut self) {
        self.next = 0;
    }

    pub fn timebase(&self) -> TimeBase {
        self.timebase
    }
}

impl Iterator for FrameIter<'_> {
    type Item = Result<(f64, Frame)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.total {
            return None;
        }
        let t = self.timebase.frame_time(self.next);
        self.next += 1;
        Some(self.clip.frame_at(t).map(|frame| (t, frame)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.total - self.next;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for FrameIter<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::AudioFrame;
    use crate::clip::FnFilter;

    fn shade_clip(duration: f64) -> VideoClip {
        // brightness encodes the time in tenths of a second
        VideoClip::new(
            Clip::from_fn("shade", Some(duration), |t| Ok(Frame::new_filled(4, 2, [(t * 10.0).round() as u8, 0, 0]))),
            Some((4, 2)),
        )
    }

    fn shade_at(clip: &VideoClip, t: f64) -> u8 {
        clip.frame_at(t).unwrap().get_pixel(0, 0)[0]
    }

    #[test]
    fn test_mask_and_audio_follow_subclip() {
        let audio = AudioClip::from_fn("ramp", 10, 1, Some(5.0), |t| Ok(AudioFrame::mono(t as f32)));
        let mask = Clip::from_fn("fade", None, |t| Ok(MaskFrame::new_filled(4, 2, (t / 10.0) as f32)));
        let clip = shade_clip(5.0)
            .with_mask(mask)
            .with_audio(audio)
            .unwrap()
            .subclip(1.0, Some(3.0))
            .unwrap();

        assert_eq!(clip.duration(), Some(2.0));
        assert_eq!(clip.mask().unwrap().duration(), Some(2.0));
        assert_eq!(clip.audio().unwrap().duration(), Some(2.0));

        assert_eq!(shade_at(&clip, 0.5), 15);
        assert!((clip.mask_at(0.5).unwrap().unwrap().get(0, 0) - 0.15).abs() < 1e-6);
        assert!((clip.audio().unwrap().frame_at(0.5).unwrap().samples()[0] - 1.5).abs() < 1e-6);
    }

    #[test]
    fn test_with_start_moves_side_channels() {
        let audio = AudioClip::silence(10, 1, Some(2.0));
        let clip = shade_clip(2.0)
            .with_opaque_mask()
            .with_audio(audio)
            .unwrap()
            .with_start(3.0, true)
            .unwrap();
        assert_eq!(clip.end(), Some(5.0));
        assert_eq!(clip.mask().unwrap().start(), 3.0);
        assert_eq!(clip.audio().unwrap().end(), Some(5.0));
    }

    #[test]
    fn test_time_transform_can_skip_mask() {
        let mask = Clip::from_fn("ramp", None, |t| Ok(MaskFrame::new_filled(1, 1, t as f32)));
        let clip = shade_clip(4.0)
            .with_mask(mask)
            .time_transform_with(TimeMap::Scale(2.0), true, ApplyTo::NONE);
        assert_eq!(shade_at(&clip, 1.0), 20);
        assert_eq!(clip.mask_at(1.0).unwrap().unwrap().get(0, 0), 1.0);
    }

    #[test]
    fn test_time_mirror_reverses_discrete_frames() {
        let colours = [[255, 0, 0], [0, 255, 0], [0, 0, 255]];
        let clip = VideoClip::new(
            Clip::from_fn("rgb", Some(3.0), move |t| {
                let index = TimeBase::new(1.0)?.frame_index(t).clamp(0, 2) as usize;
                Ok(Frame::new_filled(1, 1, colours[index]))
            }),
            Some((1, 1)),
        );

        let mirrored = clip.time_mirror().unwrap();
        let frames: Vec<[u8; 3]> = mirrored
            .iter_frames(1.0)
            .unwrap()
            .map(|item| item.map(|(_, frame)| frame.get_pixel(0, 0)))
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(frames, vec![[0, 0, 255], [0, 255, 0], [255, 0, 0]]);
    }

    #[test]
    fn test_multiply_speed_samples_twice_as_fast() {
        let clip = shade_clip(4.0);
        let fast = clip.clone().multiply_speed(2.0).unwrap();
        assert_eq!(fast.duration(), Some(2.0));
        for t in [0.0, 0.3, 1.0, 1.9] {
            assert_eq!(fast.frame_at(t).unwrap(), clip.frame_at(2.0 * t).unwrap());
        }
    }

    #[test]
    fn test_opaque_mask_matches_unknown_size() {
        let clip = VideoClip::new(Clip::from_fn("grow", Some(2.0), |t| Ok(Frame::new_black(1 + t as u32, 3))), None)
            .with_opaque_mask();
        let mask = clip.mask_at(1.0).unwrap().unwrap();
        assert_eq!(mask.size(), (2, 3));
        assert_eq!(mask.get(1, 2), 1.0);
        assert_eq!(clip.resolved_size().unwrap(), (1, 3));
    }

    #[test]
    fn test_iter_frames_is_restartable_and_bounded() {
        let clip = shade_clip(0.5);
        let mut frames = clip.iter_frames(4.0).unwrap();
        assert_eq!(frames.len(), 2);
        let times: Vec<f64> = frames.by_ref().map(|item| item.unwrap().0).collect();
        assert_eq!(times, vec![0.0, 0.25]);
        frames.restart();
        assert_eq!(frames.count(), 2);

        let open = VideoClip::new(Clip::constant("still", Frame::new_black(1, 1), None), Some((1, 1)));
        assert!(open.iter_frames(24.0).is_err());
    }

    #[test]
    fn test_image_transform_keeps_mask_and_drops_known_size() {
        let clip = shade_clip(1.0)
            .with_opaque_mask()
            .image_transform(FnFilter::per_frame("invert", |frame: Frame| Ok(frame.multiplied(0.0))))
            .unwrap();
        assert_eq!(clip.size(), None);
        assert_eq!(clip.resolved_size().unwrap(), (4, 2));
        assert_eq!(clip.frame_at(0.5).unwrap().get_pixel(0, 0), [0, 0, 0]);
        assert_eq!(clip.mask_at(0.5).unwrap().unwrap().get(3, 1), 1.0);
    }
}
