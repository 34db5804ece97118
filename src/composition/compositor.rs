use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::audio::{AudioClip, CompositeAudioClip};
use crate::clip::{Clip, FrameSource, Timeline};
use crate::config::CompositionConfig;
use crate::error::{ClipError, Result};
use crate::video::{Frame, MaskFrame, Position, Raster, VideoClip};

/// What to do when a layer has no end and no explicit duration is given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnboundedPolicy {
    /// Refuse to build the composite.
    #[default]
    Reject,
    /// Build an open-ended composite.
    Open,
}

/// What to do when a layer's mask is not the size of its frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaskShapePolicy {
    #[default]
    Reject,
    /// Crop the mask to the frame, padding missing cells with transparency.
    CropPad,
}

/// A layer's colour frame and mask at one time, mask already fitted.
struct Rendered {
    frame: Frame,
    mask: Option<MaskFrame>,
}

struct Layer {
    clip: VideoClip,
    invariant: bool,
    cache: Mutex<Option<Arc<Rendered>>>,
}

impl Layer {
    fn new(clip: VideoClip) -> Self {
        Self {
            invariant: clip.is_time_invariant(),
            clip,
            cache: Mutex::new(None),
        }
    }

    fn render(&self, local: f64, mask_shape: MaskShapePolicy) -> Result<Arc<Rendered>> {
        if self.invariant {
            if let Some(rendered) = self.cache.lock().as_ref() {
                return Ok(Arc::clone(rendered));
            }
        }

        let frame = self.clip.frame_at(local)?;
        let mask = match self.clip.mask_at(local)? {
            Some(mask) => Some(fit_mask(self.clip.name(), mask, frame.size(), mask_shape)?),
            None => None,
        };
        let rendered = Arc::new(Rendered { frame, mask });

        if self.invariant {
            *self.cache.lock() = Some(Arc::clone(&rendered));
        }
        Ok(rendered)
    }

    fn placement(&self, local: f64, canvas: (u32, u32), size: (u32, u32)) -> (i64, i64) {
        self.clip.position_at(local).resolve(canvas, size)
    }
}

fn fit_mask(clip: &str, mask: MaskFrame, size: (u32, u32), policy: MaskShapePolicy) -> Result<MaskFrame> {
    if mask.size() == size {
        return Ok(mask);
    }
    match policy {
        MaskShapePolicy::Reject => Err(ClipError::IncompatibleFrameShape {
            clip: clip.to_string(),
            expected: size,
            actual: mask.size(),
        }
        .into()),
        MaskShapePolicy::CropPad => {
            let (width, height) = mask.size();
            Ok(MaskFrame::from_fn(size.0, size.1, |x, y| {
                if x < width && y < height {
                    mask.get(x, y)
                } else {
                    0.0
                }
            }))
        }
    }
}

/// Overlap of a `size` raster placed at `origin` with a `canvas`, as
/// canvas-space `(x0, y0, x1, y1)`; `None` when they do not touch.
fn overlap(canvas: (u32, u32), origin: (i64, i64), size: (u32, u32)) -> Option<(u32, u32, u32, u32)> {
    let x0 = origin.0.max(0);
    let y0 = origin.1.max(0);
    let x1 = (origin.0 + i64::from(size.0)).min(i64::from(canvas.0));
    let y1 = (origin.1 + i64::from(size.1)).min(i64::from(canvas.1));
    if x0 >= x1 || y0 >= y1 {
        return None;
    }
    Some((x0 as u32, y0 as u32, x1 as u32, y1 as u32))
}

/// `acc = m * overlay + (1 - m) * acc` over the part of `overlay` that
/// lands on the canvas.
fn blit_frame(acc: &mut Frame, overlay: &Frame, mask: Option<&MaskFrame>, origin: (i64, i64)) {
    let canvas = acc.size();
    let (ow, _) = overlay.size();
    let Some((x0, y0, x1, y1)) = overlap(canvas, origin, overlay.size()) else {
        return;
    };

    let source = overlay.as_raw();
    let target = acc.as_raw_mut();
    for y in y0..y1 {
        let oy = (i64::from(y) - origin.1) as u32;
        for x in x0..x1 {
            let ox = (i64::from(x) - origin.0) as u32;
            let m = mask.map_or(1.0, |mask| mask.get(ox, oy));
            if m <= 0.0 {
                continue;
            }
            let s = ((oy * ow + ox) * 3) as usize;
            let d = ((y * canvas.0 + x) * 3) as usize;
            for c in 0..3 {
                target[d + c] = if m >= 1.0 {
                    source[s + c]
                } else {
                    (m * f32::from(source[s + c]) + (1.0 - m) * f32::from(target[d + c])).round() as u8
                };
            }
        }
    }
}

/// `acc = m + (1 - m) * acc`: a layer's opacity stacked over what is below.
fn blit_mask(acc: &mut MaskFrame, mask: &MaskFrame, origin: (i64, i64)) {
    let canvas = acc.size();
    let Some((x0, y0, x1, y1)) = overlap(canvas, origin, mask.size()) else {
        return;
    };
    for y in y0..y1 {
        for x in x0..x1 {
            let m = mask.get((i64::from(x) - origin.0) as u32, (i64::from(y) - origin.1) as u32);
            let below = acc.get(x, y);
            acc.set(x, y, m + (1.0 - m) * below);
        }
    }
}

/// The resolved layer stack shared by the colour and mask sources.
struct Stack {
    canvas: (u32, u32),
    bg_color: [u8; 3],
    background: Option<Layer>,
    layers: Vec<Layer>,
    mask_shape: MaskShapePolicy,
}

impl Stack {
    fn playing(&self, t: f64) -> impl Iterator<Item = &Layer> {
        self.layers.iter().filter(move |layer| layer.clip.is_playing(t))
    }

    fn background_at(&self, t: f64) -> Result<Option<Arc<Rendered>>> {
        match &self.background {
            Some(layer) if layer.clip.is_playing(t) => {
                let rendered = layer.render(t - layer.clip.start(), self.mask_shape)?;
                if rendered.frame.size() != self.canvas {
                    return Err(ClipError::IncompatibleFrameShape {
                        clip: layer.clip.name().to_string(),
                        expected: self.canvas,
                        actual: rendered.frame.size(),
                    }
                    .into());
                }
                Ok(Some(rendered))
            }
            _ => Ok(None),
        }
    }

    fn frame_at(&self, t: f64) -> Result<Frame> {
        let mut acc = match self.background_at(t)? {
            Some(background) => background.frame.clone(),
            None => Frame::new_filled(self.canvas.0, self.canvas.1, self.bg_color),
        };
        for layer in self.playing(t) {
            let local = t - layer.clip.start();
            let rendered = layer.render(local, self.mask_shape)?;
            let origin = layer.placement(local, self.canvas, rendered.frame.size());
            blit_frame(&mut acc, &rendered.frame, rendered.mask.as_ref(), origin);
        }
        Ok(acc)
    }

    fn mask_at(&self, t: f64) -> Result<MaskFrame> {
        let mut acc = match self.background_at(t)? {
            Some(background) => background
                .mask
                .clone()
                .unwrap_or_else(|| MaskFrame::opaque(self.canvas.0, self.canvas.1)),
            None => MaskFrame::transparent(self.canvas.0, self.canvas.1),
        };
        for layer in self.playing(t) {
            let local = t - layer.clip.start();
            let rendered = layer.render(local, self.mask_shape)?;
            let size = rendered.frame.size();
            let origin = layer.placement(local, self.canvas, size);
            match &rendered.mask {
                Some(mask) => blit_mask(&mut acc, mask, origin),
                None => blit_mask(&mut acc, &MaskFrame::opaque(size.0, size.1), origin),
            }
        }
        Ok(acc)
    }

    /// Every layer shows the same thing, in the same place, at every time.
    ///
    /// Layers must cover `[0, inf)`: the composite's duration can still be
    /// extended after it is built, and a finite layer would then drop out.
    fn is_time_invariant(&self) -> bool {
        let steady = |layer: &Layer| {
            let covers = layer.clip.start() <= 0.0 && layer.clip.end().is_none();
            layer.invariant && covers && matches!(layer.clip.position(), Position::Fixed(_))
        };
        self.background.iter().chain(&self.layers).all(steady)
    }

    fn is_stateful(&self) -> bool {
        self.background.iter().chain(&self.layers).any(|layer| layer.clip.is_stateful())
    }
}

struct CompositeFrames(Arc<Stack>);

impl FrameSource<Frame> for CompositeFrames {
    fn frame_at(&self, t: f64) -> Result<Frame> {
        self.0.frame_at(t)
    }

    fn is_time_invariant(&self) -> bool {
        self.0.is_time_invariant()
    }

    fn is_stateful(&self) -> bool {
        self.0.is_stateful()
    }
}

struct CompositeMask(Arc<Stack>);

impl FrameSource<MaskFrame> for CompositeMask {
    fn frame_at(&self, t: f64) -> Result<MaskFrame> {
        self.0.mask_at(t)
    }

    fn is_time_invariant(&self) -> bool {
        self.0.is_time_invariant()
    }

    fn is_stateful(&self) -> bool {
        self.0.is_stateful()
    }
}

/// Builder for a layered video composite
///
/// Layers are drawn bottom to top by `layer_index`, ties broken by list
/// order. Each playing layer is read at its own local time `t - start`,
/// placed by its position and blended through its mask (opaque when it has
/// none). Audio tracks of the layers are mixed into the composite's audio.
///
/// ```rust,no_run
/// use clip_compositor::composition::Compositor;
/// use clip_compositor::video::{Position, VideoClip};
/// use clip_compositor::Timeline;
///
/// # fn main() -> clip_compositor::Result<()> {
/// let red = VideoClip::color((64, 64), [255, 0, 0], Some(2.0));
/// let blue = VideoClip::color((32, 32), [0, 0, 255], Some(2.0))
///     .with_start(1.0, true)?
///     .with_position(Position::center());
/// let composite = Compositor::new(vec![red, blue]).build()?;
/// assert_eq!(composite.duration(), Some(3.0));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Compositor {
    clips: Vec<VideoClip>,
    size: Option<(u32, u32)>,
    bg_color: [u8; 3],
    transparent: bool,
    use_bgclip: bool,
    duration: Option<f64>,
    unbounded: UnboundedPolicy,
    mask_shape: MaskShapePolicy,
}

impl Compositor {
    pub fn new(clips: Vec<VideoClip>) -> Self {
        Self {
            clips,
            size: None,
            bg_color: [0, 0, 0],
            transparent: false,
            use_bgclip: false,
            duration: None,
            unbounded: UnboundedPolicy::default(),
            mask_shape: MaskShapePolicy::default(),
        }
    }

    /// Take background, transparency and policies from configuration.
    pub fn with_config(mut self, config: &CompositionConfig) -> Self {
        self.bg_color = config.bg_color;
        self.transparent = config.transparent;
        self.unbounded = config.unbounded;
        self.mask_shape = config.mask_shape;
        self
    }

    /// Canvas size. Defaults to the size of the first clip.
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.size = Some((width, height));
        self
    }

    pub fn with_bg_color(mut self, color: [u8; 3]) -> Self {
        self.bg_color = color;
        self
    }

    /// Give the composite a mask built from the layers' masks.
    pub fn transparent(mut self, transparent: bool) -> Self {
        self.transparent = transparent;
        self
    }

    /// Use the first clip as the background instead of a solid colour.
    pub fn use_bgclip(mut self, use_bgclip: bool) -> Self {
        self.use_bgclip = use_bgclip;
        self
    }

    /// Explicit duration; overrides the one derived from the layers.
    pub fn with_duration(mut self, duration: f64) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn with_unbounded_policy(mut self, policy: UnboundedPolicy) -> Self {
        self.unbounded = policy;
        self
    }

    pub fn with_mask_shape_policy(mut self, policy: MaskShapePolicy) -> Self {
        self.mask_shape = policy;
        self
    }

    fn resolve_duration(&self) -> Result<Option<f64>> {
        if let Some(duration) = self.duration {
            if !duration.is_finite() || duration < 0.0 {
                return Err(ClipError::invalid_range("CompositeVideoClip", 0.0, Some(duration), "negative duration").into());
            }
            return Ok(Some(duration));
        }

        let mut latest = 0.0_f64;
        for clip in &self.clips {
            match clip.end() {
                Some(end) => latest = latest.max(end),
                None if self.unbounded == UnboundedPolicy::Open => return Ok(None),
                None => return Err(ClipError::missing_duration(clip.name(), "compositing without an explicit duration").into()),
            }
        }
        Ok(Some(latest))
    }

    /// Resolve sizes and timing and produce the composite clip.
    pub fn build(self) -> Result<VideoClip> {
        if self.clips.is_empty() {
            return Err(ClipError::EmptyComposition {
                missing: "canvas size".to_string(),
            }
            .into());
        }

        let duration = self.resolve_duration()?;
        let canvas = match self.size {
            Some(size) => size,
            None => self.clips[0].resolved_size()?,
        };

        let audio: Vec<AudioClip> = self.clips.iter().filter_map(|clip| clip.audio().cloned()).collect();

        let mut clips = self.clips;
        let background = if self.use_bgclip {
            Some(Layer::new(clips.remove(0)))
        } else {
            None
        };
        // stable: equal layer indices keep list order
        clips.sort_by_key(VideoClip::layer_index);
        let layers: Vec<Layer> = clips.into_iter().map(Layer::new).collect();

        info!(
            "Compositing {} layers on a {}x{} canvas, duration {:?}",
            layers.len() + usize::from(background.is_some()),
            canvas.0,
            canvas.1,
            duration
        );

        let stack = Arc::new(Stack {
            canvas,
            bg_color: self.bg_color,
            background,
            layers,
            mask_shape: self.mask_shape,
        });

        let mut composite = VideoClip::new(
            Clip::new("CompositeVideoClip", CompositeFrames(Arc::clone(&stack)), duration),
            Some(canvas),
        );
        if self.transparent {
            debug!("Building composite mask");
            composite = composite.with_mask(Clip::new("CompositeMask", CompositeMask(stack), duration));
        }
        if !audio.is_empty() {
            debug!("Mixing {} audio tracks into the composite", audio.len());
            composite = composite.with_audio(CompositeAudioClip::new(audio)?)?;
        }
        Ok(composite)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::AudioFrame;
    use crate::effects::MultiplyColor;
    use crate::video::Coord;

    const RED: [u8; 3] = [255, 0, 0];
    const BLUE: [u8; 3] = [0, 0, 255];
    const WHITE: [u8; 3] = [255, 255, 255];

    #[test]
    fn test_later_layer_on_top() {
        let a = VideoClip::color((4, 4), RED, Some(2.0));
        let b = VideoClip::color((4, 4), BLUE, Some(2.0)).with_start(1.0, true).unwrap();
        let composite = Compositor::new(vec![a, b]).build().unwrap();

        assert_eq!(composite.duration(), Some(3.0));
        assert_eq!(composite.frame_at(0.5).unwrap().get_pixel(2, 2), RED);
        assert_eq!(composite.frame_at(1.5).unwrap().get_pixel(2, 2), BLUE);
        // after A ends only B remains
        assert_eq!(composite.frame_at(2.5).unwrap().get_pixel(0, 0), BLUE);
    }

    #[test]
    fn test_quadrant_leaves_background_untouched() {
        let white = VideoClip::color((2, 2), WHITE, Some(1.0)).with_opaque_mask();
        let composite = Compositor::new(vec![white])
            .with_size(4, 4)
            .with_bg_color([0, 0, 0])
            .build()
            .unwrap();

        for t in [0.0, 0.25, 0.5, 0.75] {
            let frame = composite.frame_at(t).unwrap();
            assert_eq!(frame.get_pixel(1, 1), WHITE);
            for y in 2..4 {
                for x in 2..4 {
                    assert_eq!(frame.get_pixel(x, y), [0, 0, 0]);
                }
            }
        }
    }

    #[test]
    fn test_single_canvas_sized_clip_is_reproduced() {
        let source = VideoClip::from_fn("gradient", Some((3, 2)), Some(1.0), |t| {
            let mut frame = Frame::new_black(3, 2);
            frame.set_pixel(2, 1, [(t * 100.0) as u8, 7, 9]);
            Ok(frame)
        });
        let composite = Compositor::new(vec![source.clone()]).build().unwrap();
        assert_eq!(composite.frame_at(0.5).unwrap(), source.frame_at(0.5).unwrap());
    }

    #[test]
    fn test_zero_mask_shows_background_only() {
        let hidden = VideoClip::color((4, 4), RED, Some(1.0))
            .with_mask(Clip::constant("zero", MaskFrame::transparent(4, 4), None));
        let composite = Compositor::new(vec![hidden]).with_bg_color(BLUE).build().unwrap();
        let frame = composite.frame_at(0.0).unwrap();
        assert!(frame.as_raw().chunks(3).all(|px| px == BLUE));
    }

    #[test]
    fn test_half_mask_blends_and_rounds() {
        let half = VideoClip::color((1, 1), [255, 100, 0], Some(1.0))
            .with_mask(Clip::constant("half", MaskFrame::new_filled(1, 1, 0.5), None));
        let composite = Compositor::new(vec![half]).build().unwrap();
        assert_eq!(composite.frame_at(0.0).unwrap().get_pixel(0, 0), [128, 50, 0]);
    }

    #[test]
    fn test_layer_index_beats_list_order() {
        let top = VideoClip::color((2, 2), RED, Some(1.0)).with_layer_index(1);
        let bottom = VideoClip::color((2, 2), BLUE, Some(1.0));
        let composite = Compositor::new(vec![top, bottom]).build().unwrap();
        assert_eq!(composite.frame_at(0.0).unwrap().get_pixel(0, 0), RED);
    }

    #[test]
    fn test_position_clipped_to_canvas() {
        let bg = VideoClip::color((4, 4), [0, 0, 0], Some(1.0));
        let corner = VideoClip::color((2, 2), WHITE, Some(1.0))
            .with_position(Position::anchored(Coord::Pixels(3.0), Coord::End));
        let composite = Compositor::new(vec![bg, corner]).build().unwrap();
        let frame = composite.frame_at(0.0).unwrap();
        assert_eq!(frame.get_pixel(3, 3), WHITE);
        assert_eq!(frame.get_pixel(3, 2), WHITE);
        assert_eq!(frame.get_pixel(2, 3), [0, 0, 0]);
        assert_eq!(frame.get_pixel(3, 1), [0, 0, 0]);
    }

    #[test]
    fn test_unbounded_layer_policy() {
        let open = VideoClip::color((2, 2), RED, None);
        assert!(matches!(
            Compositor::new(vec![open.clone()]).build(),
            Err(crate::error::CompositorError::Clip(ClipError::MissingDuration { .. }))
        ));

        let fixed = Compositor::new(vec![open.clone()]).with_duration(5.0).build().unwrap();
        assert_eq!(fixed.duration(), Some(5.0));

        let unbounded = Compositor::new(vec![open])
            .with_unbounded_policy(UnboundedPolicy::Open)
            .build()
            .unwrap();
        assert_eq!(unbounded.duration(), None);
    }

    #[test]
    fn test_mask_shape_policies() {
        let mismatched = VideoClip::color((2, 2), WHITE, Some(1.0))
            .with_mask(Clip::constant("small", MaskFrame::opaque(1, 1), None));

        let strict = Compositor::new(vec![mismatched.clone()]).build().unwrap();
        assert!(strict.frame_at(0.0).is_err());

        let lenient = Compositor::new(vec![mismatched])
            .with_mask_shape_policy(MaskShapePolicy::CropPad)
            .build()
            .unwrap();
        let frame = lenient.frame_at(0.0).unwrap();
        assert_eq!(frame.get_pixel(0, 0), WHITE);
        assert_eq!(frame.get_pixel(1, 1), [0, 0, 0]);
    }

    #[test]
    fn test_transparent_composite_mask() {
        let small = VideoClip::color((1, 1), WHITE, Some(1.0)).with_position(Position::pixels(1.0, 0.0));
        let composite = Compositor::new(vec![small])
            .with_size(2, 1)
            .transparent(true)
            .build()
            .unwrap();
        let mask = composite.mask_at(0.0).unwrap().unwrap();
        assert_eq!(mask.get(0, 0), 0.0);
        assert_eq!(mask.get(1, 0), 1.0);
    }

    #[test]
    fn test_bgclip_and_invariance() {
        let bg = VideoClip::color((2, 2), BLUE, Some(2.0));
        let fg = VideoClip::color((1, 1), RED, Some(2.0));
        let composite = Compositor::new(vec![bg, fg]).use_bgclip(true).build().unwrap();

        // finite layers stop contributing if the composite is extended
        assert!(!composite.is_time_invariant());
        let frame = composite.frame_at(1.0).unwrap();
        assert_eq!(frame.get_pixel(0, 0), RED);
        assert_eq!(frame.get_pixel(1, 1), BLUE);

        let endless = Compositor::new(vec![VideoClip::color((2, 2), BLUE, None), VideoClip::color((1, 1), RED, None)])
            .use_bgclip(true)
            .with_duration(2.0)
            .build()
            .unwrap();
        assert!(endless.is_time_invariant());
        assert_eq!(endless.frame_at(1.5).unwrap().get_pixel(0, 0), RED);

        let late = VideoClip::color((1, 1), RED, Some(1.0)).with_start(1.0, true).unwrap();
        let varying = Compositor::new(vec![VideoClip::color((2, 2), BLUE, Some(2.0)), late])
            .build()
            .unwrap();
        assert!(!varying.is_time_invariant());
    }

    #[test]
    fn test_extended_composite_keeps_background_after_layers_end() {
        let red = VideoClip::color((1, 1), RED, Some(2.0));
        let extended = Compositor::new(vec![red])
            .with_bg_color(BLUE)
            .build()
            .unwrap()
            .with_duration(Some(4.0), true)
            .unwrap();
        assert_eq!(extended.frame_at(3.0).unwrap().get_pixel(0, 0), BLUE);

        let filtered = extended.with_effects(&[&MultiplyColor::new(1.0)]).unwrap();
        assert_eq!(filtered.frame_at(1.0).unwrap().get_pixel(0, 0), RED);
        assert_eq!(filtered.frame_at(3.0).unwrap().get_pixel(0, 0), BLUE);
    }

    #[test]
    fn test_dataset_layer_at_fractional_start() {
        let one = VideoClip::from_dataset("one", vec![RED], 1.0, |color| Ok(Frame::new_filled(1, 1, *color)))
            .unwrap()
            .with_start(14.0 / 24.0, true)
            .unwrap();
        let composite = Compositor::new(vec![one]).with_bg_color(BLUE).build().unwrap();

        let t = 38.0 / 24.0;
        assert!(composite.is_playing(t));
        assert_eq!(composite.frame_at(t).unwrap().get_pixel(0, 0), RED);
        assert_eq!(composite.frame_at(0.25).unwrap().get_pixel(0, 0), BLUE);
    }

    #[test]
    fn test_layer_audio_is_mixed_at_clip_start() {
        let tone = AudioClip::from_fn("tone", 10, 1, Some(1.0), |_t| Ok(AudioFrame::mono(0.5)));
        let layer = VideoClip::color((1, 1), RED, Some(1.0))
            .with_audio(tone)
            .unwrap()
            .with_start(1.0, true)
            .unwrap();
        let composite = Compositor::new(vec![layer]).build().unwrap();
        let audio = composite.audio().unwrap();

        assert_eq!(audio.duration(), Some(2.0));
        assert_eq!(audio.frame_at(0.5).unwrap().samples(), &[0.0]);
        assert_eq!(audio.frame_at(1.5).unwrap().samples(), &[0.5]);
    }

    #[test]
    fn test_empty_composition_rejected() {
        assert!(Compositor::new(Vec::new()).build().is_err());
    }
}
