use crate::clip::{ApplyTo, FnFilter, FrameFilter};
use crate::effects::traits::{EffectMetadata, EffectParams, VideoEffect};
use crate::error::{EffectError, Result};
use crate::video::{Frame, Raster, VideoClip};

/// Cut out a rectangle of frames and mask.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Crop {
    /// Top-left corner; `None` centers the rectangle.
    pub origin: Option<(u32, u32)>,
    pub width: u32,
    pub height: u32,
}

impl Crop {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            origin: Some((x, y)),
            width,
            height,
        }
    }

    pub fn centered(width: u32, height: u32) -> Self {
        Self {
            origin: None,
            width,
            height,
        }
    }

    pub fn from_params(params: &EffectParams) -> Result<Self> {
        let required = |key: &str| -> Result<u32> {
            params
                .get_u32("crop", key)?
                .ok_or_else(|| EffectError::invalid("crop", key, "missing whole-number parameter").into())
        };
        let (width, height) = (required("width")?, required("height")?);
        match (params.get_u32("crop", "x")?, params.get_u32("crop", "y")?) {
            (Some(x), Some(y)) => Ok(Self::new(x, y, width, height)),
            (None, None) => Ok(Self::centered(width, height)),
            _ => Err(EffectError::invalid("crop", "x", "give both x and y, or neither").into()),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct CropFilter {
    x: u32,
    y: u32,
    width: u32,
    height: u32,
}

impl<R: Raster> FrameFilter<R> for CropFilter {
    fn name(&self) -> &str {
        "crop"
    }

    fn apply(&self, raster: R, _t: f64) -> Result<R> {
        Ok(raster.cropped(self.x, self.y, self.width, self.height))
    }

    fn is_time_invariant(&self) -> bool {
        true
    }

    fn output_size(&self, _input: (u32, u32)) -> Option<(u32, u32)> {
        Some((self.width, self.height))
    }
}

impl VideoEffect for Crop {
    fn name(&self) -> &str {
        "crop"
    }

    fn apply(&self, clip: VideoClip) -> Result<VideoClip> {
        let (width, height) = clip.resolved_size()?;
        let (x, y) = self
            .origin
            .unwrap_or(((width.saturating_sub(self.width)) / 2, (height.saturating_sub(self.height)) / 2));

        let fits = self.width > 0
            && self.height > 0
            && u64::from(x) + u64::from(self.width) <= u64::from(width)
            && u64::from(y) + u64::from(self.height) <= u64::from(height);
        if !fits {
            return Err(EffectError::ApplicationFailed {
                effect: self.name().to_string(),
                reason: format!(
                    "{}x{} at ({}, {}) does not fit a {}x{} clip",
                    self.width, self.height, x, y, width, height
                ),
            }
            .into());
        }

        clip.raster_transform(CropFilter {
            x,
            y,
            width: self.width,
            height: self.height,
        })
    }

    fn metadata(&self) -> EffectMetadata {
        EffectMetadata::with_parameters(ApplyTo::MASK, &["width", "height"], &[("x", "left edge"), ("y", "top edge")])
    }
}

#[derive(Debug, Clone, Copy)]
enum Axis {
    Horizontal,
    Vertical,
}

#[derive(Debug, Clone, Copy)]
struct FlipFilter(Axis);

impl<R: Raster> FrameFilter<R> for FlipFilter {
    fn name(&self) -> &str {
        match self.0 {
            Axis::Horizontal => "mirror_x",
            Axis::Vertical => "mirror_y",
        }
    }

    fn apply(&self, raster: R, _t: f64) -> Result<R> {
        Ok(match self.0 {
            Axis::Horizontal => raster.flipped_horizontal(),
            Axis::Vertical => raster.flipped_vertical(),
        })
    }

    fn is_time_invariant(&self) -> bool {
        true
    }
}

/// Flip left to right.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MirrorX;

impl VideoEffect for MirrorX {
    fn name(&self) -> &str {
        "mirror_x"
    }

    fn apply(&self, clip: VideoClip) -> Result<VideoClip> {
        clip.raster_transform(FlipFilter(Axis::Horizontal))
    }

    fn metadata(&self) -> EffectMetadata {
        EffectMetadata::with_parameters(ApplyTo::MASK, &[], &[])
    }
}

/// Flip top to bottom.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MirrorY;

impl VideoEffect for MirrorY {
    fn name(&self) -> &str {
        "mirror_y"
    }

    fn apply(&self, clip: VideoClip) -> Result<VideoClip> {
        clip.raster_transform(FlipFilter(Axis::Vertical))
    }

    fn metadata(&self) -> EffectMetadata {
        EffectMetadata::with_parameters(ApplyTo::MASK, &[], &[])
    }
}

/// Multiply every colour channel by `factor`, saturating at 255.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MultiplyColor {
    pub factor: f32,
}

impl MultiplyColor {
    pub fn new(factor: f32) -> Self {
        Self { factor }
    }

    pub fn from_params(params: &EffectParams) -> Result<Self> {
        Ok(Self::new(params.require_f64("multiply_color", "factor")? as f32))
    }
}

impl VideoEffect for MultiplyColor {
    fn name(&self) -> &str {
        "multiply_color"
    }

    fn apply(&self, clip: VideoClip) -> Result<VideoClip> {
        if !self.factor.is_finite() || self.factor < 0.0 {
            return Err(EffectError::invalid(self.name(), "factor", "must be a non-negative number").into());
        }
        let factor = self.factor;
        clip.image_transform(FnFilter::per_frame(self.name(), move |frame: Frame| Ok(frame.multiplied(factor))))
    }

    fn metadata(&self) -> EffectMetadata {
        EffectMetadata::with_parameters(ApplyTo::NONE, &["factor"], &[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbered() -> VideoClip {
        VideoClip::from_fn("numbered", Some((4, 2)), Some(1.0), |_t| {
            let mut frame = Frame::new_black(4, 2);
            for y in 0..2 {
                for x in 0..4 {
                    frame.set_pixel(x, y, [(y * 4 + x) as u8, 0, 0]);
                }
            }
            Ok(frame)
        })
    }

    #[test]
    fn test_crop_frame_and_mask() {
        let clip = Crop::new(1, 0, 2, 2).apply(numbered().with_opaque_mask()).unwrap();
        assert_eq!(clip.size(), Some((2, 2)));
        let frame = clip.frame_at(0.0).unwrap();
        assert_eq!(frame.get_pixel(0, 0), [1, 0, 0]);
        assert_eq!(frame.get_pixel(1, 1), [6, 0, 0]);
        assert_eq!(clip.mask_at(0.0).unwrap().unwrap().size(), (2, 2));
    }

    #[test]
    fn test_centered_crop_and_bounds() {
        let clip = Crop::centered(2, 2).apply(numbered()).unwrap();
        assert_eq!(clip.frame_at(0.0).unwrap().get_pixel(0, 0), [1, 0, 0]);
        assert!(Crop::new(3, 0, 2, 2).apply(numbered()).is_err());
        assert!(Crop::centered(0, 1).apply(numbered()).is_err());
    }

    #[test]
    fn test_mirrors() {
        let flipped = MirrorX.apply(numbered()).unwrap();
        assert_eq!(flipped.frame_at(0.0).unwrap().get_pixel(0, 0), [3, 0, 0]);
        let flipped = MirrorY.apply(numbered()).unwrap();
        assert_eq!(flipped.frame_at(0.0).unwrap().get_pixel(0, 0), [4, 0, 0]);
    }

    #[test]
    fn test_multiply_color_on_constant_clip_stays_invariant() {
        let clip = MultiplyColor::new(0.5)
            .apply(VideoClip::color((1, 1), [200, 100, 0], None))
            .unwrap();
        assert!(clip.is_time_invariant());
        assert_eq!(clip.frame_at(7.0).unwrap().get_pixel(0, 0), [100, 50, 0]);
        assert!(MultiplyColor::new(-1.0).apply(clip).is_err());
    }
}
