use std::fmt;
use std::sync::Arc;

use crate::clip::{ApplyTo, FrameFilter};
use crate::effects::traits::{EffectMetadata, EffectParams, VideoEffect};
use crate::error::{EffectError, Result};
use crate::video::{Frame, MaskFrame, Raster, VideoClip};

type ScaleFn = Arc<dyn Fn(f64) -> f64 + Send + Sync>;

/// How the output size is derived from the clip's size.
#[derive(Clone)]
pub enum ResizeSpec {
    Exact(u32, u32),
    Scale(f64),
    /// Given width, height keeps the aspect ratio.
    Width(u32),
    /// Given height, width keeps the aspect ratio.
    Height(u32),
    /// Scale factor as a function of clip-local time.
    Animated(ScaleFn),
}

impl ResizeSpec {
    fn target(&self, reference: (u32, u32), t: f64) -> Result<(u32, u32)> {
        let (width, height) = (f64::from(reference.0), f64::from(reference.1));
        let (w, h) = match self {
            Self::Exact(w, h) => (f64::from(*w), f64::from(*h)),
            Self::Scale(factor) => (width * factor, height * factor),
            Self::Width(w) => (f64::from(*w), height * f64::from(*w) / width),
            Self::Height(h) => (width * f64::from(*h) / height, f64::from(*h)),
            Self::Animated(scale) => {
                let factor = scale(t);
                (width * factor, height * factor)
            }
        };
        let (w, h) = (w.round(), h.round());
        if !(w >= 1.0 && h >= 1.0) || !w.is_finite() || !h.is_finite() {
            return Err(EffectError::ApplicationFailed {
                effect: "resize".to_string(),
                reason: format!("{}x{} at t={} resolves to an empty frame", w, h, t),
            }
            .into());
        }
        Ok((w as u32, h as u32))
    }
}

impl fmt::Debug for ResizeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(w, h) => write!(f, "Exact({}, {})", w, h),
            Self::Scale(factor) => write!(f, "Scale({})", factor),
            Self::Width(w) => write!(f, "Width({})", w),
            Self::Height(h) => write!(f, "Height({})", h),
            Self::Animated(_) => write!(f, "Animated"),
        }
    }
}

/// Resize frames and mask to the same target, resolved against the size
/// the clip had when the effect was applied.
#[derive(Clone)]
struct ResizeFilter {
    spec: ResizeSpec,
    reference: (u32, u32),
}

impl ResizeFilter {
    fn fixed_target(&self) -> Option<(u32, u32)> {
        match self.spec {
            ResizeSpec::Animated(_) => None,
            _ => self.spec.target(self.reference, 0.0).ok(),
        }
    }
}

impl FrameFilter<Frame> for ResizeFilter {
    fn name(&self) -> &str {
        "resize"
    }

    fn apply(&self, frame: Frame, t: f64) -> Result<Frame> {
        let (w, h) = self.spec.target(self.reference, t)?;
        Ok(frame.resized(w, h))
    }

    fn is_time_invariant(&self) -> bool {
        !matches!(self.spec, ResizeSpec::Animated(_))
    }

    fn output_size(&self, _input: (u32, u32)) -> Option<(u32, u32)> {
        self.fixed_target()
    }
}

impl FrameFilter<MaskFrame> for ResizeFilter {
    fn name(&self) -> &str {
        "resize"
    }

    fn apply(&self, mask: MaskFrame, t: f64) -> Result<MaskFrame> {
        let (w, h) = self.spec.target(self.reference, t)?;
        Ok(mask.resized(w, h))
    }

    fn is_time_invariant(&self) -> bool {
        !matches!(self.spec, ResizeSpec::Animated(_))
    }

    fn output_size(&self, _input: (u32, u32)) -> Option<(u32, u32)> {
        self.fixed_target()
    }
}

/// Resize a clip and its mask.
#[derive(Debug, Clone)]
pub struct Resize {
    spec: ResizeSpec,
}

impl Resize {
    pub fn new(spec: ResizeSpec) -> Self {
        Self { spec }
    }

    pub fn to_size(width: u32, height: u32) -> Self {
        Self::new(ResizeSpec::Exact(width, height))
    }

    pub fn by(factor: f64) -> Self {
        Self::new(ResizeSpec::Scale(factor))
    }

    /// Scale factor varying with clip-local time.
    pub fn animated<G>(scale: G) -> Self
    where
        G: Fn(f64) -> f64 + Send + Sync + 'static,
    {
        Self::new(ResizeSpec::Animated(Arc::new(scale)))
    }

    pub fn from_params(params: &EffectParams) -> Result<Self> {
        let width = params.get_u32("resize", "width")?;
        let height = params.get_u32("resize", "height")?;
        let spec = match (width, height, params.get_f64("scale")) {
            (Some(w), Some(h), None) => ResizeSpec::Exact(w, h),
            (Some(w), None, None) => ResizeSpec::Width(w),
            (None, Some(h), None) => ResizeSpec::Height(h),
            (None, None, Some(factor)) => ResizeSpec::Scale(factor),
            _ => {
                return Err(EffectError::invalid("resize", "scale", "give width and/or height, or scale alone").into());
            }
        };
        Ok(Self::new(spec))
    }
}

impl VideoEffect for Resize {
    fn name(&self) -> &str {
        "resize"
    }

    fn apply(&self, clip: VideoClip) -> Result<VideoClip> {
        let reference = clip.resolved_size()?;
        let filter = ResizeFilter {
            spec: self.spec.clone(),
            reference,
        };
        // validate fixed targets before any frame is rendered
        if !matches!(self.spec, ResizeSpec::Animated(_)) {
            filter.spec.target(reference, 0.0)?;
        }
        clip.raster_transform(filter)
    }

    fn metadata(&self) -> EffectMetadata {
        EffectMetadata::with_parameters(
            ApplyTo::MASK,
            &[],
            &[("width", "target width"), ("height", "target height"), ("scale", "size multiplier")],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_width_keeps_aspect_and_mask_follows() {
        let clip = VideoClip::color((40, 20), [9, 9, 9], Some(1.0)).with_opaque_mask();
        let resized = Resize::new(ResizeSpec::Width(10)).apply(clip).unwrap();

        assert_eq!(resized.size(), Some((10, 5)));
        assert!(resized.is_time_invariant());
        assert_eq!(resized.frame_at(0.5).unwrap().size(), (10, 5));
        assert_eq!(resized.mask_at(0.5).unwrap().unwrap().size(), (10, 5));
    }

    #[test]
    fn test_animated_scale_resolves_per_frame() {
        let clip = VideoClip::color((10, 10), [0, 0, 0], Some(2.0)).with_opaque_mask();
        let resized = Resize::animated(|t| 1.0 + t).apply(clip).unwrap();

        assert_eq!(resized.size(), None);
        assert!(!resized.is_time_invariant());
        assert_eq!(resized.frame_at(1.0).unwrap().size(), (20, 20));
        assert_eq!(resized.mask_at(1.5).unwrap().unwrap().size(), (25, 25));
    }

    #[test]
    fn test_degenerate_target_rejected() {
        let clip = VideoClip::color((10, 10), [0, 0, 0], None);
        assert!(Resize::by(0.0).apply(clip).is_err());
        assert!(Resize::from_params(&EffectParams::new()).is_err());

        let params = EffectParams::new().set("height", 5_i64);
        let resized = Resize::from_params(&params)
            .unwrap()
            .apply(VideoClip::color((20, 10), [0, 0, 0], None))
            .unwrap();
        assert_eq!(resized.size(), Some((10, 5)));
    }
}
