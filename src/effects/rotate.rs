use std::fmt;
use std::sync::Arc;

use image::{Luma, Rgb};
use serde::{Deserialize, Serialize};

use crate::clip::{ApplyTo, FrameFilter};
use crate::effects::traits::{EffectMetadata, EffectParams, VideoEffect};
use crate::error::{EffectError, Result};
use crate::video::{Frame, MaskFrame, Raster, VideoClip};

type AngleFn = Arc<dyn Fn(f64) -> f64 + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AngleUnit {
    #[default]
    Degrees,
    Radians,
}

/// A fixed angle, or one computed from clip-local time.
#[derive(Clone)]
pub enum Angle {
    Fixed(f64),
    Animated(AngleFn),
}

impl Angle {
    fn at(&self, t: f64) -> f64 {
        match self {
            Self::Fixed(angle) => *angle,
            Self::Animated(func) => func(t),
        }
    }
}

impl fmt::Debug for Angle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed(angle) => write!(f, "Fixed({})", angle),
            Self::Animated(_) => write!(f, "Animated"),
        }
    }
}

#[derive(Debug, Clone)]
struct RotateFilter {
    angle: Angle,
    unit: AngleUnit,
    center: Option<(f64, f64)>,
    expand: bool,
    fill: [u8; 3],
}

impl RotateFilter {
    fn degrees(&self, t: f64) -> f64 {
        let angle = self.angle.at(t);
        match self.unit {
            AngleUnit::Degrees => angle,
            AngleUnit::Radians => angle.to_degrees(),
        }
    }

    fn fixed_output(&self, input: (u32, u32)) -> Option<(u32, u32)> {
        let Angle::Fixed(_) = self.angle else {
            return None;
        };
        if !self.expand {
            return Some(input);
        }
        let degrees = self.degrees(0.0).rem_euclid(360.0);
        let quarters = (degrees / 90.0).round();
        if (degrees - quarters * 90.0).abs() > 1e-9 || self.center.is_some() {
            return None;
        }
        if quarters as u32 % 2 == 1 {
            Some((input.1, input.0))
        } else {
            Some(input)
        }
    }
}

impl FrameFilter<Frame> for RotateFilter {
    fn name(&self) -> &str {
        "rotate"
    }

    fn apply(&self, frame: Frame, t: f64) -> Result<Frame> {
        Ok(frame.rotated(self.degrees(t), self.center, self.expand, Rgb(self.fill)))
    }

    fn is_time_invariant(&self) -> bool {
        matches!(self.angle, Angle::Fixed(_))
    }

    fn output_size(&self, input: (u32, u32)) -> Option<(u32, u32)> {
        self.fixed_output(input)
    }
}

impl FrameFilter<MaskFrame> for RotateFilter {
    fn name(&self) -> &str {
        "rotate"
    }

    fn apply(&self, mask: MaskFrame, t: f64) -> Result<MaskFrame> {
        Ok(mask.rotated(self.degrees(t), self.center, self.expand, Luma([0.0])))
    }

    fn is_time_invariant(&self) -> bool {
        matches!(self.angle, Angle::Fixed(_))
    }

    fn output_size(&self, input: (u32, u32)) -> Option<(u32, u32)> {
        self.fixed_output(input)
    }
}

/// Rotate counter-clockwise around the frame center (or `center`).
///
/// Quarter turns are exact. Other angles are resampled bilinearly; with
/// `expand` (the default) the canvas grows to hold the whole rotated frame.
/// Uncovered corners take `bg_color` when one is given; otherwise the clip
/// gets a mask so the corners are transparent.
#[derive(Debug, Clone)]
pub struct Rotate {
    pub angle: Angle,
    pub unit: AngleUnit,
    pub center: Option<(f64, f64)>,
    pub expand: bool,
    pub bg_color: Option<[u8; 3]>,
}

impl Rotate {
    pub fn new(degrees: f64) -> Self {
        Self {
            angle: Angle::Fixed(degrees),
            unit: AngleUnit::Degrees,
            center: None,
            expand: true,
            bg_color: None,
        }
    }

    pub fn animated<G>(angle: G, unit: AngleUnit) -> Self
    where
        G: Fn(f64) -> f64 + Send + Sync + 'static,
    {
        Self {
            angle: Angle::Animated(Arc::new(angle)),
            unit,
            ..Self::new(0.0)
        }
    }

    pub fn with_center(mut self, center: (f64, f64)) -> Self {
        self.center = Some(center);
        self
    }

    pub fn with_expand(mut self, expand: bool) -> Self {
        self.expand = expand;
        self
    }

    pub fn with_bg_color(mut self, color: [u8; 3]) -> Self {
        self.bg_color = Some(color);
        self
    }

    pub fn from_params(params: &EffectParams) -> Result<Self> {
        let angle = params.require_f64("rotate", "angle")?;
        let unit = match params.get_string("unit").unwrap_or("deg") {
            "deg" | "degrees" => AngleUnit::Degrees,
            "rad" | "radians" => AngleUnit::Radians,
            other => return Err(EffectError::invalid("rotate", "unit", format!("unknown unit '{}'", other)).into()),
        };
        let mut rotate = Self::new(angle).with_expand(params.get_bool_or("expand", true));
        rotate.unit = unit;
        rotate.bg_color = params.get_color("rotate", "bg_color")?;
        Ok(rotate)
    }

    fn is_exact_turn(&self) -> bool {
        let Angle::Fixed(angle) = self.angle else {
            return false;
        };
        let degrees = match self.unit {
            AngleUnit::Degrees => angle,
            AngleUnit::Radians => angle.to_degrees(),
        };
        let quarters = (degrees / 90.0).round();
        (degrees - quarters * 90.0).abs() < 1e-9 && self.center.is_none()
    }
}

impl VideoEffect for Rotate {
    fn name(&self) -> &str {
        "rotate"
    }

    fn apply(&self, clip: VideoClip) -> Result<VideoClip> {
        if let Angle::Fixed(angle) = self.angle {
            if !angle.is_finite() {
                return Err(EffectError::invalid(self.name(), "angle", "must be finite").into());
            }
        }

        let clip = if self.bg_color.is_none() && !self.is_exact_turn() {
            clip.with_opaque_mask()
        } else {
            clip
        };
        clip.raster_transform(RotateFilter {
            angle: self.angle.clone(),
            unit: self.unit,
            center: self.center,
            expand: self.expand,
            fill: self.bg_color.unwrap_or([0, 0, 0]),
        })
    }

    fn metadata(&self) -> EffectMetadata {
        EffectMetadata::with_parameters(
            ApplyTo::MASK,
            &["angle"],
            &[
                ("unit", "deg or rad"),
                ("expand", "grow the canvas to fit"),
                ("bg_color", "[r, g, b] for uncovered corners"),
            ],
        )
    }
}
