//! Effects: immutable parameter records that turn one clip into another.
//!
//! An effect never mutates its input. `apply` consumes a clip and returns a
//! new one whose pipeline carries the transform, so the same effect value
//! can be applied to many clips.
//!
//! ```rust,no_run
//! use clip_compositor::effects::{FadeIn, MultiplySpeed, Resize};
//! use clip_compositor::video::VideoClip;
//!
//! # fn main() -> clip_compositor::Result<()> {
//! let clip = VideoClip::color((640, 360), [200, 40, 40], Some(4.0))
//!     .with_effects(&[&MultiplySpeed::new(2.0), &Resize::by(0.5), &FadeIn::new(0.5)])?;
//! # Ok(())
//! # }
//! ```
//!
//! Effects can also be built by name with the [`EffectRegistry`], which is
//! how effect chains in a config file are resolved.

mod audio;
mod fade;
mod registry;
mod resize;
mod rotate;
mod time;
mod traits;
mod transform;

pub use audio::{AudioFadeIn, AudioFadeOut, MultiplyVolume};
pub use fade::{CrossFadeIn, CrossFadeOut, FadeIn, FadeOut};
pub use registry::{EffectConfig, EffectRegistry};
pub use resize::{Resize, ResizeSpec};
pub use rotate::{Angle, AngleUnit, Rotate};
pub use time::{Loop, MultiplySpeed, TimeMirror, TimeSymmetrize};
pub use traits::{AudioEffect, EffectMetadata, EffectParams, ParamValue, VideoEffect};
pub use transform::{Crop, MirrorX, MirrorY, MultiplyColor};
