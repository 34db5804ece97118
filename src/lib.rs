//! # clip-compositor
//!
//! Declarative, time-indexed media composition. Every clip is a pure mapping
//! from time to a frame (an RGB grid, an opacity grid or an audio sample
//! frame) with a start, an end and a duration. Clips are combined through
//! effects, layered by the [`Compositor`] and mixed by the
//! [`CompositeAudioClip`](audio::CompositeAudioClip).
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use clip_compositor::{
//!     effects::{FadeIn, MultiplySpeed},
//!     export::{render_video, CancelToken, PngSequenceSink},
//!     video::{Position, VideoClip},
//!     Compositor, Timeline,
//! };
//!
//! # fn main() -> clip_compositor::Result<()> {
//! let background = VideoClip::color((640, 360), [0, 0, 0], Some(4.0));
//! let title = VideoClip::color((320, 90), [240, 200, 40], Some(3.0))
//!     .with_effects(&[&FadeIn::new(0.5), &MultiplySpeed::new(1.5)])?
//!     .with_start(0.5, true)?
//!     .with_position(Position::center());
//!
//! let composite = Compositor::new(vec![background, title]).build()?;
//!
//! let mut sink = PngSequenceSink::new("frames/")?;
//! render_video(&composite, 24.0, &mut sink, &CancelToken::new())?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`clip`] - Timing, time maps and the frame pipeline shared by all clips
//! - [`video`] - Video clips, masks, positions and image sources
//! - [`audio`] - Audio clips, loading and mixing
//! - [`effects`] - Effect traits, the built-in catalog and the registry
//! - [`composition`] - Layered compositing and concatenation
//! - [`export`] - Render loops, sinks and the ffmpeg encoder
//! - [`config`] - Configuration management
//!
//! ## Writing Effects
//!
//! Custom effects implement [`VideoEffect`](effects::VideoEffect):
//!
//! ```rust,no_run
//! use clip_compositor::effects::VideoEffect;
//! use clip_compositor::video::{Frame, VideoClip};
//! use clip_compositor::clip::FnFilter;
//! use clip_compositor::Result;
//!
//! #[derive(Debug)]
//! struct Invert;
//!
//! impl VideoEffect for Invert {
//!     fn name(&self) -> &str {
//!         "invert"
//!     }
//!
//!     fn apply(&self, clip: VideoClip) -> Result<VideoClip> {
//!         clip.image_transform(FnFilter::per_frame("invert", |frame: Frame| {
//!             let (w, h) = (frame.as_image().width(), frame.as_image().height());
//!             let mut out = Frame::new_black(w, h);
//!             for y in 0..h {
//!                 for x in 0..w {
//!                     let [r, g, b] = frame.get_pixel(x, y);
//!                     out.set_pixel(x, y, [255 - r, 255 - g, 255 - b]);
//!                 }
//!             }
//!             Ok(out)
//!         }))
//!     }
//! }
//! ```

pub mod audio;
pub mod clip;
pub mod composition;
pub mod config;
pub mod effects;
pub mod error;
pub mod export;
pub mod media;
pub mod time;
pub mod video;

// Re-export commonly used types for convenience
pub use crate::{
    audio::AudioClip,
    clip::Timeline,
    composition::{concatenate_videoclips, Compositor},
    config::Config,
    error::{CompositorError, Result},
    video::VideoClip,
};
