//! # Video Module
//!
//! Video clips and the frame types they produce.
//!
//! A [`VideoClip`] pairs a clip of RGB [`Frame`]s with an optional mask clip
//! of opacity grids ([`MaskFrame`]) and an optional audio track. Leaf
//! constructors cover solid colours, still images, datasets rendered one
//! entry per frame, stepped simulations ([`World`]) and decoded media.

pub mod batch;
pub mod clip;
pub mod loader;
pub mod position;
pub mod sources;
pub mod types;

pub use batch::BatchRenderer;
pub use clip::{FrameIter, MaskClip, VideoClip};
pub use loader::ImageSequence;
pub use position::{Coord, Placement, Position};
pub use sources::World;
pub use types::{ChannelValue, Frame, MaskFrame, Raster, VideoParams};
