//! # Composition
//!
//! Layering video clips onto a shared canvas and timeline. The
//! [`Compositor`] stacks clips by `layer_index` and blends them through their
//! masks; [`concatenate_videoclips`] plays clips back to back.

mod compositor;
mod concat;

pub use compositor::{Compositor, MaskShapePolicy, UnboundedPolicy};
pub use concat::concatenate_videoclips;
