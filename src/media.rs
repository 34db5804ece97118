//! # External Media Interfaces
//!
//! Narrow seams to collaborators the library does not implement itself:
//! decoders that can produce a frame for a time, and text rasterizers.

use std::path::PathBuf;
use std::sync::Arc;

use image::RgbaImage;
use serde::{Deserialize, Serialize};

use crate::clip::FrameSource;
use crate::error::Result;

/// Static properties of a decoded media stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaMetadata {
    pub fps: f64,
    pub duration: Option<f64>,
    pub size: Option<(u32, u32)>,
    pub channel_count: usize,
}

/// A decoder able to produce the frame (or audio sample frame) at `t`.
pub trait MediaSource<F>: Send + Sync {
    fn metadata(&self) -> MediaMetadata;

    fn get_frame(&self, t: f64) -> Result<F>;
}

/// Adapts a [`MediaSource`] to the clip pipeline.
pub(crate) struct MediaFrames<F> {
    inner: Arc<dyn MediaSource<F>>,
}

impl<F> MediaFrames<F> {
    pub(crate) fn new(inner: Arc<dyn MediaSource<F>>) -> Self {
        Self { inner }
    }
}

impl<F> FrameSource<F> for MediaFrames<F> {
    fn frame_at(&self, t: f64) -> Result<F> {
        self.inner.get_frame(t)
    }
}

/// Text layout request handed to a [`Rasterizer`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextParams {
    pub text: String,
    pub font: Option<PathBuf>,
    pub font_size: f32,
    pub color: [u8; 3],
    /// Opaque background; transparent when absent.
    pub background: Option<[u8; 3]>,
    /// Fixed canvas size; the rasterizer picks one when absent.
    pub size: Option<(u32, u32)>,
}

impl TextParams {
    pub fn new(text: impl Into<String>, font_size: f32) -> Self {
        Self {
            text: text.into(),
            font: None,
            font_size,
            color: [255, 255, 255],
            background: None,
            size: None,
        }
    }
}

/// Renders text into an RGBA bitmap; alpha becomes the clip mask.
pub trait Rasterizer: Send + Sync {
    fn render_text(&self, params: &TextParams) -> Result<RgbaImage>;
}
