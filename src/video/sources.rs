//! Leaf constructors for [`VideoClip`]: constant frames, images, datasets,
//! simulated worlds and external media.

use std::path::Path;
use std::sync::Arc;

use image::{GenericImageView, RgbaImage};
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::clip::{Clip, FrameSource};
use crate::error::{ClipError, Result, VideoError};
use crate::media::{MediaFrames, MediaSource, Rasterizer, TextParams};
use crate::time::TimeBase;
use crate::video::clip::VideoClip;
use crate::video::types::{Frame, Raster};

/// `render(items[floor(fps * t)])`, failing outside the dataset.
struct DataSource<T, R> {
    name: String,
    items: Vec<T>,
    timebase: TimeBase,
    render: R,
}

impl<T, R> FrameSource<Frame> for DataSource<T, R>
where
    T: Send + Sync,
    R: Fn(&T) -> Result<Frame> + Send + Sync,
{
    fn frame_at(&self, t: f64) -> Result<Frame> {
        match self.timebase.index_within(t, self.items.len()) {
            Some(index) => (self.render)(&self.items[index]),
            None => Err(ClipError::FrameUnavailable {
                clip: self.name.clone(),
                t,
                reason: format!(
                    "frame {} is outside the {} dataset entries",
                    self.timebase.frame_index(t),
                    self.items.len()
                ),
            }
            .into()),
        }
    }
}

/// A simulation advanced in discrete steps.
pub trait World: Send {
    /// Simulated time of the current state.
    fn clock(&self) -> f64;

    /// Advance by one step; the clock must move forward.
    fn step(&mut self) -> Result<()>;

    /// Picture of the current state.
    fn render(&self) -> Result<Frame>;
}

struct WorldState<W> {
    world: W,
    last_query: Option<f64>,
}

/// Steps a [`World`] forward until its clock reaches the query time.
struct WorldSource<W> {
    name: String,
    state: Mutex<WorldState<W>>,
}

impl<W: World> FrameSource<Frame> for WorldSource<W> {
    fn frame_at(&self, t: f64) -> Result<Frame> {
        let mut state = self.state.lock();
        let clock = state.world.clock();
        let floor = state.last_query.unwrap_or(clock);
        if t < floor {
            return Err(ClipError::NonMonotonicQuery {
                clip: self.name.clone(),
                requested: t,
                clock: floor,
            }
            .into());
        }

        while state.world.clock() < t {
            let before = state.world.clock();
            state.world.step()?;
            if state.world.clock() <= before {
                return Err(ClipError::FrameUnavailable {
                    clip: self.name.clone(),
                    t,
                    reason: format!("world clock stalled at {}", before),
                }
                .into());
            }
        }
        trace!("World '{}' at clock {} for t={}", self.name, state.world.clock(), t);

        state.last_query = Some(t);
        state.world.render()
    }

    fn is_stateful(&self) -> bool {
        true
    }
}

impl VideoClip {
    /// A solid colour. Time-invariant.
    pub fn color(size: (u32, u32), color: [u8; 3], duration: Option<f64>) -> Self {
        let frame = Frame::new_filled(size.0, size.1, color);
        Self::new(Clip::constant("ColorClip", frame, duration), Some(size))
    }

    /// A still image. Time-invariant.
    pub fn image(frame: Frame, duration: Option<f64>) -> Self {
        let size = frame.size();
        Self::new(Clip::constant("ImageClip", frame, duration), Some(size))
    }

    /// A still image whose alpha channel becomes the mask.
    pub fn from_rgba(image: &RgbaImage, duration: Option<f64>) -> Self {
        let (frame, mask) = Frame::from_rgba(image);
        Self::image(frame, duration).with_mask(Clip::constant("mask", mask, None))
    }

    /// Decode a still image from disk. Images with an alpha channel get a mask.
    pub fn open_image<P: AsRef<Path>>(path: P, duration: Option<f64>) -> Result<Self> {
        let path = path.as_ref();
        let decoded = image::open(path).map_err(|e| VideoError::LoadFailed {
            path: format!("{}: {}", path.display(), e),
        })?;
        let (width, height) = decoded.dimensions();
        debug!("Decoded image {} ({}x{})", path.display(), width, height);

        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "ImageClip".to_string());
        let clip = if decoded.color().has_alpha() {
            Self::from_rgba(&decoded.to_rgba8(), duration)
        } else {
            Self::image(Frame::new(decoded.to_rgb8()), duration)
        };
        Ok(clip.with_name(name))
    }

    /// A clip computed frame by frame from `func(t)`.
    pub fn from_fn<G>(name: &str, size: Option<(u32, u32)>, duration: Option<f64>, func: G) -> Self
    where
        G: Fn(f64) -> Result<Frame> + Send + Sync + 'static,
    {
        Self::new(Clip::from_fn(name, duration, func), size)
    }

    /// One entry of `items` per frame at `fps`, drawn by `render`.
    ///
    /// Lasts `items.len() / fps` seconds; asking for a time outside that
    /// window is a `FrameUnavailable` error.
    pub fn from_dataset<T, R>(name: &str, items: Vec<T>, fps: f64, render: R) -> Result<Self>
    where
        T: Send + Sync + 'static,
        R: Fn(&T) -> Result<Frame> + Send + Sync + 'static,
    {
        let timebase = TimeBase::new(fps)?;
        let duration = items.len() as f64 / fps;
        let size = match items.first() {
            Some(first) => Some(render(first)?.size()),
            None => None,
        };
        let source = DataSource {
            name: name.to_string(),
            items,
            timebase,
            render,
        };
        Ok(Self::new(Clip::new(name, source, Some(duration)), size).with_fps(Some(fps)))
    }

    /// Frames of a [`World`] advanced on demand.
    ///
    /// Queries must not go back in time; the clip is stateful and is never
    /// evaluated in parallel.
    pub fn from_world<W>(name: &str, world: W, duration: Option<f64>) -> Result<Self>
    where
        W: World + 'static,
    {
        let size = world.render()?.size();
        let source = WorldSource {
            name: name.to_string(),
            state: Mutex::new(WorldState {
                world,
                last_query: None,
            }),
        };
        Ok(Self::new(Clip::new(name, source, duration), Some(size)))
    }

    /// Frames decoded by an external [`MediaSource`].
    pub fn from_media(name: &str, source: Arc<dyn MediaSource<Frame>>) -> Self {
        let metadata = source.metadata();
        Self::new(Clip::new(name, MediaFrames::new(source), metadata.duration), metadata.size)
            .with_fps(Some(metadata.fps))
    }

    /// Text drawn once by `rasterizer`; its alpha becomes the mask.
    pub fn from_text(rasterizer: &dyn Rasterizer, params: &TextParams, duration: Option<f64>) -> Result<Self> {
        let image = rasterizer.render_text(params)?;
        if image.width() == 0 || image.height() == 0 {
            return Err(VideoError::InvalidParameters {
                details: format!("text '{}' rendered to an empty image", params.text),
            }
            .into());
        }
        Ok(Self::from_rgba(&image, duration).with_name("TextClip"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clip::Timeline;
    use crate::media::MediaMetadata;
    use crate::CompositorError;
    use image::Rgba;

    struct Counter {
        clock: f64,
        steps: usize,
    }

    impl World for Counter {
        fn clock(&self) -> f64 {
            self.clock
        }

        fn step(&mut self) -> Result<()> {
            self.clock += 0.5;
            self.steps += 1;
            Ok(())
        }

        fn render(&self) -> Result<Frame> {
            Ok(Frame::new_filled(2, 2, [self.steps as u8, 0, 0]))
        }
    }

    struct Stalled;

    impl World for Stalled {
        fn clock(&self) -> f64 {
            0.0
        }

        fn step(&mut self) -> Result<()> {
            Ok(())
        }

        fn render(&self) -> Result<Frame> {
            Ok(Frame::new_black(1, 1))
        }
    }

    #[test]
    fn test_color_clip_is_time_invariant() {
        let clip = VideoClip::color((3, 2), [255, 0, 0], Some(2.0));
        assert!(clip.is_time_invariant());
        assert_eq!(clip.size(), Some((3, 2)));
        assert_eq!(clip.frame_at(1.5).unwrap().get_pixel(2, 1), [255, 0, 0]);
    }

    #[test]
    fn test_dataset_clip_indexes_by_frame() {
        let clip = VideoClip::from_dataset("bars", vec![10_u8, 20, 30], 2.0, |v| Ok(Frame::new_filled(1, 1, [*v, 0, 0])))
            .unwrap();
        assert_eq!(clip.duration(), Some(1.5));
        assert_eq!(clip.fps(), Some(2.0));
        assert_eq!(clip.frame_at(0.0).unwrap().get_pixel(0, 0)[0], 10);
        assert_eq!(clip.frame_at(0.5).unwrap().get_pixel(0, 0)[0], 20);
        assert_eq!(clip.frame_at(1.49).unwrap().get_pixel(0, 0)[0], 30);

        let err = clip.frame_at(1.5).unwrap_err();
        assert!(matches!(err, CompositorError::Clip(ClipError::FrameUnavailable { .. })));
        assert!(clip.frame_at(-0.1).is_err());
    }

    #[test]
    fn test_world_clip_steps_forward_only() {
        let clip = VideoClip::from_world("counter", Counter { clock: 0.0, steps: 0 }, Some(5.0)).unwrap();
        assert!(clip.is_stateful());
        assert_eq!(clip.frame_at(0.0).unwrap().get_pixel(0, 0)[0], 0);
        assert_eq!(clip.frame_at(1.2).unwrap().get_pixel(0, 0)[0], 3);
        assert_eq!(clip.frame_at(1.2).unwrap().get_pixel(0, 0)[0], 3);

        let err = clip.frame_at(1.0).unwrap_err();
        assert!(matches!(
            err,
            CompositorError::Clip(ClipError::NonMonotonicQuery { requested, clock, .. }) if requested == 1.0 && clock == 1.2
        ));
    }

    #[test]
    fn test_world_clip_rejects_time_before_clock_and_stalls() {
        let ahead = VideoClip::from_world("ahead", Counter { clock: 2.0, steps: 0 }, None).unwrap();
        assert!(ahead.frame_at(1.0).is_err());

        let stalled = VideoClip::from_world("stalled", Stalled, None).unwrap();
        let err = stalled.frame_at(1.0).unwrap_err();
        assert!(matches!(err, CompositorError::Clip(ClipError::FrameUnavailable { .. })));
    }

    #[test]
    fn test_rgba_alpha_becomes_mask() {
        let mut image = RgbaImage::from_pixel(2, 1, Rgba([9, 9, 9, 255]));
        image.put_pixel(1, 0, Rgba([9, 9, 9, 0]));
        let clip = VideoClip::from_rgba(&image, Some(1.0));
        let mask = clip.mask_at(0.0).unwrap().unwrap();
        assert_eq!(mask.get(0, 0), 1.0);
        assert_eq!(mask.get(1, 0), 0.0);
        assert_eq!(clip.mask().unwrap().duration(), Some(1.0));
    }

    #[test]
    fn test_open_image_reads_png_with_alpha() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logo.png");
        RgbaImage::from_pixel(3, 2, Rgba([0, 128, 255, 128])).save(&path).unwrap();

        let clip = VideoClip::open_image(&path, Some(2.0)).unwrap();
        assert_eq!(clip.name(), "logo.png");
        assert_eq!(clip.size(), Some((3, 2)));
        assert_eq!(clip.frame_at(0.0).unwrap().get_pixel(0, 0), [0, 128, 255]);
        assert!((clip.mask_at(0.0).unwrap().unwrap().get(0, 0) - 128.0 / 255.0).abs() < 1e-6);

        assert!(VideoClip::open_image(dir.path().join("missing.png"), None).is_err());
    }

    struct Block;

    impl Rasterizer for Block {
        fn render_text(&self, params: &TextParams) -> Result<RgbaImage> {
            let width = params.text.len() as u32 * 2;
            let [r, g, b] = params.color;
            Ok(RgbaImage::from_pixel(width, 4, Rgba([r, g, b, 255])))
        }
    }

    #[test]
    fn test_text_clip_uses_rasterizer() {
        let clip = VideoClip::from_text(&Block, &TextParams::new("hey", 12.0), Some(1.0)).unwrap();
        assert_eq!(clip.size(), Some((6, 4)));
        assert_eq!(clip.frame_at(0.0).unwrap().get_pixel(5, 3), [255, 255, 255]);
        assert!(clip.mask().is_some());
        assert!(VideoClip::from_text(&Block, &TextParams::new("", 12.0), None).is_err());
    }

    struct Stripes;

    impl MediaSource<Frame> for Stripes {
        fn metadata(&self) -> MediaMetadata {
            MediaMetadata {
                fps: 10.0,
                duration: Some(0.5),
                size: Some((2, 1)),
                channel_count: 0,
            }
        }

        fn get_frame(&self, t: f64) -> Result<Frame> {
            Ok(Frame::new_filled(2, 1, [(t * 100.0) as u8, 0, 0]))
        }
    }

    #[test]
    fn test_media_clip_takes_metadata() {
        let clip = VideoClip::from_media("stripes", Arc::new(Stripes));
        assert_eq!(clip.duration(), Some(0.5));
        assert_eq!(clip.fps(), Some(10.0));
        assert_eq!(clip.frame_at(0.25).unwrap().get_pixel(0, 0)[0], 25);
    }
}
