use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::error::{ClipError, Result, VideoError};
use crate::media::{MediaMetadata, MediaSource};
use crate::time::TimeBase;
use crate::video::clip::VideoClip;
use crate::video::types::{Frame, Raster};

/// A directory of numbered still images played back as video.
///
/// Files named `NN_name.ext` are ordered by `NN`; other image files follow
/// in name order. Hidden files and non-images are skipped.
pub struct ImageSequence {
    name: String,
    frames: Vec<PathBuf>,
    timebase: TimeBase,
    size: (u32, u32),
    last_decoded: Mutex<Option<(usize, Frame)>>,
}

impl ImageSequence {
    pub fn from_directory<P: AsRef<Path>>(directory: P, fps: f64) -> Result<Self> {
        let directory = directory.as_ref();
        if !directory.is_dir() {
            return Err(VideoError::LoadFailed {
                path: directory.display().to_string(),
            }
            .into());
        }

        let mut frames = Vec::new();
        for entry in std::fs::read_dir(directory)? {
            let path = entry?.path();
            if path.is_file() && !Self::is_hidden_file(&path) && Self::is_image_file(&path) {
                frames.push(path);
            } else {
                debug!("Skipping {:?}", path);
            }
        }
        frames.sort_by_key(|path| Self::sort_key(path));

        let name = directory
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "ImageSequence".to_string());
        Self::from_files(name, frames, fps)
    }

    /// Frames in the given order.
    pub fn from_files(name: impl Into<String>, frames: Vec<PathBuf>, fps: f64) -> Result<Self> {
        let name = name.into();
        let timebase = TimeBase::new(fps)?;
        let first = frames.first().ok_or_else(|| VideoError::LoadFailed {
            path: format!("No image files found for sequence '{}'", name),
        })?;
        let size = image::image_dimensions(first).map_err(|e| VideoError::LoadFailed {
            path: format!("{}: {}", first.display(), e),
        })?;

        info!("Loaded image sequence '{}': {} frames of {}x{} at {} fps", name, frames.len(), size.0, size.1, fps);
        Ok(Self {
            name,
            frames,
            timebase,
            size,
            last_decoded: Mutex::new(None),
        })
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Wrap the sequence in a clip with its metadata.
    pub fn into_clip(self) -> VideoClip {
        let name = self.name.clone();
        VideoClip::from_media(&name, Arc::new(self))
    }

    fn decode(&self, index: usize) -> Result<Frame> {
        let path = &self.frames[index];
        let image = image::open(path).map_err(|e| VideoError::DecodingFailed {
            reason: format!("{}: {}", path.display(), e),
        })?;
        let frame = Frame::new(image.to_rgb8());
        if frame.size() != self.size {
            return Err(ClipError::IncompatibleFrameShape {
                clip: self.name.clone(),
                expected: self.size,
                actual: frame.size(),
            }
            .into());
        }
        Ok(frame)
    }

    /// `NN_name` files sort by `NN`, everything else after them by name.
    fn sort_key(path: &Path) -> (u32, String) {
        let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
        let sequence = stem
            .split_once('_')
            .and_then(|(number, _)| number.parse().ok())
            .unwrap_or(u32::MAX);
        (sequence, stem.to_string())
    }

    fn is_image_file(path: &Path) -> bool {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) => matches!(ext.to_lowercase().as_str(), "jpg" | "jpeg" | "png"),
            None => false,
        }
    }

    fn is_hidden_file(path: &Path) -> bool {
        path.file_name()
            .and_then(|name| name.to_str())
            .map(|name| name.starts_with('.'))
            .unwrap_or(false)
    }
}

impl MediaSource<Frame> for ImageSequence {
    fn metadata(&self) -> MediaMetadata {
        MediaMetadata {
            fps: self.timebase.fps(),
            duration: Some(self.frames.len() as f64 / self.timebase.fps()),
            size: Some(self.size),
            channel_count: 3,
        }
    }

    fn get_frame(&self, t: f64) -> Result<Frame> {
        let index = match self.timebase.index_within(t, self.frames.len()) {
            Some(index) => index,
            None => {
                warn!("Image sequence '{}' has no frame at t={}", self.name, t);
                return Err(ClipError::FrameUnavailable {
                    clip: self.name.clone(),
                    t,
                    reason: format!("frame {} of {}", self.timebase.frame_index(t), self.frames.len()),
                }
                .into());
            }
        };

        let mut last = self.last_decoded.lock();
        if let Some((cached, frame)) = last.as_ref() {
            if *cached == index {
                return Ok(frame.clone());
            }
        }
        let frame = self.decode(index)?;
        *last = Some((index, frame.clone()));
        Ok(frame)
    }
}
