use std::fs::{create_dir_all, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use image::{Rgba, RgbaImage};
use tracing::{debug, info};

use crate::audio::AudioChunk;
use crate::error::{ExportError, Result};
use crate::video::{Frame, MaskFrame, Raster};

/// Receives rendered frames in presentation order.
pub trait VideoSink {
    /// `index` counts from 0; `mask` is present for clips with a mask.
    fn write_frame(&mut self, index: usize, frame: &Frame, mask: Option<&MaskFrame>) -> Result<()>;

    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Receives rendered audio in consecutive chunks.
pub trait AudioSink {
    fn write_chunk(&mut self, chunk: &AudioChunk) -> Result<()>;

    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Writes `frame_000000.png`, `frame_000001.png`, ... into a directory.
///
/// Frames with a mask are written as RGBA with the mask as alpha.
#[derive(Debug)]
pub struct PngSequenceSink {
    dir: PathBuf,
    written: Vec<PathBuf>,
}

impl PngSequenceSink {
    pub fn new<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        create_dir_all(&dir)?;
        Ok(Self {
            dir,
            written: Vec::new(),
        })
    }

    /// `printf`-style pattern of the file names, as ffmpeg's image2 demuxer
    /// expects it.
    pub fn pattern(&self) -> PathBuf {
        self.dir.join("frame_%06d.png")
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.written
    }
}

fn with_alpha(frame: &Frame, mask: &MaskFrame) -> RgbaImage {
    let (width, height) = frame.size();
    RgbaImage::from_fn(width, height, |x, y| {
        let [r, g, b] = frame.get_pixel(x, y);
        let alpha = if x < mask.width() && y < mask.height() {
            (mask.get(x, y).clamp(0.0, 1.0) * 255.0).round() as u8
        } else {
            0
        };
        Rgba([r, g, b, alpha])
    })
}

impl VideoSink for PngSequenceSink {
    fn write_frame(&mut self, index: usize, frame: &Frame, mask: Option<&MaskFrame>) -> Result<()> {
        let path = self.dir.join(format!("frame_{:06}.png", index));
        let saved = match mask {
            Some(mask) => with_alpha(frame, mask).save(&path),
            None => frame.save_png(&path),
        };
        saved.map_err(|e| ExportError::EncodingFailed {
            reason: format!("Failed to save frame {}: {}", path.display(), e),
        })?;
        self.written.push(path);
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        info!("Saved {} frames to {:?}", self.written.len(), self.dir);
        Ok(())
    }
}

/// 16-bit PCM WAV writer. Samples are clamped to `[-1, 1]` here and
/// nowhere earlier.
pub struct WavSink {
    path: PathBuf,
    sample_rate: u32,
    channels: u16,
    writer: Option<hound::WavWriter<BufWriter<File>>>,
}

impl WavSink {
    pub fn create<P: AsRef<Path>>(path: P, sample_rate: u32, channels: u16) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let writer = hound::WavWriter::create(&path, spec).map_err(|e| ExportError::EncodingFailed {
            reason: format!("Failed to create {}: {}", path.display(), e),
        })?;
        Ok(Self {
            path,
            sample_rate,
            channels,
            writer: Some(writer),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AudioSink for WavSink {
    fn write_chunk(&mut self, chunk: &AudioChunk) -> Result<()> {
        if chunk.channels != usize::from(self.channels) || chunk.sample_rate != self.sample_rate {
            return Err(ExportError::EncodingFailed {
                reason: format!(
                    "chunk is {} channels at {} Hz, {} expects {} at {} Hz",
                    chunk.channels,
                    chunk.sample_rate,
                    self.path.display(),
                    self.channels,
                    self.sample_rate
                ),
            }
            .into());
        }

        let writer = self.writer.as_mut().ok_or_else(|| ExportError::EncodingFailed {
            reason: format!("{} is already finalized", self.path.display()),
        })?;
        for sample in chunk.to_i16() {
            writer.write_sample(sample).map_err(|e| ExportError::EncodingFailed {
                reason: format!("Failed to write sample: {}", e),
            })?;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if let Some(writer) = self.writer.take() {
            writer.finalize().map_err(|e| ExportError::EncodingFailed {
                reason: format!("Failed to finalize {}: {}", self.path.display(), e),
            })?;
            debug!("Finalized {:?}", self.path);
        }
        Ok(())
    }
}

impl std::fmt::Debug for WavSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WavSink")
            .field("path", &self.path)
            .field("sample_rate", &self.sample_rate)
            .field("channels", &self.channels)
            .finish()
    }
}
