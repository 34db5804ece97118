use std::ops::Range;
use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use crate::audio::loader::AudioLoader;
use crate::audio::types::{AudioChunk, AudioData, AudioFrame};
use crate::clip::{Clip, FnFilter, FrameFilter, FrameSource, TimeMap, Timeline, Timing};
use crate::effects::AudioEffect;
use crate::error::{AudioError, Result};
use crate::media::{MediaFrames, MediaSource};
use crate::time::TimeBase;

/// Interleaved samples played back at a fixed rate; silent outside its range.
struct SampleArray {
    samples: Vec<f32>,
    channels: usize,
    timebase: TimeBase,
}

impl FrameSource<AudioFrame> for SampleArray {
    fn frame_at(&self, t: f64) -> Result<AudioFrame> {
        let frames = self.samples.len() / self.channels;
        let index = match self.timebase.index_within(t, frames) {
            Some(index) => index,
            None => return Ok(AudioFrame::silence(self.channels)),
        };
        let offset = index * self.channels;
        Ok(AudioFrame::new(self.samples[offset..offset + self.channels].to_vec()))
    }
}

/// A clip of audio sample frames.
///
/// `sample_rate` and `channels` describe the clip's native layout; chunks
/// can be pulled at any rate and are always `channels` wide.
#[derive(Clone)]
pub struct AudioClip {
    core: Clip<AudioFrame>,
    sample_rate: u32,
    channels: usize,
}

impl AudioClip {
    pub fn from_data(data: AudioData) -> Result<Self> {
        if data.channels == 0 || data.sample_rate == 0 {
            return Err(AudioError::InvalidParameters {
                details: format!("{} channels at {} Hz", data.channels, data.sample_rate),
            }
            .into());
        }
        let channels = usize::from(data.channels);
        if data.samples.len() % channels != 0 {
            return Err(AudioError::InvalidParameters {
                details: format!("{} samples do not divide into {} channels", data.samples.len(), channels),
            }
            .into());
        }

        let name = data
            .file_path
            .as_ref()
            .and_then(|path| path.file_name())
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "AudioArrayClip".to_string());
        let duration = data.frame_count() as f64 / f64::from(data.sample_rate);
        let source = SampleArray {
            samples: data.samples,
            channels,
            timebase: TimeBase::new(f64::from(data.sample_rate))?,
        };

        Ok(Self::from_core(Clip::new(name, source, Some(duration)), data.sample_rate, channels))
    }

    pub fn from_samples(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Result<Self> {
        Self::from_data(AudioData::from_interleaved(samples, sample_rate, channels))
    }

    /// A clip computed sample-by-sample from `func(t)`.
    pub fn from_fn<G>(name: &str, sample_rate: u32, channels: usize, duration: Option<f64>, func: G) -> Self
    where
        G: Fn(f64) -> Result<AudioFrame> + Send + Sync + 'static,
    {
        Self::from_core(Clip::from_fn(name, duration, func), sample_rate, channels)
    }

    pub fn silence(sample_rate: u32, channels: usize, duration: Option<f64>) -> Self {
        Self::from_core(
            Clip::constant("silence", AudioFrame::silence(channels), duration),
            sample_rate,
            channels,
        )
    }

    pub fn from_media(source: Arc<dyn MediaSource<AudioFrame>>) -> Result<Self> {
        let metadata = source.metadata();
        if metadata.channel_count == 0 || metadata.fps <= 0.0 {
            return Err(AudioError::InvalidParameters {
                details: format!("media reports {} channels at {} Hz", metadata.channel_count, metadata.fps),
            }
            .into());
        }
        let core = Clip::new("AudioFileClip", MediaFrames::new(source), metadata.duration);
        Ok(Self::from_core(core, metadata.fps.round() as u32, metadata.channel_count))
    }

    /// Decode a file with [`AudioLoader`].
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_data(AudioLoader::load(path)?)
    }

    pub(crate) fn from_core(core: Clip<AudioFrame>, sample_rate: u32, channels: usize) -> Self {
        Self {
            core,
            sample_rate,
            channels,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.core = self.core.with_name(name);
        self
    }

    pub fn with_memoize(mut self, enabled: bool) -> Self {
        self.core = self.core.with_memoize(enabled);
        self
    }

    pub fn is_stateful(&self) -> bool {
        self.core.is_stateful()
    }

    /// The sample frame at clip-local time `t`, `channels` wide.
    pub fn frame_at(&self, t: f64) -> Result<AudioFrame> {
        Ok(self.core.frame_at(t)?.broadcast(self.channels))
    }

    pub fn sample_transform<T>(mut self, filter: T) -> Result<Self>
    where
        T: FrameFilter<AudioFrame> + 'static,
    {
        self.core = self.core.image_transform(filter)?;
        Ok(self)
    }

    /// Multiply every sample frame by `gain(t)`.
    pub fn with_gain<G>(self, name: &str, gain: G) -> Result<Self>
    where
        G: Fn(f64) -> f32 + Send + Sync + 'static,
    {
        self.sample_transform(FnFilter::new(name, move |frame: AudioFrame, t| Ok(frame.scaled(gain(t)))))
    }

    pub fn with_effects(self, effects: &[&dyn AudioEffect]) -> Result<Self> {
        effects.iter().try_fold(self, |clip, effect| {
            debug!("Applying audio effect '{}' to '{}'", effect.name(), clip.name());
            effect.apply(clip)
        })
    }

    /// Samples for frame indices `frames` at `timebase`.
    pub fn chunk(&self, timebase: TimeBase, frames: Range<usize>) -> Result<AudioChunk> {
        let start = timebase.frame_time(frames.start);
        let mut samples = Vec::with_capacity(frames.len() * self.channels);
        for index in frames {
            samples.extend(self.frame_at(timebase.frame_time(index))?.into_samples());
        }
        Ok(AudioChunk {
            start,
            sample_rate: timebase.fps().round() as u32,
            channels: self.channels,
            samples,
        })
    }

    /// Lazily pull `[0, duration)` in chunks of `chunk_size` sample frames.
    pub fn iter_chunks(&self, chunk_size: usize, sample_rate: u32) -> Result<ChunkIter<'_>> {
        let duration = self.require_duration("iterating audio chunks")?;
        if chunk_size == 0 {
            return Err(AudioError::InvalidParameters {
                details: "chunk size must be positive".to_string(),
            }
            .into());
        }
        let timebase = TimeBase::new(f64::from(sample_rate))?;
        Ok(ChunkIter {
            clip: self,
            timebase,
            total: timebase.frame_count(duration),
            chunk_size,
            next: 0,
        })
    }

    /// Render the whole clip into memory.
    pub fn to_data(&self, sample_rate: u32) -> Result<AudioData> {
        let mut samples = Vec::new();
        for chunk in self.iter_chunks(4096, sample_rate)? {
            samples.extend(chunk?.samples);
        }
        Ok(AudioData::from_interleaved(samples, sample_rate, self.channels as u16))
    }

    /// Peak absolute sample value over the whole clip.
    pub fn max_volume(&self, sample_rate: u32) -> Result<f32> {
        let mut peak = 0.0_f32;
        for chunk in self.iter_chunks(4096, sample_rate)? {
            peak = peak.max(chunk?.peak());
        }
        Ok(peak)
    }
}

impl Timeline for AudioClip {
    fn name(&self) -> &str {
        self.core.name()
    }

    fn timing(&self) -> Timing {
        self.core.timing()
    }

    fn map_timing<U>(mut self, update: U) -> Result<Self>
    where
        U: Fn(Timing) -> std::result::Result<Timing, String>,
    {
        self.core = self.core.map_timing(update)?;
        Ok(self)
    }

    fn time_transform(mut self, map: TimeMap, keep_duration: bool) -> Self {
        self.core = self.core.time_transform(map, keep_duration);
        self
    }
}

impl std::fmt::Debug for AudioClip {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioClip")
            .field("core", &self.core)
            .field("sample_rate", &self.sample_rate)
            .field("channels", &self.channels)
            .finish()
    }
}

/// Restartable iterator over the chunks of an [`AudioClip`].
#[derive(Clone)]
pub struct ChunkIter<'a> {
    clip: &'a AudioClip,
    timebase: TimeBase,
    total: usize,
    chunk_size: usize,
    next: usize,
}

impl ChunkIter<'_> {
    pub fn restart(&mut self) {
        self.next = 0;
    }
}

impl Iterator for ChunkIter<'_> {
    type Item = Result<AudioChunk>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.total {
            return None;
        }
        let end = (self.next + self.chunk_size).min(self.total);
        let range = self.next..end;
        self.next = end;
        Some(self.clip.chunk(self.timebase, range))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.total - self.next).div_ceil(self.chunk_size);
        (remaining, Some(remaining))
    }
}
