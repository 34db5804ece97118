use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Raw decoded audio with metadata
#[derive(Debug, Clone)]
pub struct AudioData {
    /// Audio samples (interleaved for stereo, mono for single channel)
    pub samples: Vec<f32>,

    /// Sample rate in Hz
    pub sample_rate: u32,

    /// Number of channels (1 = mono, 2 = stereo)
    pub channels: u16,

    /// Duration in seconds
    pub duration: f64,

    /// Original file path, when decoded from disk
    pub file_path: Option<PathBuf>,

    /// Audio format information
    pub format: AudioFormat,
}

impl AudioData {
    /// Build in-memory audio from interleaved samples.
    pub fn from_interleaved(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Self {
        let frames = samples.len() / usize::from(channels.max(1));
        Self {
            samples,
            sample_rate,
            channels,
            duration: frames as f64 / f64::from(sample_rate.max(1)),
            file_path: None,
            format: AudioFormat::raw(),
        }
    }

    /// Number of sample frames (one value per channel each).
    pub fn frame_count(&self) -> usize {
        self.samples.len() / usize::from(self.channels.max(1))
    }

    /// Get samples for a specific channel (0-based)
    pub fn channel_samples(&self, channel: usize) -> Vec<f32> {
        if self.channels == 1 || channel >= self.channels as usize {
            return self.samples.clone();
        }

        self.samples
            .iter()
            .skip(channel)
            .step_by(self.channels as usize)
            .copied()
            .collect()
    }

    /// Get mono mix of all channels
    pub fn mono_samples(&self) -> Vec<f32> {
        if self.channels == 1 {
            return self.samples.clone();
        }

        self.samples
            .chunks(self.channels as usize)
            .map(|chunk| chunk.iter().sum::<f32>() / self.channels as f32)
            .collect()
    }
}

/// Audio file format information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioFormat {
    /// File extension (wav, mp3, flac, etc.)
    pub extension: String,

    /// Bit depth (16, 24, 32, etc.)
    pub bit_depth: Option<u16>,

    /// Compression type (if any)
    pub compression: Option<String>,
}

impl AudioFormat {
    /// Samples that never touched a file.
    pub fn raw() -> Self {
        Self {
            extension: "raw".to_string(),
            bit_depth: Some(32),
            compression: None,
        }
    }
}

/// The sample values of every channel at one instant.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFrame {
    samples: Vec<f32>,
}

impl AudioFrame {
    pub fn new(samples: Vec<f32>) -> Self {
        Self { samples }
    }

    pub fn silence(channels: usize) -> Self {
        Self::new(vec![0.0; channels])
    }

    pub fn mono(value: f32) -> Self {
        Self::new(vec![value])
    }

    pub fn stereo(left: f32, right: f32) -> Self {
        Self::new(vec![left, right])
    }

    pub fn channels(&self) -> usize {
        self.samples.len()
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }

    /// Every channel multiplied by `gain`.
    pub fn scaled(mut self, gain: f32) -> Self {
        for sample in &mut self.samples {
            *sample *= gain;
        }
        self
    }

    /// Widen to `channels`. Mono is duplicated; other layouts repeat their
    /// channels cyclically.
    pub fn broadcast(&self, channels: usize) -> Self {
        if self.samples.len() == channels || self.samples.is_empty() {
            return self.clone();
        }
        let width = self.samples.len();
        Self::new((0..channels).map(|c| self.samples[c % width]).collect())
    }

    /// Add `other`, broadcast to this frame's width. No clamping.
    pub fn accumulate(&mut self, other: &AudioFrame) {
        let other = other.broadcast(self.channels());
        for (sum, sample) in self.samples.iter_mut().zip(other.samples) {
            *sum += sample;
        }
    }
}

/// A block of consecutive interleaved samples, as handed to audio sinks.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioChunk {
    /// Time of the first sample frame
    pub start: f64,

    pub sample_rate: u32,

    pub channels: usize,

    /// Interleaved samples, unclamped
    pub samples: Vec<f32>,
}

impl AudioChunk {
    pub fn frame_count(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.samples.len() / self.channels
        }
    }

    /// Samples limited to `[-1, 1]`, as written by encoders.
    pub fn clamped(&self) -> Vec<f32> {
        self.samples.iter().map(|s| s.clamp(-1.0, 1.0)).collect()
    }

    /// Clamped 16-bit PCM.
    pub fn to_i16(&self) -> Vec<i16> {
        self.samples
            .iter()
            .map(|s| (s.clamp(-1.0, 1.0) * f32::from(i16::MAX)).round() as i16)
            .collect()
    }

    /// Largest absolute sample value.
    pub fn peak(&self) -> f32 {
        self.samples.iter().fold(0.0_f32, |peak, s| peak.max(s.abs()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_data_mono_conversion() {
        let stereo_samples = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]; // L, R, L, R, L, R
        let audio_data = AudioData::from_interleaved(stereo_samples, 44100, 2);

        assert_eq!(audio_data.mono_samples(), vec![1.5, 3.5, 5.5]);
        assert_eq!(audio_data.channel_samples(1), vec![2.0, 4.0, 6.0]);
        assert_eq!(audio_data.frame_count(), 3);
    }

    #[test]
    fn test_mono_frames_broadcast_to_stereo() {
        let mut sum = AudioFrame::silence(2);
        sum.accumulate(&AudioFrame::mono(0.25));
        sum.accumulate(&AudioFrame::stereo(0.5, -0.5));
        assert_eq!(sum.samples(), &[0.75, -0.25]);
    }

    #[test]
    fn test_chunk_clamps_only_on_request() {
        let chunk = AudioChunk {
            start: 0.0,
            sample_rate: 10,
            channels: 2,
            samples: vec![1.5, -2.0, 0.5, 0.0],
        };
        assert_eq!(chunk.frame_count(), 2);
        assert_eq!(chunk.peak(), 2.0);
        assert_eq!(chunk.clamped(), vec![1.0, -1.0, 0.5, 0.0]);
        assert_eq!(chunk.to_i16(), vec![i16::MAX, -i16::MAX, 16384, 0]);
    }
}
