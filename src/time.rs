//! # Time Base
//!
//! Conversions between continuous clip time (seconds, `f64`) and discrete
//! frame or sample indices, plus timecode parsing for human-entered times.

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// Tolerance added before flooring `t * fps`, so `i / fps` maps back to `i`.
pub const FRAME_EPSILON: f64 = 1e-9;

/// A fixed sampling rate (video fps or audio sample rate)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeBase {
    fps: f64,
}

impl TimeBase {
    pub fn new(fps: f64) -> Result<Self> {
        if !fps.is_finite() || fps <= 0.0 {
            return Err(ConfigError::InvalidValue {
                key: "fps".to_string(),
                value: fps.to_string(),
            }
            .into());
        }
        Ok(Self { fps })
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }

    /// Index of the frame (or sample) whose period contains `t`.
    pub fn frame_index(&self, t: f64) -> i64 {
        (t * self.fps + FRAME_EPSILON).floor() as i64
    }

    /// Index into a sequence of `len` entries covering `[0, len / fps)`.
    ///
    /// Times inside the window never resolve past the last entry, even when
    /// the rounding tolerance of [`frame_index`](Self::frame_index) would.
    pub fn index_within(&self, t: f64, len: usize) -> Option<usize> {
        let position = t * self.fps;
        if len == 0 || position < -FRAME_EPSILON || position >= len as f64 {
            return None;
        }
        Some(self.frame_index(t).clamp(0, len as i64 - 1) as usize)
    }

    /// Start time of frame `index`.
    pub fn frame_time(&self, index: usize) -> f64 {
        index as f64 / self.fps
    }

    /// Number of frames needed to cover `[0, duration)`.
    pub fn frame_count(&self, duration: f64) -> usize {
        (duration * self.fps - FRAME_EPSILON).ceil().max(0.0) as usize
    }

    /// Sampling times for the half-open window `[0, duration)`.
    pub fn frame_times(&self, duration: f64) -> Vec<f64> {
        (0..self.frame_count(duration)).map(|i| self.frame_time(i)).collect()
    }
}

/// Parse a timecode into seconds.
///
/// Accepts `"SS.ss"`, `"MM:SS.ss"` and `"HH:MM:SS.ss"`; a comma is accepted as
/// the decimal separator.
pub fn parse_timecode(value: &str) -> Result<f64> {
    let invalid = || ConfigError::InvalidValue {
        key: "timecode".to_string(),
        value: value.to_string(),
    };

    let normalized = value.trim().replace(',', ".");
    if normalized.is_empty() {
        return Err(invalid().into());
    }

    let parts: Vec<&str> = normalized.split(':').collect();
    if parts.len() > 3 {
        return Err(invalid().into());
    }

    let mut seconds = 0.0;
    for part in &parts {
        let component: f64 = part.parse().map_err(|_| invalid())?;
        if component < 0.0 || !component.is_finite() {
            return Err(invalid().into());
        }
        seconds = seconds * 60.0 + component;
    }
    Ok(seconds)
}

/// Format seconds as `HH:MM:SS.mmm`.
pub fn format_timecode(seconds: f64) -> String {
    let total_millis = (seconds.max(0.0) * 1000.0).round() as u64;
    let hours = total_millis / 3_600_000;
    let minutes = (total_millis / 60_000) % 60;
    let secs = (total_millis / 1000) % 60;
    let millis = total_millis % 1000;
    format!("{:02}:{:02}:{:02}.{:03}", hours, minutes, secs, millis)
}
