//! Volume effects. Each one works on an [`AudioClip`] directly, or on the
//! audio track of a [`VideoClip`].

use crate::audio::AudioClip;
use crate::clip::{ApplyTo, Timeline};
use crate::effects::traits::{AudioEffect, EffectMetadata, EffectParams, VideoEffect};
use crate::error::{EffectError, Result};
use crate::video::VideoClip;

fn validate(effect: &str, duration: f64) -> Result<()> {
    if !duration.is_finite() || duration <= 0.0 {
        return Err(EffectError::invalid(effect, "duration", format!("{} is not a positive duration", duration)).into());
    }
    Ok(())
}

/// Ramp the volume up from silence over the first `duration` seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioFadeIn {
    pub duration: f64,
}

impl AudioFadeIn {
    pub fn new(duration: f64) -> Self {
        Self { duration }
    }

    pub fn from_params(params: &EffectParams) -> Result<Self> {
        Ok(Self::new(params.require_f64("audio_fade_in", "duration")?))
    }
}

impl AudioEffect for AudioFadeIn {
    fn name(&self) -> &str {
        "audio_fade_in"
    }

    fn apply(&self, clip: AudioClip) -> Result<AudioClip> {
        validate("audio_fade_in", self.duration)?;
        let duration = self.duration;
        clip.with_gain("audio_fade_in", move |t| (t / duration).clamp(0.0, 1.0) as f32)
    }
}

/// Ramp the volume down to silence over the last `duration` seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioFadeOut {
    pub duration: f64,
}

impl AudioFadeOut {
    pub fn new(duration: f64) -> Self {
        Self { duration }
    }

    pub fn from_params(params: &EffectParams) -> Result<Self> {
        Ok(Self::new(params.require_f64("audio_fade_out", "duration")?))
    }
}

impl AudioEffect for AudioFadeOut {
    fn name(&self) -> &str {
        "audio_fade_out"
    }

    fn apply(&self, clip: AudioClip) -> Result<AudioClip> {
        validate("audio_fade_out", self.duration)?;
        let end = clip.require_duration("audio_fade_out")?;
        let duration = self.duration;
        clip.with_gain("audio_fade_out", move |t| ((end - t) / duration).clamp(0.0, 1.0) as f32)
    }
}

/// Multiply the volume by `factor`, optionally only within `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MultiplyVolume {
    pub factor: f32,
    pub start: Option<f64>,
    pub end: Option<f64>,
}

impl MultiplyVolume {
    pub fn new(factor: f32) -> Self {
        Self {
            factor,
            start: None,
            end: None,
        }
    }

    pub fn between(factor: f32, start: f64, end: f64) -> Self {
        Self {
            factor,
            start: Some(start),
            end: Some(end),
        }
    }

    pub fn from_params(params: &EffectParams) -> Result<Self> {
        Ok(Self {
            factor: params.require_f64("multiply_volume", "factor")? as f32,
            start: params.get_f64("start"),
            end: params.get_f64("end"),
        })
    }
}

impl AudioEffect for MultiplyVolume {
    fn name(&self) -> &str {
        "multiply_volume"
    }

    fn apply(&self, clip: AudioClip) -> Result<AudioClip> {
        if !self.factor.is_finite() {
            return Err(EffectError::invalid("multiply_volume", "factor", "must be finite").into());
        }
        let (factor, start, end) = (self.factor, self.start.unwrap_or(f64::NEG_INFINITY), self.end.unwrap_or(f64::INFINITY));
        if start >= end {
            return Err(EffectError::invalid("multiply_volume", "end", "must come after start").into());
        }
        clip.with_gain("multiply_volume", move |t| if t >= start && t < end { factor } else { 1.0 })
    }
}

/// Audio effects also apply to the audio track of a video clip; clips
/// without audio pass through.
macro_rules! video_via_audio {
    ($($effect:ty),*) => {
        $(
            impl VideoEffect for $effect {
                fn name(&self) -> &str {
                    AudioEffect::name(self)
                }

                fn apply(&self, clip: VideoClip) -> Result<VideoClip> {
                    clip.map_audio(|audio| AudioEffect::apply(self, audio))
                }

                fn metadata(&self) -> EffectMetadata {
                    EffectMetadata {
                        apply_to: ApplyTo { mask: false, audio: true },
                        ..EffectMetadata::default()
                    }
                }
            }
        )*
    };
}

video_via_audio!(AudioFadeIn, AudioFadeOut, MultiplyVolume);
