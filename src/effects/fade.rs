//! Fades. By default they act on the mask, so a faded clip reveals what is
//! beneath it in a composite. A fade toward a solid colour is only used
//! when a colour is requested and the clip has no mask.

use crate::clip::{ApplyTo, FnFilter, Timeline};
use crate::effects::traits::{EffectMetadata, EffectParams, VideoEffect};
use crate::error::{EffectError, Result};
use crate::video::{Frame, MaskFrame, VideoClip};

fn validate(effect: &str, duration: f64) -> Result<()> {
    if !duration.is_finite() || duration <= 0.0 {
        return Err(EffectError::invalid(effect, "duration", format!("{} is not a positive duration", duration)).into());
    }
    Ok(())
}

/// Mix `frame` toward `color`; `amount` 1 keeps the frame untouched.
fn blend_toward(frame: Frame, color: [u8; 3], amount: f32) -> Frame {
    let mut blended = frame;
    let rgb = [f32::from(color[0]), f32::from(color[1]), f32::from(color[2])];
    for (i, value) in blended.as_raw_mut().iter_mut().enumerate() {
        let mixed = amount * f32::from(*value) + (1.0 - amount) * rgb[i % 3];
        *value = mixed.round().clamp(0.0, 255.0) as u8;
    }
    blended
}

/// Scale the mask (or blend toward `color`) by `envelope(t)`.
fn fade<E>(effect: &str, clip: VideoClip, color: Option<[u8; 3]>, envelope: E) -> Result<VideoClip>
where
    E: Fn(f64) -> f32 + Copy + Send + Sync + 'static,
{
    match color {
        Some(color) if clip.mask().is_none() => clip.image_transform(FnFilter::new(effect, move |frame: Frame, t| {
            Ok(blend_toward(frame, color, envelope(t)))
        })),
        _ => clip
            .with_opaque_mask()
            .mask_transform(FnFilter::new(effect, move |mask: MaskFrame, t| Ok(mask.scaled(envelope(t))))),
    }
}

/// Fade from fully transparent (or `color`) over the first `duration` seconds.
fn fade_in(effect: &str, clip: VideoClip, duration: f64, color: Option<[u8; 3]>) -> Result<VideoClip> {
    validate(effect, duration)?;
    fade(effect, clip, color, move |t| (t / duration).clamp(0.0, 1.0) as f32)
}

/// Fade to fully transparent (or `color`) over the last `duration` seconds.
fn fade_out(effect: &str, clip: VideoClip, duration: f64, color: Option<[u8; 3]>) -> Result<VideoClip> {
    validate(effect, duration)?;
    let end = clip.require_duration(effect)?;
    fade(effect, clip, color, move |t| ((end - t) / duration).clamp(0.0, 1.0) as f32)
}

/// Ramp the clip in over `duration` seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FadeIn {
    pub duration: f64,
    /// Fade from this colour instead of from transparency (mask-less clips only).
    pub color: Option<[u8; 3]>,
}

impl FadeIn {
    pub fn new(duration: f64) -> Self {
        Self { duration, color: None }
    }

    pub fn from_color(duration: f64, color: [u8; 3]) -> Self {
        Self {
            duration,
            color: Some(color),
        }
    }

    pub fn from_params(params: &EffectParams) -> Result<Self> {
        Ok(Self {
            duration: params.require_f64("fade_in", "duration")?,
            color: params.get_color("fade_in", "color")?,
        })
    }
}

impl VideoEffect for FadeIn {
    fn name(&self) -> &str {
        "fade_in"
    }

    fn apply(&self, clip: VideoClip) -> Result<VideoClip> {
        fade_in(self.name(), clip, self.duration, self.color)
    }

    fn metadata(&self) -> EffectMetadata {
        EffectMetadata::with_parameters(ApplyTo::MASK, &["duration"], &[("color", "[r, g, b] to fade from")])
    }
}

/// Ramp the clip out over its last `duration` seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FadeOut {
    pub duration: f64,
    pub color: Option<[u8; 3]>,
}

impl FadeOut {
    pub fn new(duration: f64) -> Self {
        Self { duration, color: None }
    }

    pub fn to_color(duration: f64, color: [u8; 3]) -> Self {
        Self {
            duration,
            color: Some(color),
        }
    }

    pub fn from_params(params: &EffectParams) -> Result<Self> {
        Ok(Self {
            duration: params.require_f64("fade_out", "duration")?,
            color: params.get_color("fade_out", "color")?,
        })
    }
}

impl VideoEffect for FadeOut {
    fn name(&self) -> &str {
        "fade_out"
    }

    fn apply(&self, clip: VideoClip) -> Result<VideoClip> {
        fade_out(self.name(), clip, self.duration, self.color)
    }

    fn metadata(&self) -> EffectMetadata {
        EffectMetadata::with_parameters(ApplyTo::MASK, &["duration"], &[("color", "[r, g, b] to fade to")])
    }
}

/// Mask-only fade in, for overlapping a clip onto the one before it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CrossFadeIn {
    pub duration: f64,
}

impl CrossFadeIn {
    pub fn new(duration: f64) -> Self {
        Self { duration }
    }
}

impl VideoEffect for CrossFadeIn {
    fn name(&self) -> &str {
        "crossfade_in"
    }

    fn apply(&self, clip: VideoClip) -> Result<VideoClip> {
        fade_in(self.name(), clip, self.duration, None)
    }

    fn metadata(&self) -> EffectMetadata {
        EffectMetadata::with_parameters(ApplyTo::MASK, &["duration"], &[])
    }
}

/// Mask-only fade out.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CrossFadeOut {
    pub duration: f64,
}

impl CrossFadeOut {
    pub fn new(duration: f64) -> Self {
        Self { duration }
    }
}

impl VideoEffect for CrossFadeOut {
    fn name(&self) -> &str {
        "crossfade_out"
    }

    fn apply(&self, clip: VideoClip) -> Result<VideoClip> {
        fade_out(self.name(), clip, self.duration, None)
    }

    fn metadata(&self) -> EffectMetadata {
        EffectMetadata::with_parameters(ApplyTo::MASK, &["duration"], &[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{AudioClip, AudioFrame};

    fn white() -> VideoClip {
        VideoClip::color((2, 2), [255, 255, 255], Some(4.0))
    }

    #[test]
    fn test_fades_leave_audio_alone_as_declared() {
        let tone = AudioClip::from_fn("tone", 10, 1, Some(4.0), |_t| Ok(AudioFrame::mono(0.5)));
        let clip = white().with_audio(tone).unwrap();
        let effects: [&dyn VideoEffect; 4] = [
            &FadeIn::new(1.0),
            &FadeOut::new(1.0),
            &CrossFadeIn::new(1.0),
            &CrossFadeOut::new(1.0),
        ];

        for effect in effects {
            assert_eq!(effect.metadata().apply_to, ApplyTo::MASK);
            let faded = effect.apply(clip.clone()).unwrap();
            assert!(faded.mask().is_some());
            let audio = faded.audio().unwrap();
            assert_eq!(audio.frame_at(0.0).unwrap().samples(), &[0.5]);
            assert_eq!(audio.frame_at(3.95).unwrap().samples(), &[0.5]);
        }
    }

    #[test]
    fn test_fade_in_mask_is_linear() {
        let clip = FadeIn::new(1.0).apply(white()).unwrap();
        let opacity = |t: f64| clip.mask_at(t).unwrap().unwrap().get(1, 1);
        assert_eq!(opacity(0.0), 0.0);
        assert!((opacity(0.25) - 0.25).abs() < 1e-6);
        assert!((opacity(0.5) - 0.5).abs() < 1e-6);
        assert_eq!(opacity(1.0), 1.0);
        assert_eq!(opacity(3.0), 1.0);
        // pixels untouched
        assert_eq!(clip.frame_at(0.0).unwrap().get_pixel(0, 0), [255, 255, 255]);
    }

    #[test]
    fn test_fade_out_counts_back_from_clip_end() {
        let clip = FadeOut::new(2.0).apply(white()).unwrap();
        let opacity = |t: f64| clip.mask_at(t).unwrap().unwrap().get(0, 0);
        assert_eq!(opacity(1.0), 1.0);
        assert!((opacity(3.0) - 0.5).abs() < 1e-6);
        assert_eq!(opacity(4.0), 0.0);

        assert!(FadeOut::new(1.0).apply(VideoClip::color((1, 1), [0, 0, 0], None)).is_err());
    }

    #[test]
    fn test_color_fade_only_without_mask() {
        let clip = FadeIn::from_color(2.0, [0, 0, 0]).apply(white()).unwrap();
        assert!(clip.mask().is_none());
        assert_eq!(clip.frame_at(0.0).unwrap().get_pixel(0, 0), [0, 0, 0]);
        assert_eq!(clip.frame_at(1.0).unwrap().get_pixel(0, 0), [128, 128, 128]);

        let masked = FadeIn::from_color(2.0, [0, 0, 0]).apply(white().with_opaque_mask()).unwrap();
        assert_eq!(masked.frame_at(0.0).unwrap().get_pixel(0, 0), [255, 255, 255]);
        assert_eq!(masked.mask_at(0.0).unwrap().unwrap().get(0, 0), 0.0);
    }

    #[test]
    fn test_effect_value_reusable_across_clips() {
        let fade = CrossFadeOut::new(1.0);
        let short = fade.apply(VideoClip::color((1, 1), [1, 1, 1], Some(1.0))).unwrap();
        let long = fade.apply(VideoClip::color((1, 1), [1, 1, 1], Some(10.0))).unwrap();
        assert_eq!(short.mask_at(0.5).unwrap().unwrap().get(0, 0), 0.5);
        assert_eq!(long.mask_at(0.5).unwrap().unwrap().get(0, 0), 1.0);
        assert_eq!(fade, CrossFadeOut::new(1.0));
    }

    #[test]
    fn test_non_positive_duration_rejected() {
        assert!(FadeIn::new(0.0).apply(white()).is_err());
        assert!(CrossFadeIn::new(-1.0).apply(white()).is_err());
    }
}
