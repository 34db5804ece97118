//! Effects that remap time. Masks and audio follow the same warp.

use crate::clip::{ApplyTo, TimeMap, Timeline, MIRROR_NUDGE};
use crate::effects::traits::{EffectMetadata, EffectParams, VideoEffect};
use crate::error::{EffectError, Result};
use crate::video::VideoClip;

/// Play faster (`factor > 1`) or slower, or stretch to a target duration.
#[derive(Debug, Clone, PartialEq)]
pub struct MultiplySpeed {
    factor: Option<f64>,
    final_duration: Option<f64>,
}

impl MultiplySpeed {
    pub fn new(factor: f64) -> Self {
        Self {
            factor: Some(factor),
            final_duration: None,
        }
    }

    /// Pick the factor that makes the clip last `duration` seconds.
    pub fn to_duration(duration: f64) -> Self {
        Self {
            factor: None,
            final_duration: Some(duration),
        }
    }

    pub fn from_params(params: &EffectParams) -> Result<Self> {
        match (params.get_f64("factor"), params.get_f64("final_duration")) {
            (Some(factor), None) => Ok(Self::new(factor)),
            (None, Some(duration)) => Ok(Self::to_duration(duration)),
            _ => Err(EffectError::invalid("multiply_speed", "factor", "give exactly one of factor or final_duration").into()),
        }
    }
}

impl VideoEffect for MultiplySpeed {
    fn name(&self) -> &str {
        "multiply_speed"
    }

    fn apply(&self, clip: VideoClip) -> Result<VideoClip> {
        let factor = match (self.factor, self.final_duration) {
            (Some(factor), _) => factor,
            (None, Some(target)) => {
                if !(target > 0.0) {
                    return Err(EffectError::invalid(self.name(), "final_duration", "must be positive").into());
                }
                clip.require_duration("multiply_speed to a final duration")? / target
            }
            (None, None) => return Err(EffectError::invalid(self.name(), "factor", "missing").into()),
        };
        clip.multiply_speed(factor)
    }

    fn metadata(&self) -> EffectMetadata {
        EffectMetadata::with_parameters(
            ApplyTo::ALL,
            &[],
            &[("factor", "speed multiplier"), ("final_duration", "target duration in seconds")],
        )
        .timing()
    }
}

/// Play the clip backwards.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TimeMirror;

impl VideoEffect for TimeMirror {
    fn name(&self) -> &str {
        "time_mirror"
    }

    fn apply(&self, clip: VideoClip) -> Result<VideoClip> {
        clip.time_mirror()
    }

    fn metadata(&self) -> EffectMetadata {
        EffectMetadata::default().timing()
    }
}

/// Repeat the clip `n` times, until `duration`, or forever.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Loop {
    pub n: Option<u32>,
    pub duration: Option<f64>,
}

impl Loop {
    pub fn times(n: u32) -> Self {
        Self {
            n: Some(n),
            duration: None,
        }
    }

    pub fn until(duration: f64) -> Self {
        Self {
            n: None,
            duration: Some(duration),
        }
    }

    pub fn from_params(params: &EffectParams) -> Result<Self> {
        Ok(Self {
            n: params.get_u32("loop", "n")?,
            duration: params.get_f64("duration"),
        })
    }
}

impl VideoEffect for Loop {
    fn name(&self) -> &str {
        "loop"
    }

    fn apply(&self, clip: VideoClip) -> Result<VideoClip> {
        if let Some(duration) = self.duration {
            if !(duration > 0.0) {
                return Err(EffectError::invalid(self.name(), "duration", "must be positive").into());
            }
        }
        clip.looped(self.n, self.duration)
    }

    fn metadata(&self) -> EffectMetadata {
        EffectMetadata::with_parameters(
            ApplyTo::ALL,
            &[],
            &[("n", "number of repetitions"), ("duration", "total duration in seconds")],
        )
        .timing()
    }
}

/// The clip followed by its mirror image, for a seamless back-and-forth.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TimeSymmetrize;

impl VideoEffect for TimeSymmetrize {
    fn name(&self) -> &str {
        "time_symmetrize"
    }

    fn apply(&self, clip: VideoClip) -> Result<VideoClip> {
        let duration = clip.require_duration("time symmetrizing")?;
        let map = TimeMap::custom("symmetrize", move |t| {
            if t < duration {
                t
            } else {
                (2.0 * duration - t - MIRROR_NUDGE).max(0.0)
            }
        });
        clip.time_transform_with(map, false, self.metadata().apply_to)
            .with_duration(Some(2.0 * duration), true)
    }

    fn metadata(&self) -> EffectMetadata {
        EffectMetadata::default().timing()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{AudioClip, AudioFrame};
    use crate::time::TimeBase;
    use crate::video::Frame;

    fn counter(duration: f64) -> VideoClip {
        // red channel holds the frame index at 1 fps
        VideoClip::from_fn("counter", Some((1, 1)), Some(duration), |t| {
            Ok(Frame::new_filled(1, 1, [TimeBase::new(1.0)?.frame_index(t) as u8, 0, 0]))
        })
    }

    fn indices(clip: &VideoClip) -> Vec<u8> {
        clip.iter_frames(1.0)
            .unwrap()
            .map(|item| item.unwrap().1.get_pixel(0, 0)[0])
            .collect()
    }

    #[test]
    fn test_speed_to_final_duration() {
        let clip = MultiplySpeed::to_duration(2.0).apply(counter(6.0)).unwrap();
        assert_eq!(clip.duration(), Some(2.0));
        assert_eq!(indices(&clip), vec![0, 3]);

        assert!(MultiplySpeed::new(-1.0).apply(counter(2.0)).is_err());
        assert!(MultiplySpeed::to_duration(1.0)
            .apply(VideoClip::color((1, 1), [0, 0, 0], None))
            .is_err());
    }

    #[test]
    fn test_loop_n_times() {
        let clip = Loop::times(3).apply(counter(2.0)).unwrap();
        assert_eq!(clip.duration(), Some(6.0));
        assert_eq!(indices(&clip), vec![0, 1, 0, 1, 0, 1]);
    }

    #[test]
    fn test_loop_moves_audio_too() {
        let audio = AudioClip::from_fn("ramp", 4, 1, Some(2.0), |t| Ok(AudioFrame::mono(t as f32)));
        let clip = Loop::until(5.0)
            .apply(counter(2.0).with_audio(audio).unwrap())
            .unwrap();
        let track = clip.audio().unwrap();
        assert_eq!(track.duration(), Some(5.0));
        assert_eq!(track.frame_at(2.5).unwrap().samples(), &[0.5]);
    }

    #[test]
    fn test_mirror_and_symmetrize() {
        assert_eq!(indices(&TimeMirror.apply(counter(3.0)).unwrap()), vec![2, 1, 0]);

        let symmetric = TimeSymmetrize.apply(counter(3.0)).unwrap();
        assert_eq!(symmetric.duration(), Some(6.0));
        assert_eq!(indices(&symmetric), vec![0, 1, 2, 2, 1, 0]);
    }

    #[test]
    fn test_symmetrize_moves_audio_as_declared() {
        assert_eq!(TimeSymmetrize.metadata().apply_to, ApplyTo::ALL);
        let audio = AudioClip::from_fn("ramp", 4, 1, Some(3.0), |t| Ok(AudioFrame::mono(t as f32)));
        let clip = TimeSymmetrize
            .apply(counter(3.0).with_audio(audio).unwrap())
            .unwrap();
        let track = clip.audio().unwrap();
        assert_eq!(track.duration(), Some(6.0));
        assert_eq!(track.frame_at(1.0).unwrap().samples(), &[1.0]);
        assert!((track.frame_at(4.0).unwrap().samples()[0] - 2.0).abs() < 1e-4);
    }

    #[test]
    fn test_params() {
        let params = EffectParams::new().set("factor", 2.0);
        assert_eq!(MultiplySpeed::from_params(&params).unwrap(), MultiplySpeed::new(2.0));
        assert!(MultiplySpeed::from_params(&EffectParams::new()).is_err());

        let params = EffectParams::new().set("n", 4_i64);
        assert_eq!(Loop::from_params(&params).unwrap(), Loop::times(4));
    }
}
