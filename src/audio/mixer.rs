use tracing::debug;

use crate::audio::clip::AudioClip;
use crate::audio::types::AudioFrame;
use crate::clip::{Clip, FrameSource, Timeline};
use crate::error::{ClipError, Result};

/// Sum of every sub-clip playing at `t`, each read at its own local time.
struct MixSource {
    clips: Vec<AudioClip>,
    channels: usize,
}

impl FrameSource<AudioFrame> for MixSource {
    fn frame_at(&self, t: f64) -> Result<AudioFrame> {
        let mut mixed = AudioFrame::silence(self.channels);
        for clip in self.clips.iter().filter(|clip| clip.is_playing(t)) {
            mixed.accumulate(&clip.frame_at(t - clip.start())?);
        }
        Ok(mixed)
    }

    fn is_stateful(&self) -> bool {
        self.clips.iter().any(AudioClip::is_stateful)
    }
}

/// Mixes audio clips placed on a shared timeline.
///
/// Each sub-clip's `start` positions it on the mix. The result is as wide
/// as the widest sub-clip (mono is duplicated), runs at the highest sample
/// rate among them, and lasts until the last sub-clip ends. If any sub-clip
/// is open-ended, so is the mix.
pub struct CompositeAudioClip;

impl CompositeAudioClip {
    #[allow(clippy::new_ret_no_self)]
    pub fn new(clips: Vec<AudioClip>) -> Result<AudioClip> {
        if clips.is_empty() {
            return Err(ClipError::EmptyComposition {
                missing: "audio clips".to_string(),
            }
            .into());
        }

        let channels = clips.iter().map(AudioClip::channels).max().unwrap_or(1);
        let sample_rate = clips.iter().map(AudioClip::sample_rate).max().unwrap_or(44100);
        let duration = clips
            .iter()
            .map(|clip| clip.end())
            .try_fold(0.0_f64, |latest, end| end.map(|end| latest.max(end)));

        debug!(
            "Mixing {} audio clips: {} channels at {} Hz, duration {:?}",
            clips.len(),
            channels,
            sample_rate,
            duration
        );

        let source = MixSource { clips, channels };
        Ok(AudioClip::from_core(
            Clip::new("CompositeAudioClip", source, duration),
            sample_rate,
            channels,
        ))
    }
}

/// Play `clips` one after another.
pub fn concatenate_audioclips(clips: Vec<AudioClip>) -> Result<AudioClip> {
    let mut offset = 0.0;
    let mut placed = Vec::with_capacity(clips.len());
    for clip in clips {
        let duration = clip.require_duration("concatenating audio")?;
        placed.push(clip.with_start(offset, true)?);
        offset += duration;
    }
    CompositeAudioClip::new(placed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(value: f32, duration: f64) -> AudioClip {
        AudioClip::from_fn("tone", 10, 1, Some(duration), move |_t| Ok(AudioFrame::mono(value)))
    }

    #[test]
    fn test_disjoint_clips_reproduced_with_silence_between() {
        let a = tone(0.25, 1.0);
        let b = tone(-0.5, 1.0).with_start(2.0, true).unwrap();
        let mix = CompositeAudioClip::new(vec![a, b]).unwrap();

        assert_eq!(mix.duration(), Some(3.0));
        assert_eq!(mix.frame_at(0.5).unwrap().samples(), &[0.25]);
        assert_eq!(mix.frame_at(1.5).unwrap().samples(), &[0.0]);
        assert_eq!(mix.frame_at(2.5).unwrap().samples(), &[-0.5]);
        assert_eq!(mix.frame_at(3.0).unwrap().samples(), &[0.0]);
    }

    #[test]
    fn test_overlap_sums_without_clamping() {
        let a = tone(0.75, 2.0);
        let b = tone(0.75, 2.0).with_start(1.0, true).unwrap();
        let mix = CompositeAudioClip::new(vec![a, b]).unwrap();
        assert_eq!(mix.frame_at(1.5).unwrap().samples(), &[1.5]);
        assert_eq!(mix.max_volume(10).unwrap(), 1.5);
    }

    #[test]
    fn test_width_and_rate_follow_widest_clip() {
        let mono = tone(0.5, 1.0);
        let stereo = AudioClip::from_fn("stereo", 20, 2, Some(1.0), |_t| Ok(AudioFrame::stereo(0.1, 0.2)));
        let mix = CompositeAudioClip::new(vec![mono, stereo]).unwrap();
        assert_eq!(mix.channels(), 2);
        assert_eq!(mix.sample_rate(), 20);
        assert_eq!(mix.frame_at(0.0).unwrap().samples(), &[0.6, 0.7]);
    }

    #[test]
    fn test_unbounded_member_makes_mix_open() {
        let open = AudioClip::silence(10, 1, None);
        let mix = CompositeAudioClip::new(vec![tone(0.1, 1.0), open]).unwrap();
        assert_eq!(mix.duration(), None);
        assert!(CompositeAudioClip::new(Vec::new()).is_err());
    }

    #[test]
    fn test_concatenation_places_clips_back_to_back() {
        let joined = concatenate_audioclips(vec![tone(0.1, 1.0), tone(0.2, 0.5), tone(0.3, 1.0)]).unwrap();
        assert_eq!(joined.duration(), Some(2.5));
        assert_eq!(joined.frame_at(1.2).unwrap().samples(), &[0.2]);
        assert_eq!(joined.frame_at(2.0).unwrap().samples(), &[0.3]);

        let with_open = concatenate_audioclips(vec![tone(0.1, 1.0), AudioClip::silence(10, 1, None)]);
        assert!(with_open.is_err());
    }
}
