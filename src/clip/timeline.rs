use crate::error::{ClipError, Result};
use crate::time::FRAME_EPSILON;

use super::time_map::TimeMap;
use super::timing::Timing;

/// Timeline operations shared by every clip kind.
///
/// Implementors provide the two primitives (`map_timing` and
/// `time_transform`), which must forward to any owned mask or audio. All
/// other operations are derived from them, so side channels stay in
/// lockstep with their owner.
pub trait Timeline: Sized {
    fn name(&self) -> &str;

    fn timing(&self) -> Timing;

    /// Replace the timing with `update(timing)`, for this clip and its side
    /// channels. An `Err` from `update` becomes `InvalidTimeRange`.
    fn map_timing<U>(self, update: U) -> Result<Self>
    where
        U: Fn(Timing) -> std::result::Result<Timing, String>;

    /// Remap time: the new clip shows `self.frame(map(t))` at `t`.
    ///
    /// Unless `keep_duration` is set, the result is open-ended.
    fn time_transform(self, map: TimeMap, keep_duration: bool) -> Self;

    fn start(&self) -> f64 {
        self.timing().start()
    }

    fn end(&self) -> Option<f64> {
        self.timing().end()
    }

    fn duration(&self) -> Option<f64> {
        self.timing().duration()
    }

    fn is_playing(&self, t: f64) -> bool {
        self.timing().is_playing(t)
    }

    fn is_playing_many(&self, times: &[f64]) -> Vec<bool> {
        self.timing().is_playing_many(times)
    }

    /// The duration, or `MissingDuration` naming `operation`.
    fn require_duration(&self, operation: &str) -> Result<f64> {
        self.duration()
            .ok_or_else(|| ClipError::missing_duration(self.name(), operation).into())
    }

    fn with_start(self, t: f64, change_end: bool) -> Result<Self> {
        self.map_timing(move |timing| timing.with_start(t, change_end).validated())
    }

    fn with_end(self, t: Option<f64>) -> Result<Self> {
        self.map_timing(move |timing| timing.with_end(t).validated())
    }

    fn with_duration(self, duration: Option<f64>, change_end: bool) -> Result<Self> {
        self.map_timing(move |timing| timing.with_duration(duration, change_end)?.validated())
    }

    /// The part of the clip between local times `from` and `to`.
    ///
    /// Without `to` the subclip runs to the end of the clip, or stays
    /// open-ended when the clip is.
    fn subclip(self, from: f64, to: Option<f64>) -> Result<Self> {
        let duration = self.duration();
        let reject = |reason: &str| ClipError::invalid_range(self.name(), from, to, reason);

        if !from.is_finite() || from < 0.0 {
            return Err(reject("start lies before the beginning of the clip").into());
        }
        if let Some(d) = duration {
            if from >= d {
                return Err(reject(&format!("start lies at or past the clip end ({})", d)).into());
            }
        }
        if let Some(to) = to {
            if !to.is_finite() || to <= from {
                return Err(reject("end must come after start").into());
            }
            if let Some(d) = duration {
                if to > d + FRAME_EPSILON {
                    return Err(reject(&format!("end lies past the clip end ({})", d)).into());
                }
            }
        }

        let length = to.or(duration).map(|end| end - from);
        let clip = self.time_transform(TimeMap::Shift(from), false);
        match length {
            Some(length) => clip.with_duration(Some(length), true),
            None => Ok(clip),
        }
    }

    /// Remove `[from, to)`; later content moves up.
    fn cutout(self, from: f64, to: f64) -> Result<Self> {
        if !(from >= 0.0 && to > from) {
            return Err(ClipError::invalid_range(self.name(), from, Some(to), "cutout needs 0 <= from < to").into());
        }
        let duration = self.duration();
        if let Some(d) = duration {
            if to > d + FRAME_EPSILON {
                return Err(ClipError::invalid_range(self.name(), from, Some(to), "cutout extends past the clip end").into());
            }
        }

        let clip = self.time_transform(TimeMap::Cutout { from, to }, false);
        match duration {
            Some(d) => clip.with_duration(Some(d - (to - from)), true),
            None => Ok(clip),
        }
    }

    /// Repeat the clip. Open-ended unless `repeats` or `total` is given.
    fn looped(self, repeats: Option<u32>, total: Option<f64>) -> Result<Self> {
        let period = self.require_duration("looping")?;
        if period <= 0.0 {
            return Err(ClipError::invalid_range(self.name(), 0.0, Some(period), "cannot loop an empty clip").into());
        }

        let target = repeats.map(|n| f64::from(n) * period).or(total);
        let clip = self.time_transform(TimeMap::Modulo { period }, false);
        match target {
            Some(target) => clip.with_duration(Some(target), true),
            None => Ok(clip),
        }
    }

    /// Play the clip backwards.
    fn time_mirror(self) -> Result<Self> {
        let duration = self.require_duration("time mirroring")?;
        Ok(self.time_transform(TimeMap::Mirror { duration }, true))
    }

    /// Play `factor` times faster; the duration shrinks accordingly.
    fn multiply_speed(self, factor: f64) -> Result<Self> {
        if !factor.is_finite() || factor <= 0.0 {
            return Err(ClipError::invalid_range(
                self.name(),
                self.start(),
                self.end(),
                format!("speed factor {} must be positive", factor),
            )
            .into());
        }

        let duration = self.duration();
        let clip = self.time_transform(TimeMap::Scale(factor), false);
        match duration {
            Some(d) => clip.with_duration(Some(d / factor), true),
            None => Ok(clip),
        }
    }
}
