use serde::{Deserialize, Serialize};

/// Temporal placement of a clip on its parent's timeline.
///
/// `end == start + duration` whenever both are known; every update goes
/// through one of the `with_*` methods, which recompute the dependent field.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Timing {
    start: f64,
    end: Option<f64>,
    duration: Option<f64>,
}

impl Default for Timing {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl Timing {
    /// Starts at 0 and never ends.
    pub fn unbounded() -> Self {
        Self {
            start: 0.0,
            end: None,
            duration: None,
        }
    }

    /// Starts at 0 and lasts `duration` seconds.
    pub fn bounded(duration: f64) -> Self {
        Self {
            start: 0.0,
            end: Some(duration),
            duration: Some(duration),
        }
    }

    pub fn from_duration(duration: Option<f64>) -> Self {
        duration.map_or_else(Self::unbounded, Self::bounded)
    }

    pub fn start(&self) -> f64 {
        self.start
    }

    pub fn end(&self) -> Option<f64> {
        self.end
    }

    pub fn duration(&self) -> Option<f64> {
        self.duration
    }

    pub fn is_bounded(&self) -> bool {
        self.duration.is_some()
    }

    pub fn with_start(mut self, t: f64, change_end: bool) -> Self {
        self.start = t;
        match (change_end, self.duration, self.end) {
            (true, Some(duration), _) => self.end = Some(t + duration),
            (_, _, Some(end)) => self.duration = Some(end - t),
            _ => {}
        }
        self
    }

    pub fn with_end(mut self, t: Option<f64>) -> Self {
        self.end = t;
        self.duration = t.map(|end| end - self.start);
        self
    }

    /// Set the duration, moving `end` (`change_end`) or `start` (end held fixed).
    pub fn with_duration(mut self, duration: Option<f64>, change_end: bool) -> Result<Self, String> {
        if change_end {
            self.duration = duration;
            self.end = duration.map(|d| self.start + d);
            return Ok(self);
        }

        let duration = duration.ok_or("cannot hold the end fixed while removing the duration")?;
        let end = self.end.ok_or("cannot hold the end fixed on an open-ended clip")?;
        self.duration = Some(duration);
        self.start = end - duration;
        Ok(self)
    }

    /// Forget end and duration, keeping the start.
    pub fn open_ended(mut self) -> Self {
        self.end = None;
        self.duration = None;
        self
    }

    /// Reject timings a clip cannot carry.
    pub fn validated(self) -> Result<Self, String> {
        if !self.start.is_finite() {
            return Err(format!("start {} is not finite", self.start));
        }
        if let Some(duration) = self.duration {
            if !duration.is_finite() {
                return Err(format!("duration {} is not finite", duration));
            }
            if duration < 0.0 {
                return Err(format!("duration {} is negative", duration));
            }
        }
        Ok(self)
    }

    /// `start <= t < end`, or `t >= start` for an open-ended clip.
    pub fn is_playing(&self, t: f64) -> bool {
        t >= self.start && self.end.map_or(true, |end| t < end)
    }

    pub fn is_playing_many(&self, times: &[f64]) -> Vec<bool> {
        times.iter().map(|&t| self.is_playing(t)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_start_moves_end_when_requested() {
        let timing = Timing::bounded(4.0).with_start(2.0, true);
        assert_eq!(timing.start(), 2.0);
        assert_eq!(timing.end(), Some(6.0));
        assert_eq!(timing.duration(), Some(4.0));
    }

    #[test]
    fn test_with_start_keeps_end_otherwise() {
        let timing = Timing::bounded(4.0).with_start(1.0, false);
        assert_eq!(timing.end(), Some(4.0));
        assert_eq!(timing.duration(), Some(3.0));
    }

    #[test]
    fn test_with_end_none_makes_clip_unbounded() {
        let timing = Timing::bounded(4.0).with_end(None);
        assert_eq!(timing.end(), None);
        assert_eq!(timing.duration(), None);
        assert!(timing.is_playing(1e9));
    }

    #[test]
    fn test_with_duration_holding_end() {
        let timing = Timing::bounded(10.0).with_duration(Some(4.0), false).unwrap();
        assert_eq!(timing.start(), 6.0);
        assert_eq!(timing.end(), Some(10.0));

        assert!(Timing::unbounded().with_duration(Some(1.0), false).is_err());
        assert!(Timing::bounded(1.0).with_duration(None, false).is_err());
    }

    #[test]
    fn test_negative_duration_is_rejected() {
        let timing = Timing::bounded(2.0).with_start(3.0, false);
        assert_eq!(timing.duration(), Some(-1.0));
        assert!(timing.validated().is_err());
    }

    #[test]
    fn test_is_playing_half_open() {
        let timing = Timing::bounded(2.0).with_start(1.0, true);
        assert_eq!(
            timing.is_playing_many(&[0.5, 1.0, 2.999, 3.0]),
            vec![false, true, true, false]
        );
        for t in [0.5, 1.0, 2.999, 3.0] {
            assert_eq!(timing.is_playing_many(&[t])[0], timing.is_playing(t));
        }
    }
}
