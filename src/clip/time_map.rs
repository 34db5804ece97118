use std::fmt;
use std::sync::Arc;

/// How far a mirrored time is pulled back so that the half-open window
/// `[0, d)` reflects onto itself frame-for-frame.
pub const MIRROR_NUDGE: f64 = 1e-6;

type TimeFn = Arc<dyn Fn(f64) -> f64 + Send + Sync>;

/// A time remapping `t -> t'` applied before a frame is fetched.
///
/// The common warps are plain data so they can be inspected and compared;
/// arbitrary functions go through [`TimeMap::Custom`].
#[derive(Clone)]
pub enum TimeMap {
    /// `t + offset`
    Shift(f64),
    /// `factor * t`
    Scale(f64),
    /// `duration - t`
    Mirror { duration: f64 },
    /// `t mod period`
    Modulo { period: f64 },
    /// Skips the interval `[from, to)`.
    Cutout { from: f64, to: f64 },
    Custom { label: String, func: TimeFn },
}

impl TimeMap {
    pub fn custom<F>(label: impl Into<String>, func: F) -> Self
    where
        F: Fn(f64) -> f64 + Send + Sync + 'static,
    {
        Self::Custom {
            label: label.into(),
            func: Arc::new(func),
        }
    }

    pub fn apply(&self, t: f64) -> f64 {
        match self {
            Self::Shift(offset) => t + offset,
            Self::Scale(factor) => t * factor,
            Self::Mirror { duration } => (duration - t - MIRROR_NUDGE).max(0.0),
            Self::Modulo { period } => t.rem_euclid(*period),
            Self::Cutout { from, to } => {
                if t < *from {
                    t
                } else {
                    t + (to - from)
                }
            }
            Self::Custom { func, .. } => func(t),
        }
    }
}

impl fmt::Debug for TimeMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Shift(offset) => write!(f, "Shift({})", offset),
            Self::Scale(factor) => write!(f, "Scale({})", factor),
            Self::Mirror { duration } => write!(f, "Mirror({})", duration),
            Self::Modulo { period } => write!(f, "Modulo({})", period),
            Self::Cutout { from, to } => write!(f, "Cutout({}..{})", from, to),
            Self::Custom { label, .. } => write!(f, "Custom({})", label),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_maps() {
        assert_eq!(TimeMap::Shift(2.0).apply(1.0), 3.0);
        assert_eq!(TimeMap::Scale(2.0).apply(1.5), 3.0);
        assert_eq!(TimeMap::Modulo { period: 2.0 }.apply(5.0), 1.0);
        assert_eq!(TimeMap::custom("square", |t| t * t).apply(3.0), 9.0);
    }

    #[test]
    fn test_cutout_skips_interval() {
        let map = TimeMap::Cutout { from: 1.0, to: 3.0 };
        assert_eq!(map.apply(0.5), 0.5);
        assert_eq!(map.apply(1.0), 3.0);
        assert_eq!(map.apply(2.0), 4.0);
    }

    #[test]
    fn test_mirror_stays_inside_window() {
        let map = TimeMap::Mirror { duration: 3.0 };
        for t in [0.0, 1.0, 2.0, 2.999] {
            let mirrored = map.apply(t);
            assert!((0.0..3.0).contains(&mirrored));
            assert!((mirrored - (3.0 - t)).abs() < 1e-5);
        }
        assert_eq!(map.apply(3.0), 0.0);
    }

    #[test]
    fn test_debug_names_the_map() {
        assert_eq!(format!("{:?}", TimeMap::custom("ease", |t| t)), "Custom(ease)");
        assert_eq!(format!("{:?}", TimeMap::Cutout { from: 1.0, to: 2.0 }), "Cutout(1..2)");
    }
}
