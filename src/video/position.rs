use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// One coordinate of a clip's top-left corner on the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Coord {
    /// Absolute pixels from the canvas origin.
    Pixels(f64),
    /// Fraction of the canvas extent (0.5 = the middle of the canvas).
    Fraction(f64),
    /// Left / top edge.
    Start,
    /// Centered on the canvas.
    Center,
    /// Right / bottom edge.
    End,
}

impl Coord {
    fn resolve(self, canvas: u32, clip: u32) -> i64 {
        let (canvas, clip) = (f64::from(canvas), f64::from(clip));
        let value = match self {
            Self::Pixels(px) => px,
            Self::Fraction(fraction) => fraction * canvas,
            Self::Start => 0.0,
            Self::Center => (canvas - clip) / 2.0,
            Self::End => canvas - clip,
        };
        value.floor() as i64
    }
}

/// A resolved (x, y) placement rule.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    pub x: Coord,
    pub y: Coord,
}

impl Placement {
    pub fn new(x: Coord, y: Coord) -> Self {
        Self { x, y }
    }

    /// Top-left corner in canvas pixels for a clip of size `clip`.
    pub fn resolve(&self, canvas: (u32, u32), clip: (u32, u32)) -> (i64, i64) {
        (self.x.resolve(canvas.0, clip.0), self.y.resolve(canvas.1, clip.1))
    }
}

impl Default for Placement {
    fn default() -> Self {
        Self::new(Coord::Pixels(0.0), Coord::Pixels(0.0))
    }
}

type PlacementFn = Arc<dyn Fn(f64) -> Placement + Send + Sync>;

/// Where a clip sits on its parent canvas, possibly varying with time.
#[derive(Clone)]
pub enum Position {
    Fixed(Placement),
    Animated(PlacementFn),
}

impl Position {
    pub fn pixels(x: f64, y: f64) -> Self {
        Self::Fixed(Placement::new(Coord::Pixels(x), Coord::Pixels(y)))
    }

    pub fn fraction(x: f64, y: f64) -> Self {
        Self::Fixed(Placement::new(Coord::Fraction(x), Coord::Fraction(y)))
    }

    pub fn center() -> Self {
        Self::Fixed(Placement::new(Coord::Center, Coord::Center))
    }

    pub fn anchored(x: Coord, y: Coord) -> Self {
        Self::Fixed(Placement::new(x, y))
    }

    /// A position computed from the clip-local time.
    pub fn animated<F>(func: F) -> Self
    where
        F: Fn(f64) -> Placement + Send + Sync + 'static,
    {
        Self::Animated(Arc::new(func))
    }

    pub fn at(&self, t: f64) -> Placement {
        match self {
            Self::Fixed(placement) => *placement,
            Self::Animated(func) => func(t),
        }
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::Fixed(Placement::default())
    }
}

impl fmt::Debug for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed(placement) => write!(f, "Fixed({:?})", placement),
            Self::Animated(_) => write!(f, "Animated"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anchors() {
        let canvas = (100, 50);
        let clip = (20, 10);
        assert_eq!(Position::center().at(0.0).resolve(canvas, clip), (40, 20));
        assert_eq!(Position::anchored(Coord::End, Coord::Start).at(0.0).resolve(canvas, clip), (80, 0));
        assert_eq!(Position::fraction(0.5, 0.1).at(0.0).resolve(canvas, clip), (50, 5));
        assert_eq!(Position::pixels(-5.0, 3.0).at(0.0).resolve(canvas, clip), (-5, 3));
    }

    #[test]
    fn test_animated_position_follows_time() {
        let position = Position::animated(|t| Placement::new(Coord::Pixels(10.0 * t), Coord::Center));
        assert_eq!(position.at(2.0).resolve((100, 100), (10, 10)), (20, 45));
    }
}
