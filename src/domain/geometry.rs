// Curved walking paths
//
// Quadratic Bézier paths between two office coordinates, sampled by the
// animation engine for position and sprite facing.

use serde::{Deserialize, Serialize};

/// Step used on each side of `t` when sampling the tangent
const DIRECTION_DELTA: f64 = 0.01;

/// A point on the office floor, in screen pixels (y grows downwards)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Cardinal facing of a walking sprite
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Up => write!(f, "up"),
            Direction::Down => write!(f, "down"),
            Direction::Left => write!(f, "left"),
            Direction::Right => write!(f, "right"),
        }
    }
}

/// Quadratic Bézier path with a control point bowed off the straight line
///
/// # Example
/// ```
/// use office_realtime::domain::geometry::{CurvedPath, Point};
///
/// let start = Point::new(780.0, 180.0);
/// let end = Point::new(450.0, 200.0);
/// let path = CurvedPath::new(start, end, 0.3);
///
/// assert_eq!(path.position_at(0.0), start);
/// assert_eq!(path.position_at(1.0), end);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurvedPath {
    pub start: Point,
    pub control: Point,
    pub end: Point,
}

impl CurvedPath {
    /// Builds a path whose midpoint is pushed sideways by `intensity` times
    /// the straight-line length. An intensity of 0 yields a straight line.
    pub fn new(start: Point, end: Point, intensity: f64) -> Self {
        let mid = Point::new((start.x + end.x) / 2.0, (start.y + end.y) / 2.0);
        let dx = end.x - start.x;
        let dy = end.y - start.y;
        let length = dx.hypot(dy);

        // A zero-length walk has no perpendicular
        let control = if length == 0.0 {
            mid
        } else {
            let perp_x = -dy / length;
            let perp_y = dx / length;
            let curvature = length * intensity;
            Point::new(mid.x + perp_x * curvature, mid.y + perp_y * curvature)
        };

        Self {
            start,
            control,
            end,
        }
    }

    /// Evaluates B(t) = (1-t)²·P0 + 2(1-t)t·P1 + t²·P2 with `t` clamped to [0, 1]
    pub fn position_at(&self, t: f64) -> Point {
        let t = t.clamp(0.0, 1.0);
        let one_minus_t = 1.0 - t;
        let w0 = one_minus_t * one_minus_t;
        let w1 = 2.0 * one_minus_t * t;
        let w2 = t * t;

        Point::new(
            w0 * self.start.x + w1 * self.control.x + w2 * self.end.x,
            w0 * self.start.y + w1 * self.control.y + w2 * self.end.y,
        )
    }

    /// Facing at `t`, from the chord between `t - 0.01` and `t + 0.01`
    pub fn direction_at(&self, t: f64) -> Direction {
        let before = self.position_at((t - DIRECTION_DELTA).max(0.0));
        let after = self.position_at((t + DIRECTION_DELTA).min(1.0));

        let angle = (after.y - before.y).atan2(after.x - before.x).to_degrees();

        if (-45.0..45.0).contains(&angle) {
            Direction::Right
        } else if (45.0..135.0).contains(&angle) {
            Direction::Down
        } else if !(-135.0..135.0).contains(&angle) {
            Direction::Left
        } else {
            Direction::Up
        }
    }
}
