//! Position/velocity snapshots

use serde::{Deserialize, Serialize};

use crate::util::time::Millis;
use crate::util::torus::{Placed, Point};

/// A timestamped position and velocity sample.
///
/// Velocity is in world units per tick. Snapshots are values: smoothing and
/// prediction always produce new ones rather than editing old ones.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Snapshot {
    pub x: f64,
    pub y: f64,
    pub vx: f64,
    pub vy: f64,
    /// Local time the sample was captured or derived
    pub when: Millis,
}

impl Snapshot {
    pub fn new(x: f64, y: f64, vx: f64, vy: f64, when: Millis) -> Self {
        Self { x, y, vx, vy, when }
    }

    /// True when position and velocity match, ignoring timestamps
    pub fn same_motion(&self, other: &Snapshot) -> bool {
        self.x == other.x && self.y == other.y && self.vx == other.vx && self.vy == other.vy
    }

    /// Component-wise `a * self + (1 - a) * other` over position and velocity.
    ///
    /// Both snapshots should already be in the same wrap of the torus.
    pub fn blend(&self, other: &Snapshot, a: f64, when: Millis) -> Snapshot {
        let mix = |p: f64, q: f64| a * p + (1.0 - a) * q;
        Snapshot {
            x: mix(self.x, other.x),
            y: mix(self.y, other.y),
            vx: mix(self.vx, other.vx),
            vy: mix(self.vy, other.vy),
            when,
        }
    }
}

impl Placed for Snapshot {
    fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }

    fn at(self, position: Point) -> Self {
        Snapshot {
            x: position.x,
            y: position.y,
            ..self
        }
    }
}
