//! Toroidal world geometry
//!
//! The sea wraps on both axes. Any position has infinitely many images
//! `WORLD_SIZE` apart; these helpers pick the one that is convenient for
//! the caller, either the primary tile `[0, WORLD_SIZE)` or the image
//! nearest some reference point.

use crate::game::physics::MAX_SPEED;

/// Edge length of the world in units
pub const WORLD_SIZE: f64 = 2000.0;

const HALF_WORLD: f64 = WORLD_SIZE / 2.0;

/// A bare position or vector in world units
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Center of the primary tile
    pub const CENTER: Point = Point::new(HALF_WORLD, HALF_WORLD);
}

/// Anything with a position on the torus.
///
/// `at` returns a copy moved to the given position, carrying every other
/// field (velocity, timestamp) through untouched.
pub trait Placed: Copy {
    fn position(&self) -> Point;
    fn at(self, position: Point) -> Self;
}

impl Placed for Point {
    fn position(&self) -> Point {
        *self
    }

    fn at(self, position: Point) -> Self {
        position
    }
}

/// Reduce one coordinate into `[center - WORLD_SIZE/2, center + WORLD_SIZE/2)`.
/// Values already in range are returned bit-for-bit.
fn wrap_axis(value: f64, center: f64) -> f64 {
    let lo = center - HALF_WORLD;
    let hi = center + HALF_WORLD;
    if value >= lo && value < hi {
        return value;
    }
    let wrapped = lo + (value - lo).rem_euclid(WORLD_SIZE);
    // rem_euclid can round up to exactly WORLD_SIZE for values just below lo
    if wrapped >= hi || wrapped < lo {
        lo
    } else {
        wrapped
    }
}

/// Reduce `p` into the primary tile `[0, WORLD_SIZE)`.
pub fn canonicalize<P: Placed>(p: P) -> P {
    canonicalize_near(p, Point::CENTER)
}

/// Reduce `p` into the square of side `WORLD_SIZE` centered on `reference`.
pub fn canonicalize_near<P: Placed>(p: P, reference: Point) -> P {
    let pos = p.position();
    p.at(Point::new(
        wrap_axis(pos.x, reference.x),
        wrap_axis(pos.y, reference.y),
    ))
}

/// The image of `p` nearest `reference`.
///
/// The result may lie outside the primary tile, which is what callers want
/// when comparing or interpolating against `reference`.
pub fn near<P: Placed, R: Placed>(p: P, reference: &R) -> P {
    canonicalize_near(p, reference.position())
}

/// Wrap-aware Chebyshev distance between `a` and `b`.
///
/// Thrust axes are independent, so the larger axis gap is what matters.
pub fn dist<A: Placed, B: Placed>(a: &A, b: &B) -> f64 {
    let (a, b) = (a.position(), b.position());
    axis_gap(a.x, b.x).max(axis_gap(a.y, b.y))
}

fn axis_gap(a: f64, b: f64) -> f64 {
    let d = (a - b).abs() % WORLD_SIZE;
    d.min(WORLD_SIZE - d)
}

/// Scale `v` so its dominant axis is at top speed, keeping the ratio and
/// signs of both axes. The zero vector stays zero.
pub fn norm(v: Point) -> Point {
    let Point { x, y } = v;
    if x.abs() > y.abs() {
        Point::new(MAX_SPEED * sign(x), (y / x).abs() * MAX_SPEED * sign(y))
    } else if y == 0.0 {
        Point::default()
    } else {
        Point::new((x / y).abs() * MAX_SPEED * sign(x), MAX_SPEED * sign(y))
    }
}

/// Like `f64::signum` but zero maps to zero
fn sign(v: f64) -> f64 {
    if v > 0.0 {
        1.0
    } else if v < 0.0 {
        -1.0
    } else {
        0.0
    }
}
