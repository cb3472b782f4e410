//! Ship motion model, one server tick at a time
//!
//! This mirrors the server's integrator closely enough that replaying the
//! same inputs over the same start state lands in the same place. Every
//! operation is plain `f64` arithmetic in a fixed order so results are
//! reproducible bit-for-bit.

use crate::util::torus::{canonicalize, Placed, Point};

use super::density::DensityField;
use super::snapshot::Snapshot;
use super::Controls;

/// Speed limit on either axis in units/tick
pub const MAX_SPEED: f64 = 0.65;
/// Speeds below this round to zero
pub const MIN_SPEED: f64 = 0.001;
/// Thrust from one movement key in units/tick/tick
pub const ACCEL: f64 = 0.025;
/// Fraction of velocity lost per tick on an axis with no keys held
pub const DRAG_IDLE: f64 = 0.02;
/// Fraction of velocity lost per tick while anchored
pub const DRAG_ANCHOR: f64 = 0.20;
/// Solidity at which terrain stops the ship outright
pub const SOLID_THRESHOLD: f64 = 0.98;

/// Motion constants
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionParams {
    pub max_speed: f64,
    pub min_speed: f64,
    pub accel: f64,
    pub drag_idle: f64,
    pub drag_anchor: f64,
    pub solid_threshold: f64,
}

impl Default for MotionParams {
    fn default() -> Self {
        Self {
            max_speed: MAX_SPEED,
            min_speed: MIN_SPEED,
            accel: ACCEL,
            drag_idle: DRAG_IDLE,
            drag_anchor: DRAG_ANCHOR,
            solid_threshold: SOLID_THRESHOLD,
        }
    }
}

/// What happened during one tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StepOutcome {
    /// Position advanced; carries the solidity of the new cell
    Moved { solidity: f64 },
    /// Solid terrain ahead; ship stopped in place
    Blocked,
}

/// Thrust along one axis given its pair of opposing keys
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AxisThrust {
    Idle,
    Negative,
    Positive,
    Balanced,
}

impl AxisThrust {
    fn from_keys(negative: bool, positive: bool) -> Self {
        match (negative, positive) {
            (false, false) => Self::Idle,
            (true, false) => Self::Negative,
            (false, true) => Self::Positive,
            (true, true) => Self::Balanced,
        }
    }
}

/// Advance `state` by one tick under `controls`.
pub fn step(
    state: &mut Snapshot,
    controls: Controls,
    field: &DensityField,
    params: &MotionParams,
) -> StepOutcome {
    if state.vx.abs() < params.min_speed {
        state.vx = 0.0;
    }
    if state.vy.abs() < params.min_speed {
        state.vy = 0.0;
    }

    let tentative = canonicalize(Point::new(state.x + state.vx, state.y + state.vy));
    let solidity = field.solidity(tentative);
    if solidity >= params.solid_threshold {
        // Beached: stop dead and stay put
        state.vx = 0.0;
        state.vy = 0.0;
        return StepOutcome::Blocked;
    }
    *state = state.at(tentative);

    let x_axis = AxisThrust::from_keys(
        controls.contains(Controls::LEFT),
        controls.contains(Controls::RIGHT),
    );
    let y_axis = AxisThrust::from_keys(
        controls.contains(Controls::UP),
        controls.contains(Controls::DOWN),
    );

    if controls.contains(Controls::ANCHOR) {
        state.vx *= 1.0 - params.drag_anchor;
        state.vy *= 1.0 - params.drag_anchor;
        // Anchor does not exempt an idle axis from ordinary drag
        if x_axis == AxisThrust::Idle {
            state.vx *= 1.0 - params.drag_idle;
        }
        if y_axis == AxisThrust::Idle {
            state.vy *= 1.0 - params.drag_idle;
        }
    } else {
        state.vx = thrust(state.vx, x_axis, params);
        state.vy = thrust(state.vy, y_axis, params);
    }

    // Shallows slow the ship in proportion to how solid they are
    let limit = params.max_speed * (1.0 - solidity);
    state.vx = state.vx.clamp(-limit, limit);
    state.vy = state.vy.clamp(-limit, limit);

    StepOutcome::Moved { solidity }
}

fn thrust(v: f64, axis: AxisThrust, params: &MotionParams) -> f64 {
    match axis {
        AxisThrust::Balanced => v,
        AxisThrust::Negative => v - params.accel,
        AxisThrust::Positive => v + params.accel,
        AxisThrust::Idle => v * (1.0 - params.drag_idle),
    }
}
