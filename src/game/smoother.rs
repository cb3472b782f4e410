//! Frame-rate smoothing between server snapshots
//!
//! Keeps the two latest authoritative snapshots, projects both forward to
//! "now plus latency" and blends them, so the rendered ship moves every
//! frame and eases back onto the server's track when a new update lands.

use tracing::trace;

use crate::util::time::{ticks_in, Millis, TICK_SIZE};
use crate::util::torus::{canonicalize, near};

use super::predict::Predictor;
use super::snapshot::Snapshot;

/// Gaps at least this long are treated as a fresh start, not jitter
pub const REANCHOR_WINDOW: Millis = 10.0 * TICK_SIZE;

#[derive(Debug, Default)]
pub struct Smoother {
    /// Latest authoritative snapshot
    s0: Option<Snapshot>,
    /// The one before it
    s1: Option<Snapshot>,
    /// `s0` dead-reckoned forward by whole ticks, so a ship that sits still
    /// for a long time does not replay its whole history every frame
    base: Option<Snapshot>,
}

impl Smoother {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn latest(&self) -> Option<&Snapshot> {
        self.s0.as_ref()
    }

    pub fn previous(&self) -> Option<&Snapshot> {
        self.s1.as_ref()
    }

    /// Where projection currently starts: `s0`, or `s0` carried forward
    pub fn base(&self) -> Option<&Snapshot> {
        self.base.as_ref().or(self.s0.as_ref())
    }

    pub fn reset(&mut self) {
        self.s0 = None;
        self.s1 = None;
        self.base = None;
    }

    /// Feed the entity's current authoritative state. A new snapshot is
    /// taken only when position or velocity changed; returns whether it was.
    pub fn observe(&mut self, x: f64, y: f64, vx: f64, vy: f64, now: Millis) -> bool {
        let mut fresh = Snapshot::new(x, y, vx, vy, now);
        if self.s0.is_some_and(|s0| s0.same_motion(&fresh)) {
            return false;
        }

        // Updates arrive with network jitter; pull the timestamp back toward
        // one tick after the previous snapshot so blend intervals stay close
        // to a real server tick.
        if let Some(prev) = self.s0 {
            if now - prev.when < REANCHOR_WINDOW {
                fresh.when = (prev.when + TICK_SIZE).min(now).max(now - 2.0 * TICK_SIZE);
            }
        }

        self.s1 = self.s0.replace(fresh);
        self.base = None;
        true
    }

    /// Corrected position for a frame drawn at `now`
    pub fn smooth(
        &mut self,
        now: Millis,
        latency: Option<Millis>,
        predictor: &mut Predictor,
    ) -> Option<Snapshot> {
        let s0 = self.s0?;
        let latency = latency.unwrap_or(0.0);

        let mut origin = self.base.unwrap_or(s0);
        let mut a = ticks_in(now - origin.when).max(0.0);

        // Carry the origin forward once it is a re-anchor window old. Replay
        // continues from the same point in the input log, so the result is
        // unchanged and each frame replays a bounded number of ticks.
        if a >= ticks_in(REANCHOR_WINDOW) {
            let whole = a.floor();
            origin = Snapshot {
                when: origin.when + whole * TICK_SIZE,
                ..predictor.predict(&origin, latency, whole as u32)
            };
            self.base = Some(origin);
            a -= whole;
        }
        let carried = self.base.is_some();

        let ticks = (ticks_in(latency).round() + a.floor() + 1.0) as u32;

        let p1 = match self.s1 {
            Some(s1) if a < 1.0 && !carried => predictor.predict(&s1, latency, ticks),
            _ => {
                // No previous snapshot, or the latest one is already old
                a = a.fract();
                predictor.predict(&origin, latency, ticks.saturating_sub(1))
            }
        };
        let p0 = near(predictor.predict(&origin, latency, ticks), &p1);

        let corrected = canonicalize(p0.blend(&p1, a, now));
        trace!(
            x = corrected.x,
            y = corrected.y,
            ticks,
            blend = a,
            "Smoothed position"
        );
        Some(corrected)
    }
}
