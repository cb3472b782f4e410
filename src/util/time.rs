//! Time utilities for the prediction loop

use std::time::{Duration, Instant};

/// Local timestamp in milliseconds since the session clock started.
///
/// Kept as a float so sub-millisecond frame timing survives the
/// tick arithmetic in the smoother.
pub type Millis = f64;

/// Server tick length in milliseconds
pub const TICK_SIZE: Millis = 33.0;

/// Convert a duration in milliseconds to fractional server ticks
pub fn ticks_in(ms: Millis) -> f64 {
    ms / TICK_SIZE
}

/// Monotonic clock for one session
#[derive(Debug, Clone)]
pub struct SessionClock {
    start: Instant,
}

impl SessionClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Milliseconds elapsed since the clock was created
    pub fn now(&self) -> Millis {
        self.start.elapsed().as_secs_f64() * 1000.0
    }
}

impl Default for SessionClock {
    fn default() -> Self {
        Self::new()
    }
}

/// Interval between render frames for a given refresh rate. Never zero.
pub fn frame_period(rate_hz: u32) -> Duration {
    Duration::from_micros(1_000_000 / rate_hz.clamp(1, 1_000_000) as u64)
}
