//! Shared helpers: session time and torus geometry

pub mod time;
pub mod torus;
