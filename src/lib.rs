//! Client-side motion prediction and smoothing for the ship game
//!
//! The server runs the authoritative simulation at a fixed tick. This crate
//! keeps the locally controlled ship moving smoothly between updates by
//! replaying recently sent controls through the same motion model and
//! blending toward each new authoritative snapshot.

pub mod app;
pub mod config;
pub mod game;
pub mod util;
pub mod ws;
