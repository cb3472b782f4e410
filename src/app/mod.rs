//! Session wiring

mod session;

pub use session::{Session, SessionCommand};
