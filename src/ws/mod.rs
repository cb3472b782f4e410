//! Server connection: wire format, send path, latency probing

pub mod handler;
pub mod latency;
pub mod protocol;
pub mod sink;

pub use handler::{connect, Connection};
pub use latency::LatencyEstimator;
pub use protocol::{InboundMsg, OutboundMsg};
pub use sink::OutboundSink;
