//! Round-trip latency from echo probes
//!
//! The server echoes an `ahoy!` to everyone nearby as `a:{x,y}`, tagged with
//! the emitter's position. The estimator sends a probe now and then, and
//! takes the delay to the first matching echo as the round-trip time.
//!
//! Samples are rare (the server rate-limits probes to one every few
//! seconds), so each accepted sample replaces the estimate outright.

use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::game::physics::MAX_SPEED;
use crate::util::time::Millis;
use crate::util::torus::{dist, Point};

use super::protocol::{EchoReply, OutboundMsg};
use super::sink::{OutboundSink, SentMessage};

/// Minimum time between probes, player-initiated ones included
pub const MIN_PROBE_SPACING: Millis = 3500.0;
/// Replies slower than this usually mean a hiccup, not the steady-state latency
pub const MAX_REPLY_DELAY: Millis = 500.0;
/// How far an echo may be from our last known position and still be ours
pub const MATCH_TOLERANCE: f64 = MAX_SPEED * 1.001;

/// Why a reply did not produce a sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Rejection {
    Inactive,
    NoProbeOutstanding,
    TooSlow { delay: Millis },
    UnknownPosition,
    Mismatched { distance: f64 },
}

#[derive(Debug, Default)]
pub struct LatencyEstimator {
    active: bool,
    /// Watches the send path for probes we did not send ourselves
    observer: Option<broadcast::Receiver<SentMessage>>,
    last_probe: Option<Millis>,
    last_reply: Option<Millis>,
    latency: Option<Millis>,
    interval: Option<Millis>,
    next_due: Option<Millis>,
}

impl LatencyEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Latest accepted round-trip time, if any
    pub fn latency(&self) -> Option<Millis> {
        self.latency
    }

    /// Periodic probe interval, if periodic probing is on
    pub fn interval(&self) -> Option<Millis> {
        self.interval
    }

    pub fn start(&mut self, sink: &OutboundSink) {
        if self.active {
            return;
        }
        self.observer = Some(sink.subscribe());
        self.active = true;
        info!("Latency estimator started");
    }

    /// Stop probing and forget everything measured so far
    pub fn stop(&mut self) {
        if !self.active {
            return;
        }
        *self = Self::default();
        info!("Latency estimator stopped");
    }

    /// Send a probe unless one went out too recently. Returns whether a
    /// probe was sent.
    pub fn probe(&mut self, now: Millis, sink: &OutboundSink) -> bool {
        if !self.active {
            return false;
        }
        self.observe_sent();
        if let Some(last) = self.last_probe {
            if now - last < MIN_PROBE_SPACING {
                return false;
            }
        }
        if let Err(e) = sink.send(OutboundMsg::Probe, now) {
            warn!(error = %e, "Failed to send echo probe");
            return false;
        }
        // Our own send also comes back through the observer with this time
        self.last_probe = Some(now);
        true
    }

    /// Change the periodic probe interval. `None` or zero turns periodic
    /// probing off but keeps the current estimate.
    pub fn set_interval(&mut self, interval: Option<Millis>, now: Millis, sink: &OutboundSink) {
        if !self.active {
            return;
        }
        self.interval = interval.filter(|i| *i > 0.0);
        self.next_due = None;
        let Some(interval) = self.interval else {
            return;
        };
        self.next_due = Some(now + interval);
        let stale = self.last_probe.map_or(true, |last| now - last > interval);
        if stale {
            self.probe(now, sink);
        }
    }

    /// Fire the periodic probe if it is due
    pub fn poll(&mut self, now: Millis, sink: &OutboundSink) {
        self.observe_sent();
        let (Some(interval), Some(due)) = (self.interval, self.next_due) else {
            return;
        };
        if now < due {
            return;
        }
        self.probe(now, sink);
        // Skip missed firings rather than bursting
        let mut next = due + interval;
        while next <= now {
            next += interval;
        }
        self.next_due = Some(next);
    }

    /// Consider an echo reply. `local` is the local entity's last
    /// authoritative position.
    pub fn handle_reply(
        &mut self,
        reply: EchoReply,
        local: Option<Point>,
        now: Millis,
    ) -> Result<Millis, Rejection> {
        if !self.active {
            return Err(Rejection::Inactive);
        }
        self.observe_sent();

        let last_probe = match (self.last_probe, self.last_reply) {
            (None, _) => return Err(Rejection::NoProbeOutstanding),
            (Some(probe), Some(answered)) if answered > probe => {
                return Err(Rejection::NoProbeOutstanding)
            }
            (Some(probe), _) => probe,
        };

        let delay = now - last_probe;
        if delay > MAX_REPLY_DELAY {
            return Err(Rejection::TooSlow { delay });
        }

        // The echo carries the emitter's position as of the same server tick
        // as our latest update; allow a tick of slack either way.
        let local = local.ok_or(Rejection::UnknownPosition)?;
        let distance = dist(&local, &Point::new(reply.x, reply.y));
        if distance > MATCH_TOLERANCE {
            return Err(Rejection::Mismatched { distance });
        }

        self.latency = Some(delay);
        self.last_reply = Some(now);
        debug!(latency_ms = delay, "Latency sample accepted");
        Ok(delay)
    }

    fn observe_sent(&mut self) {
        let Some(observer) = self.observer.as_mut() else {
            return;
        };
        loop {
            match observer.try_recv() {
                Ok(SentMessage {
                    at,
                    msg: OutboundMsg::Probe,
                }) => {
                    if self.last_probe.map_or(true, |last| at > last) {
                        self.last_probe = Some(at);
                    }
                }
                Ok(_) => {}
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    warn!(lagged_count = n, "Latency estimator lagged behind sent messages");
                }
                Err(_) => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn sink() -> (OutboundSink, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(64);
        (OutboundSink::new(tx), rx)
    }

    fn started(sink: &OutboundSink) -> LatencyEstimator {
        let mut est = LatencyEstimator::new();
        est.start(sink);
        est
    }

    fn sent(rx: &mut mpsc::Receiver<String>) -> Vec<String> {
        let mut out = Vec::new();
        while let Ok(m) = rx.try_recv() {
            out.push(m);
        }
        out
    }

    const HOME: Point = Point::new(500.0, 500.0);

    #[test]
    fn probes_within_spacing_collapse() {
        let (sink, mut rx) = sink();
        let mut est = started(&sink);
        assert!(est.probe(1000.0, &sink));
        assert!(!est.probe(1000.0 + MIN_PROBE_SPACING - 1.0, &sink));
        assert_eq!(sent(&mut rx), vec!["ahoy!".to_string()]);
        assert!(est.probe(1000.0 + MIN_PROBE_SPACING, &sink));
    }

    #[test]
    fn accepts_matching_reply() {
        let (sink, _rx) = sink();
        let mut est = started(&sink);
        est.probe(0.0, &sink);
        let reply = EchoReply { x: 500.3, y: 499.5 };
        assert_eq!(est.handle_reply(reply, Some(HOME), 120.0), Ok(120.0));
        assert_eq!(est.latency(), Some(120.0));
    }

    #[test]
    fn slow_reply_is_ignored() {
        let (sink, _rx) = sink();
        let mut est = started(&sink);
        est.probe(0.0, &sink);
        let reply = EchoReply { x: 500.0, y: 500.0 };
        assert_eq!(
            est.handle_reply(reply, Some(HOME), MAX_REPLY_DELAY + 1.0),
            Err(Rejection::TooSlow { delay: MAX_REPLY_DELAY + 1.0 })
        );
        assert_eq!(est.latency(), None);
    }

    #[test]
    fn far_reply_is_someone_else() {
        let (sink, _rx) = sink();
        let mut est = started(&sink);
        est.probe(0.0, &sink);
        let reply = EchoReply { x: 500.0, y: 501.0 };
        assert!(matches!(
            est.handle_reply(reply, Some(HOME), 80.0),
            Err(Rejection::Mismatched { .. })
        ));
        assert_eq!(est.latency(), None);
    }

    #[test]
    fn reply_matches_across_the_seam() {
        let (sink, _rx) = sink();
        let mut est = started(&sink);
        est.probe(0.0, &sink);
        let reply = EchoReply { x: 1999.8, y: 10.0 };
        assert_eq!(est.handle_reply(reply, Some(Point::new(0.2, 10.0)), 60.0), Ok(60.0));
    }

    #[test]
    fn only_first_reply_per_probe_counts() {
        let (sink, _rx) = sink();
        let mut est = started(&sink);
        est.probe(0.0, &sink);
        let reply = EchoReply { x: 500.0, y: 500.0 };
        assert_eq!(est.handle_reply(reply, Some(HOME), 90.0), Ok(90.0));
        assert_eq!(
            est.handle_reply(reply, Some(HOME), 95.0),
            Err(Rejection::NoProbeOutstanding)
        );
        assert_eq!(est.latency(), Some(90.0));
    }

    #[test]
    fn reply_without_probe_or_position_is_ignored() {
        let (sink, _rx) = sink();
        let mut est = started(&sink);
        let reply = EchoReply { x: 500.0, y: 500.0 };
        assert_eq!(
            est.handle_reply(reply, Some(HOME), 10.0),
            Err(Rejection::NoProbeOutstanding)
        );
        est.probe(20.0, &sink);
        assert_eq!(est.handle_reply(reply, None, 30.0), Err(Rejection::UnknownPosition));
    }

    #[test]
    fn player_probe_through_sink_counts() {
        let (sink, mut rx) = sink();
        let mut est = started(&sink);
        sink.send(OutboundMsg::Probe, 100.0).expect("send");
        // Rate floor applies to the player's probe too
        assert!(!est.probe(200.0, &sink));
        let reply = EchoReply { x: 500.0, y: 500.0 };
        assert_eq!(est.handle_reply(reply, Some(HOME), 250.0), Ok(150.0));
        assert_eq!(sent(&mut rx).len(), 1);
    }

    #[test]
    fn interval_fires_immediately_when_stale_then_periodically() {
        let (sink, mut rx) = sink();
        let mut est = started(&sink);
        est.set_interval(Some(10_000.0), 0.0, &sink);
        assert_eq!(sent(&mut rx).len(), 1);

        est.poll(9_999.0, &sink);
        assert!(sent(&mut rx).is_empty());
        est.poll(10_000.0, &sink);
        assert_eq!(sent(&mut rx).len(), 1);
        // Long stall: one probe, not a burst
        est.poll(55_000.0, &sink);
        assert_eq!(sent(&mut rx).len(), 1);
    }

    #[test]
    fn clearing_interval_keeps_estimate() {
        let (sink, mut rx) = sink();
        let mut est = started(&sink);
        est.set_interval(Some(5_000.0), 0.0, &sink);
        est.handle_reply(EchoReply { x: 500.0, y: 500.0 }, Some(HOME), 70.0)
            .expect("accepted");
        est.set_interval(Some(0.0), 100.0, &sink);
        assert_eq!(est.interval(), None);
        est.poll(1_000_000.0, &sink);
        assert_eq!(sent(&mut rx).len(), 1);
        assert_eq!(est.latency(), Some(70.0));
    }

    #[test]
    fn stop_resets_and_is_idempotent() {
        let (sink, _rx) = sink();
        let mut est = started(&sink);
        est.set_interval(Some(5_000.0), 0.0, &sink);
        est.handle_reply(EchoReply { x: 500.0, y: 500.0 }, Some(HOME), 70.0)
            .expect("accepted");
        assert_eq!(sink.observer_count(), 1);

        est.stop();
        est.stop();
        assert!(!est.is_active());
        assert_eq!(est.latency(), None);
        assert_eq!(est.interval(), None);
        assert_eq!(sink.observer_count(), 0);
        assert_eq!(
            est.handle_reply(EchoReply { x: 500.0, y: 500.0 }, Some(HOME), 80.0),
            Err(Rejection::Inactive)
        );
    }

    #[test]
    fn inactive_estimator_ignores_interval() {
        let (sink, mut rx) = sink();
        let mut est = LatencyEstimator::new();
        est.set_interval(Some(1_000.0), 0.0, &sink);
        assert_eq!(est.interval(), None);
        assert!(sent(&mut rx).is_empty());
    }
}
