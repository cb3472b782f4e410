//! Dead reckoning over the recorded input log
//!
//! Given a snapshot the server sent us, replay the controls we were sending
//! at the time through the motion model to guess where the server has the
//! ship now.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{info, trace, warn};

use crate::util::time::Millis;
use crate::util::torus::canonicalize;
use crate::ws::protocol::OutboundMsg;
use crate::ws::sink::{OutboundSink, SentMessage};

use super::density::DensityField;
use super::input_log::InputLog;
use super::physics::{self, MotionParams, StepOutcome};
use super::snapshot::Snapshot;

#[derive(Debug)]
pub struct Predictor {
    active: bool,
    log: InputLog,
    density: Arc<DensityField>,
    params: MotionParams,
    /// Feed of sent messages; control changes go into the log
    observer: Option<broadcast::Receiver<SentMessage>>,
}

impl Predictor {
    pub fn new(density: Arc<DensityField>) -> Self {
        Self {
            active: false,
            log: InputLog::new(),
            density,
            params: MotionParams::default(),
            observer: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Start recording control changes sent through `sink`
    pub fn start(&mut self, sink: &OutboundSink) {
        if self.active {
            return;
        }
        self.observer = Some(sink.subscribe());
        self.active = true;
        info!("Predictor started");
    }

    /// Detach from the sink and forget recorded input
    pub fn stop(&mut self) {
        if !self.active {
            return;
        }
        self.observer = None;
        self.active = false;
        self.log.clear();
        info!("Predictor stopped");
    }

    pub fn input_log(&self) -> &InputLog {
        &self.log
    }

    pub fn input_log_mut(&mut self) -> &mut InputLog {
        &mut self.log
    }

    /// Project `snapshot` forward by `ticks` server ticks, replaying the
    /// inputs that were in effect starting `latency` ms before it was taken.
    ///
    /// Returns the snapshot unchanged when there is nothing to do.
    pub fn predict(&mut self, snapshot: &Snapshot, latency: Millis, ticks: u32) -> Snapshot {
        if !self.active || ticks == 0 {
            return *snapshot;
        }
        self.record_sent();

        let mut predicted = *snapshot;
        let mut blocked = 0u32;
        for controls in self.log.merge(snapshot.when - latency, ticks) {
            if physics::step(&mut predicted, controls, &self.density, &self.params)
                == StepOutcome::Blocked
            {
                blocked += 1;
            }
        }
        if blocked > 0 {
            trace!(blocked, ticks, "Prediction ran aground");
        }
        canonicalize(predicted)
    }

    fn record_sent(&mut self) {
        let Some(observer) = self.observer.as_mut() else {
            return;
        };
        loop {
            match observer.try_recv() {
                Ok(SentMessage {
                    at,
                    msg: OutboundMsg::Controls(controls),
                }) => self.log.record(at, controls),
                Ok(_) => {}
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    warn!(lagged_count = n, "Predictor lost sent control changes");
                }
                Err(_) => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::physics::{ACCEL, MAX_SPEED};
    use crate::game::Controls;
    use crate::util::time::TICK_SIZE;
    use tokio::sync::mpsc;

    fn started(density: DensityField) -> (Predictor, OutboundSink, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(64);
        let sink = OutboundSink::new(tx);
        let mut predictor = Predictor::new(Arc::new(density));
        predictor.start(&sink);
        (predictor, sink, rx)
    }

    #[test]
    fn zero_ticks_is_identity() {
        let (mut p, _sink, _rx) = started(DensityField::open_water());
        p.input_log_mut().record(0.0, Controls::RIGHT);
        let s = Snapshot::new(100.0, 100.0, 0.3, -0.2, 500.0);
        assert_eq!(p.predict(&s, 80.0, 0), s);
    }

    #[test]
    fn inactive_is_identity() {
        let mut p = Predictor::new(Arc::new(DensityField::open_water()));
        let s = Snapshot::new(100.0, 100.0, 0.3, -0.2, 500.0);
        assert_eq!(p.predict(&s, 0.0, 10), s);
    }

    #[test]
    fn prediction_is_deterministic() {
        let (mut p, _sink, _rx) = started(DensityField::open_water());
        let log = p.input_log_mut();
        log.record(0.0, Controls::RIGHT | Controls::DOWN);
        log.record(150.0, Controls::ANCHOR);
        log.record(300.0, Controls::LEFT);
        let s = Snapshot::new(1990.0, 5.0, 0.4, -0.3, 100.0);

        let a = p.predict(&s, 40.0, 25);
        let b = p.predict(&s, 40.0, 25);
        assert_eq!(a.x.to_bits(), b.x.to_bits());
        assert_eq!(a.y.to_bits(), b.y.to_bits());
        assert_eq!(a.vx.to_bits(), b.vx.to_bits());
        assert_eq!(a.vy.to_bits(), b.vy.to_bits());
    }

    #[test]
    fn holding_right_ramps_to_top_speed() {
        let (mut p, _sink, _rx) = started(DensityField::open_water());
        p.input_log_mut().record(0.0, Controls::RIGHT);
        let start = Snapshot::new(100.0, 100.0, 0.0, 0.0, 0.0);

        let mut prev = start;
        for tick in 1..=40u32 {
            let s = p.predict(&start, 0.0, tick);
            let expected_vx = (ACCEL * tick as f64).min(MAX_SPEED);
            assert!(
                (s.vx - expected_vx).abs() < 1e-9,
                "tick {tick}: vx {} != {expected_vx}",
                s.vx
            );
            if tick >= 26 {
                assert_eq!(s.vx, MAX_SPEED);
            }
            // Position moves by the velocity held going into the tick
            assert!((s.x - (prev.x + prev.vx)).abs() < 1e-9);
            assert!(s.x > prev.x || tick == 1);
            assert_eq!(s.y, 100.0);
            prev = s;
        }
    }

    #[test]
    fn latency_shifts_which_inputs_replay() {
        let (mut p, _sink, _rx) = started(DensityField::open_water());
        p.input_log_mut().record(0.0, Controls::empty());
        p.input_log_mut().record(1000.0, Controls::RIGHT);
        let s = Snapshot::new(100.0, 100.0, 0.0, 0.0, 1000.0);

        // Looking back 10 ticks, the first ticks replay "no input"
        let late = p.predict(&s, 10.0 * TICK_SIZE, 3);
        assert_eq!(late.vx, 0.0);
        let now = p.predict(&s, 0.0, 3);
        assert!(now.vx > 0.0);
    }

    #[test]
    fn blocked_by_solid_neighbour() {
        let field = DensityField::from_fn(|x, y| if (x, y) == (101, 100) { 255 } else { 0 });
        let (mut p, _sink, _rx) = started(field);
        p.input_log_mut().record(0.0, Controls::RIGHT);
        let s = Snapshot::new(100.5, 100.5, 0.6, 0.2, 0.0);
        let out = p.predict(&s, 0.0, 1);
        assert_eq!((out.x, out.y, out.vx, out.vy), (100.5, 100.5, 0.0, 0.0));
    }

    #[test]
    fn records_controls_sent_through_sink() {
        let (mut p, sink, _rx) = started(DensityField::open_water());
        sink.send(OutboundMsg::Controls(Controls::UP), 10.0).expect("send");
        sink.send(OutboundMsg::Probe, 11.0).expect("send");
        let s = Snapshot::new(100.0, 100.0, 0.0, 0.0, 20.0);
        let out = p.predict(&s, 0.0, 1);
        assert_eq!(out.vy, -ACCEL);
        assert_eq!(p.input_log().len(), 1);
    }

    #[test]
    fn stop_detaches_and_clears() {
        let (mut p, sink, _rx) = started(DensityField::open_water());
        p.input_log_mut().record(0.0, Controls::LEFT);
        p.stop();
        p.stop();
        assert!(!p.is_active());
        assert!(p.input_log().is_empty());
        assert_eq!(sink.observer_count(), 0);
    }
}
