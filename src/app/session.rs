//! Prediction session: owns every subsystem for one connection

use std::future::Future;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

use crate::config::SessionConfig;
use crate::game::{Controls, DensityField, EntityTable, Predictor, Smoother, Snapshot};
use crate::util::time::{frame_period, Millis, SessionClock};
use crate::ws::latency::LatencyEstimator;
use crate::ws::protocol::{InboundMsg, OutboundMsg};
use crate::ws::sink::OutboundSink;

/// Requests from the input layer to a running session
#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    /// Commanded control state changed
    SetControls(Controls),
    /// Player sent an echo probe by hand. It always goes out; the
    /// estimator sees it on the send path and counts it as its last probe.
    Probe,
    /// Change or disable periodic probing
    SetProbeInterval(Option<Millis>),
    /// End the session loop
    Stop,
}

pub struct Session {
    config: SessionConfig,
    active: bool,
    sink: OutboundSink,
    entities: EntityTable,
    estimator: LatencyEstimator,
    predictor: Predictor,
    smoother: Smoother,
    controls: Controls,
    /// When periodic probing gets switched on after start
    probe_arm_at: Option<Millis>,
}

impl Session {
    pub fn new(config: SessionConfig, sink: OutboundSink, density: Arc<DensityField>) -> Self {
        Self {
            config,
            active: false,
            sink,
            entities: EntityTable::new(),
            estimator: LatencyEstimator::new(),
            predictor: Predictor::new(density),
            smoother: Smoother::new(),
            controls: Controls::empty(),
            probe_arm_at: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn latency(&self) -> Option<Millis> {
        self.estimator.latency()
    }

    pub fn controls(&self) -> Controls {
        self.controls
    }

    /// Latest corrected state of the local entity
    pub fn corrected(&self) -> Option<Snapshot> {
        self.entities
            .get(&self.config.entity_id)
            .and_then(|e| e.corrected)
    }

    pub fn entities(&self) -> &EntityTable {
        &self.entities
    }

    pub fn estimator(&self) -> &LatencyEstimator {
        &self.estimator
    }

    pub fn predictor(&self) -> &Predictor {
        &self.predictor
    }

    pub fn smoother(&self) -> &Smoother {
        &self.smoother
    }

    pub fn sink(&self) -> &OutboundSink {
        &self.sink
    }

    pub fn start(&mut self, now: Millis) {
        if self.active {
            return;
        }
        self.estimator.start(&self.sink);
        self.predictor.start(&self.sink);
        self.probe_arm_at = self
            .config
            .probe_interval
            .map(|_| now + self.config.probe_start_delay);
        self.active = true;
        info!(entity_id = %self.config.entity_id, "Session started");
    }

    /// Undo `start`, in reverse order
    pub fn stop(&mut self) {
        if !self.active {
            return;
        }
        self.active = false;
        if let Some(me) = self.entities.get_mut(&self.config.entity_id) {
            me.corrected = None;
        }
        self.controls = Controls::empty();
        self.smoother.reset();
        self.predictor.stop();
        self.probe_arm_at = None;
        self.estimator.stop();
        info!(entity_id = %self.config.entity_id, "Session stopped");
    }

    /// Process one inbound text frame
    pub fn handle_text(&mut self, text: &str, now: Millis) {
        if !self.active {
            return;
        }
        let msg = match InboundMsg::parse(text) {
            Ok(msg) => msg,
            Err(e) => {
                debug!(error = %e, "Ignoring inbound message");
                return;
            }
        };

        match msg {
            InboundMsg::Entities(patches) => {
                let mut authoritative = false;
                for (id, patch) in &patches {
                    self.entities.update(id, patch.as_ref());
                    if *id == self.config.entity_id {
                        authoritative |= patch.as_ref().is_some_and(|p| p.has_velocity());
                    }
                }
                if authoritative {
                    self.smooth_local(now);
                }
            }
            InboundMsg::Echo(reply) => {
                let local = self
                    .entities
                    .get(&self.config.entity_id)
                    .map(|e| e.position());
                if let Err(rejection) = self.estimator.handle_reply(reply, local, now) {
                    debug!(?rejection, "Echo reply not used");
                }
            }
        }
    }

    /// Send the new control state if it differs from the last one sent.
    /// Returns whether a message went out.
    pub fn set_controls(&mut self, controls: Controls, now: Millis) -> bool {
        if !self.active || controls == self.controls {
            return false;
        }
        match self.sink.send(OutboundMsg::Controls(controls), now) {
            Ok(()) => {
                self.controls = controls;
                true
            }
            Err(e) => {
                warn!(error = %e, "Failed to send controls");
                false
            }
        }
    }

    /// Rate-limited probe on the estimator's behalf
    pub fn probe(&mut self, now: Millis) -> bool {
        self.estimator.probe(now, &self.sink)
    }

    /// Send the player's own probe, ignoring the estimator's rate floor
    pub fn player_probe(&mut self, now: Millis) -> bool {
        if !self.active {
            return false;
        }
        match self.sink.send(OutboundMsg::Probe, now) {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Failed to send player probe");
                false
            }
        }
    }

    pub fn set_probe_interval(&mut self, interval: Option<Millis>, now: Millis) {
        // An explicit choice overrides the delayed default
        self.probe_arm_at = None;
        self.estimator.set_interval(interval, now, &self.sink);
    }

    /// Fire whatever timers are due
    pub fn poll_timers(&mut self, now: Millis) {
        if !self.active {
            return;
        }
        if self.probe_arm_at.is_some_and(|at| now >= at) {
            self.probe_arm_at = None;
            self.estimator
                .set_interval(self.config.probe_interval, now, &self.sink);
        }
        self.estimator.poll(now, &self.sink);
    }

    /// Per-frame smoothing. Returns the corrected local state, or `None` if
    /// there is nothing to show yet.
    pub fn frame(&mut self, now: Millis) -> Option<Snapshot> {
        if !self.active {
            return None;
        }
        self.smooth_local(now)
    }

    fn smooth_local(&mut self, now: Millis) -> Option<Snapshot> {
        let me = self.entities.get_mut(&self.config.entity_id)?;
        self.smoother.observe(me.x, me.y, me.vx, me.vy, now);
        let corrected = self
            .smoother
            .smooth(now, self.estimator.latency(), &mut self.predictor);
        me.corrected = corrected;
        corrected
    }

    fn apply(&mut self, command: SessionCommand, now: Millis) {
        match command {
            SessionCommand::SetControls(controls) => {
                self.set_controls(controls, now);
            }
            SessionCommand::Probe => {
                self.player_probe(now);
            }
            SessionCommand::SetProbeInterval(interval) => self.set_probe_interval(interval, now),
            SessionCommand::Stop => self.stop(),
        }
    }

    /// Run the session until the server hangs up, a `Stop` command arrives,
    /// or `shutdown` resolves. Returns the stopped session.
    pub async fn run(
        mut self,
        clock: SessionClock,
        mut inbound: mpsc::Receiver<String>,
        mut commands: mpsc::Receiver<SessionCommand>,
        shutdown: impl Future<Output = ()>,
    ) -> Self {
        let mut frames = interval(frame_period(self.config.frame_rate_hz));
        frames.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        self.start(clock.now());

        loop {
            tokio::select! {
                biased;

                _ = &mut shutdown => {
                    info!("Shutdown requested, ending session");
                    break;
                }

                msg = inbound.recv() => match msg {
                    Some(text) => self.handle_text(&text, clock.now()),
                    None => {
                        info!("Server connection closed");
                        break;
                    }
                },

                Some(command) = commands.recv() => {
                    self.apply(command, clock.now());
                    if !self.active {
                        break;
                    }
                }

                _ = frames.tick() => {
                    let now = clock.now();
                    self.poll_timers(now);
                    if let Some(c) = self.frame(now) {
                        trace!(x = c.x, y = c.y, vx = c.vx, vy = c.vy, "Frame");
                    }
                }
            }
        }

        self.stop();
        self
    }
}
