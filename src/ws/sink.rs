//! Outgoing message sink with send observers
//!
//! The transport writer owns the receiving end of `outbound`. Anything that
//! wants to see what the client sends (the prediction input log, the latency
//! estimator watching for player-initiated probes) subscribes to the
//! broadcast of sent messages instead of wrapping the send path.

use tokio::sync::{broadcast, mpsc};
use tracing::debug;

use crate::util::time::Millis;

use super::protocol::OutboundMsg;

const OBSERVER_CAPACITY: usize = 256;

/// A message that was handed to the transport
#[derive(Debug, Clone, PartialEq)]
pub struct SentMessage {
    pub at: Millis,
    pub msg: OutboundMsg,
}

/// Send side of the server connection
#[derive(Debug, Clone)]
pub struct OutboundSink {
    outbound: mpsc::Sender<String>,
    sent_tx: broadcast::Sender<SentMessage>,
}

impl OutboundSink {
    pub fn new(outbound: mpsc::Sender<String>) -> Self {
        let (sent_tx, _) = broadcast::channel(OBSERVER_CAPACITY);
        Self { outbound, sent_tx }
    }

    /// Queue `msg` for the transport without waiting, then notify observers.
    pub fn send(&self, msg: OutboundMsg, at: Millis) -> Result<(), SinkError> {
        self.outbound.try_send(msg.encode()).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => SinkError::Full,
            mpsc::error::TrySendError::Closed(_) => SinkError::Closed,
        })?;

        // No observers is fine
        if self.sent_tx.send(SentMessage { at, msg }).is_err() {
            debug!("Sent message had no observers");
        }
        Ok(())
    }

    /// Observe every message sent from now on. Drop the receiver to detach.
    pub fn subscribe(&self) -> broadcast::Receiver<SentMessage> {
        self.sent_tx.subscribe()
    }

    pub fn observer_count(&self) -> usize {
        self.sent_tx.receiver_count()
    }
}

/// Transport send failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SinkError {
    #[error("Outbound queue is full")]
    Full,

    #[error("Connection closed")]
    Closed,
}
