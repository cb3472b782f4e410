//! WebSocket connection to the sea server
//!
//! Splits the socket into a reader task feeding inbound text frames to the
//! session and a writer task draining the outbound queue.

use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{self, Message};
use tracing::{debug, error, info, warn};

const INBOUND_CAPACITY: usize = 256;
const OUTBOUND_CAPACITY: usize = 64;

/// Channel ends for a live connection
pub struct Connection {
    /// Text frames from the server
    pub inbound: mpsc::Receiver<String>,
    /// Text frames to the server
    pub outbound: mpsc::Sender<String>,
    pub tasks: BridgeTasks,
}

/// Background tasks pumping the socket
pub struct BridgeTasks {
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl BridgeTasks {
    /// Stop reading and wait for queued frames to flush. The writer only
    /// finishes once every outbound sender has been dropped.
    pub async fn finish(self) {
        self.reader.abort();
        if let Err(e) = self.writer.await {
            warn!(error = %e, "Writer task ended abnormally");
        }
    }
}

/// Connection errors
#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    #[error("WebSocket connect failed: {0}")]
    Handshake(#[from] tungstenite::Error),
}

/// Open a WebSocket to `url` and start pumping frames
pub async fn connect(url: &str) -> Result<Connection, ConnectError> {
    let (ws, _response) = tokio_tungstenite::connect_async(url).await?;
    info!(url = %url, "Connected to server");
    Ok(bridge(ws))
}

/// Wire an already-open socket to a pair of channels
pub fn bridge<S>(socket: S) -> Connection
where
    S: Stream<Item = Result<Message, tungstenite::Error>>
        + Sink<Message, Error = tungstenite::Error>
        + Send
        + 'static,
{
    let (mut ws_sink, mut ws_stream) = socket.split();
    let (inbound_tx, inbound) = mpsc::channel(INBOUND_CAPACITY);
    let (outbound, mut outbound_rx) = mpsc::channel::<String>(OUTBOUND_CAPACITY);

    // Writer task: outbound queue -> WebSocket
    let writer = tokio::spawn(async move {
        while let Some(text) = outbound_rx.recv().await {
            if let Err(e) = ws_sink.send(Message::Text(text)).await {
                debug!(error = %e, "WebSocket send failed");
                return;
            }
        }
        debug!("Outbound queue closed, closing socket");
        if let Err(e) = ws_sink.close().await {
            debug!(error = %e, "WebSocket close failed");
        }
    });

    // Reader task: WebSocket -> session
    let reader = tokio::spawn(async move {
        while let Some(result) = ws_stream.next().await {
            match result {
                Ok(Message::Text(text)) => {
                    if inbound_tx.send(text).await.is_err() {
                        debug!("Inbound channel closed");
                        break;
                    }
                }
                Ok(Message::Binary(_)) => {
                    warn!("Received binary message, ignoring");
                }
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) | Ok(Message::Frame(_)) => {}
                Ok(Message::Close(frame)) => {
                    info!(?frame, "Server closed the connection");
                    break;
                }
                Err(e) => {
                    error!(error = %e, "WebSocket error");
                    break;
                }
            }
        }
    });

    Connection {
        inbound,
        outbound,
        tasks: BridgeTasks { reader, writer },
    }
}
