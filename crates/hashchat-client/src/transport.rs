//! WebSocket transport for the client.
//!
//! Provides [`ConnectedClient`] which bridges a relay WebSocket to a pair of
//! channels. Every relay payload is a text frame; this layer only moves
//! strings. Protocol logic remains in the Sans-IO [`crate::Client`].

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};

/// Channel depth in each direction.
const CHANNEL_CAPACITY: usize = 64;

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection failed.
    #[error("connection failed: {0}")]
    Connection(String),
}

/// Events from the relay connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Socket is open and ready for the handshake.
    Opened,
    /// Text payload from the relay.
    Message(String),
    /// Socket closed, by either side or on error.
    Closed,
}

/// Handle to a relay connection.
///
/// Payloads are sent and received via the channels; an internal task owns
/// the socket.
pub struct ConnectedClient {
    /// Send text payloads to the relay.
    pub to_server: mpsc::Sender<String>,
    /// Receive events from the relay.
    pub from_server: mpsc::Receiver<TransportEvent>,
    /// Abort handle to stop the connection task.
    abort_handle: tokio::task::AbortHandle,
}

impl ConnectedClient {
    /// Close politely: flush queued payloads, send a close frame, and wait
    /// up to `grace` for the socket to shut. Aborts the task after that.
    pub async fn close(self, grace: Duration) {
        let Self { to_server, mut from_server, abort_handle } = self;
        drop(to_server);

        let drained = tokio::time::timeout(grace, async {
            while let Some(event) = from_server.recv().await {
                if event == TransportEvent::Closed {
                    break;
                }
            }
        })
        .await;

        if drained.is_err() {
            tracing::debug!("close timed out; aborting connection task");
            abort_handle.abort();
        }
    }
}

/// Connect to a relay at a `ws://` or `wss://` URL.
///
/// The first event on `from_server` is always [`TransportEvent::Opened`].
pub async fn connect(url: &str) -> Result<ConnectedClient, TransportError> {
    let (socket, _response) = connect_async(url)
        .await
        .map_err(|e| TransportError::Connection(format!("{url}: {e}")))?;
    tracing::info!(%url, "websocket open");

    let (to_server_tx, to_server_rx) = mpsc::channel::<String>(CHANNEL_CAPACITY);
    let (from_server_tx, from_server_rx) = mpsc::channel::<TransportEvent>(CHANNEL_CAPACITY);

    // Queued before the task starts so it is always observed first
    from_server_tx
        .send(TransportEvent::Opened)
        .await
        .map_err(|e| TransportError::Connection(format!("event channel closed: {e}")))?;

    let handle = tokio::spawn(run_connection(socket, to_server_rx, from_server_tx));

    Ok(ConnectedClient {
        to_server: to_server_tx,
        from_server: from_server_rx,
        abort_handle: handle.abort_handle(),
    })
}

/// Run the connection, bridging between channels and the socket.
async fn run_connection<S>(
    socket: tokio_tungstenite::WebSocketStream<S>,
    mut to_server: mpsc::Receiver<String>,
    from_server: mpsc::Sender<TransportEvent>,
) where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    let (mut sink, mut stream) = socket.split();

    loop {
        tokio::select! {
            outgoing = to_server.recv() => {
                let Some(text) = outgoing else {
                    // Caller dropped the sender; close politely
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                };
                if let Err(e) = sink.send(Message::Text(text)).await {
                    tracing::warn!(error = %e, "websocket send failed");
                    break;
                }
            },
            incoming = stream.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        if from_server.send(TransportEvent::Message(text)).await.is_err() {
                            break;
                        }
                    },
                    Some(Ok(Message::Binary(bytes))) => {
                        tracing::debug!(len = bytes.len(), "ignoring binary frame");
                    },
                    Some(Ok(Message::Close(frame))) => {
                        tracing::info!(?frame, "relay closed connection");
                        break;
                    },
                    Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => {},
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, "websocket read failed");
                        break;
                    },
                    None => break,
                }
            },
        }
    }

    let _ = from_server.send(TransportEvent::Closed).await;
}
