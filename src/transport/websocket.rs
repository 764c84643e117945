//! WebSocket transport over tokio-tungstenite.
//!
//! # Connection Task
//!
//! [`WsConnector::open`] spawns one tokio task per connection that:
//!
//! - performs the client handshake
//! - forwards text frames from the server to the sink
//! - writes frames queued by [`Transport::send`]
//! - hands frames it could not write back as `Undelivered`
//! - emits `Close` exactly once when it exits, whatever the cause

// ============================================================================
// Imports
// ============================================================================

use futures_util::{SinkExt, StreamExt};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::{HeaderName, HeaderValue};
use tracing::{debug, error, info, trace, warn};

use crate::error::{Error, Result};

use super::connection::{Connector, Headers, Transport, TransportEvent, TransportSink};

// ============================================================================
// WsCommand
// ============================================================================

/// Internal commands for the connection task.
enum WsCommand {
    /// Write a text frame.
    Send(String),
    /// Close the socket and stop.
    Shutdown,
}

// ============================================================================
// WsConnector
// ============================================================================

/// Opens WebSocket transports on the current tokio runtime.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

impl WsConnector {
    /// Creates a connector.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Builds the handshake request with extra headers.
    fn build_request(url: &str, headers: &Headers) -> Result<Request> {
        let mut request = url.into_client_request()?;

        for (name, value) in headers {
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| Error::invalid_argument(format!("header name {name:?}: {e}")))?;
            let header_value = HeaderValue::from_str(value)
                .map_err(|e| Error::invalid_argument(format!("header {name:?} value: {e}")))?;
            request.headers_mut().insert(header_name, header_value);
        }

        Ok(request)
    }
}

impl Connector for WsConnector {
    fn open(&self, url: &str, headers: &Headers, sink: TransportSink) -> Result<Box<dyn Transport>> {
        let runtime = Handle::try_current()
            .map_err(|e| Error::connection(format!("no tokio runtime: {e}")))?;
        let request = Self::build_request(url, headers)?;
        let (command_tx, command_rx) = mpsc::unbounded_channel();

        debug!(url, "Opening WebSocket");
        runtime.spawn(run_connection(request, command_rx, sink));

        Ok(Box::new(WsTransport { command_tx }))
    }
}

// ============================================================================
// WsTransport
// ============================================================================

/// Handle to a running connection task.
struct WsTransport {
    command_tx: mpsc::UnboundedSender<WsCommand>,
}

impl Transport for WsTransport {
    fn send(&self, frame: String) -> Result<()> {
        self.command_tx
            .send(WsCommand::Send(frame))
            .map_err(|_| Error::ConnectionClosed)
    }

    fn close(&self) {
        let _ = self.command_tx.send(WsCommand::Shutdown);
    }
}

// ============================================================================
// Connection Task
// ============================================================================

/// Connects, then pumps frames both ways until either side stops.
async fn run_connection(
    request: Request,
    mut command_rx: mpsc::UnboundedReceiver<WsCommand>,
    sink: TransportSink,
) {
    let ws_stream = match connect_async(request).await {
        Ok((stream, _response)) => stream,
        Err(e) => {
            warn!(error = %e, "WebSocket handshake failed");
            sink.emit(TransportEvent::Error(e.to_string()));
            finish(&sink, undelivered(&mut command_rx, Vec::new()));
            return;
        }
    };

    info!("WebSocket connection established");
    sink.emit(TransportEvent::Open);

    let (mut ws_write, mut ws_read) = ws_stream.split();
    let mut failed = Vec::new();

    loop {
        tokio::select! {
            // Incoming frames from the server
            message = ws_read.next() => {
                match message {
                    Some(Ok(Message::Text(text))) => {
                        trace!(len = text.len(), "Frame received");
                        sink.emit(TransportEvent::Message(text.as_str().to_owned()));
                    }

                    Some(Ok(Message::Close(_))) => {
                        debug!("WebSocket closed by remote");
                        break;
                    }

                    Some(Err(e)) => {
                        error!(error = %e, "WebSocket error");
                        sink.emit(TransportEvent::Error(e.to_string()));
                        break;
                    }

                    None => {
                        debug!("WebSocket stream ended");
                        break;
                    }

                    // Ignore Binary, Ping, Pong
                    _ => {}
                }
            }

            // Frames queued by the session
            command = command_rx.recv() => {
                match command {
                    Some(WsCommand::Send(frame)) => {
                        if let Err(e) = ws_write.send(Message::Text(frame.clone().into())).await {
                            warn!(error = %e, "Failed to send frame");
                            failed.push(frame);
                            sink.emit(TransportEvent::Error(e.to_string()));
                            break;
                        }
                        trace!("Frame sent");
                    }

                    Some(WsCommand::Shutdown) | None => {
                        debug!("Shutdown requested");
                        let _ = ws_write.close().await;
                        break;
                    }
                }
            }
        }
    }

    finish(&sink, undelivered(&mut command_rx, failed));
    debug!("Connection task terminated");
}

/// Closes the command channel and collects every frame still queued on it,
/// after `failed`.
fn undelivered(
    command_rx: &mut mpsc::UnboundedReceiver<WsCommand>,
    failed: Vec<String>,
) -> Vec<String> {
    command_rx.close();

    let mut frames = failed;
    while let Ok(command) = command_rx.try_recv() {
        if let WsCommand::Send(frame) = command {
            frames.push(frame);
        }
    }
    frames
}

/// Reports undelivered frames, then the close.
fn finish(sink: &TransportSink, frames: Vec<String>) {
    if !frames.is_empty() {
        warn!(count = frames.len(), "Frames left undelivered");
        sink.emit(TransportEvent::Undelivered(frames));
    }
    sink.emit(TransportEvent::Close);
}

// ============================================================================
// Tests
// ============================================================================
