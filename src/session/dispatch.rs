//! Inbound event dispatch.
//!
//! Runs on the event loop for every [`TransportEvent`] and turns it into a
//! state change plus a bus publication.
//!
//! | Event | State change | Topic |
//! |-------|--------------|-------|
//! | `Open` | `Open`, reserved queue flushed | `socket.open` |
//! | `Message` | none | derived from the frame |
//! | `Error` | none | `socket.error` |
//! | `Undelivered` | frames back at the head of the reserved queue | none |
//! | `Close` | `Closed`, subscribed set cleared | `socket.close` |

// ============================================================================
// Imports
// ============================================================================

use serde_json::{Value, json};
use tracing::{debug, info, trace, warn};

use crate::protocol::{CLOSE_TOPIC, ERROR_TOPIC, InboundFrame, OPEN_TOPIC};
use crate::transport::TransportEvent;

use super::core::{ConnectionState, SessionInner};

// ============================================================================
// Dispatch
// ============================================================================

impl SessionInner {
    /// Handles one transport event from connection `generation`.
    ///
    /// Events from a superseded connection are dropped.
    pub(crate) fn dispatch(&self, generation: u64, event: TransportEvent) {
        if self.state.lock().generation != generation {
            trace!(generation, ?event, "Stale transport event dropped");
            return;
        }

        match event {
            TransportEvent::Open => self.on_open(),
            TransportEvent::Message(text) => self.on_message(&text),
            TransportEvent::Error(message) => self.on_error(message),
            TransportEvent::Undelivered(frames) => self.on_undelivered(frames),
            TransportEvent::Close => self.on_close(),
        }
    }

    fn on_open(&self) {
        {
            let mut state = self.state.lock();
            state.connection = ConnectionState::Open;
            let frames = state.queue.drain_reserved();
            info!(flushed = frames.len(), "Session open");
            Self::write(&mut state, frames);
        }

        self.bus.publish(OPEN_TOPIC, Value::Null);
    }

    fn on_message(&self, text: &str) {
        let frame = match InboundFrame::parse(text) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, len = text.len(), "Undecodable frame dropped");
                return;
            }
        };

        let topic = frame.topic();
        trace!(%topic, "Frame received");
        self.bus.publish(&topic, frame.into_payload());
    }

    fn on_error(&self, message: String) {
        warn!(%message, "Transport error");
        self.bus.publish(ERROR_TOPIC, json!({ "message": message }));
    }

    fn on_undelivered(&self, frames: Vec<String>) {
        warn!(count = frames.len(), "Undelivered frames kept for the next open");
        self.state.lock().queue.restore(frames);
    }

    fn on_close(&self) {
        {
            let mut state = self.state.lock();
            state.connection = ConnectionState::Closed;
            state.transport = None;
            state.queue.reset_subscriptions();
            debug!(
                reserved = state.queue.reserved_len(),
                "Transport closed, buffered frames kept"
            );
        }

        info!("Session closed by transport");
        self.bus.publish(CLOSE_TOPIC, Value::Null);
    }
}
