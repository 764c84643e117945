//! Transport abstraction.
//!
//! A [`Connector`] opens a [`Transport`] and reports its lifecycle through
//! a [`TransportSink`]. The sink never calls into the session directly: each
//! event is deferred onto the event loop, whose queue is the single inbound
//! channel the session's dispatch consumes.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use tracing::trace;

use crate::error::Result;
use crate::runtime::Scheduler;

// ============================================================================
// Types
// ============================================================================

/// Request headers sent when opening a transport.
pub type Headers = FxHashMap<String, String>;

/// Callback receiving transport events on the event loop.
type EventHandler = Arc<dyn Fn(TransportEvent) + Send + Sync>;

// ============================================================================
// TransportEvent
// ============================================================================

/// Lifecycle and data events reported by a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Ready to send.
    Open,
    /// Text frame received.
    Message(String),
    /// Transport-level failure. Usually followed by [`TransportEvent::Close`].
    Error(String),
    /// Frames accepted by [`Transport::send`] that never reached the peer,
    /// in send order. Reported before [`TransportEvent::Close`].
    Undelivered(Vec<String>),
    /// Transport closed, locally or remotely.
    Close,
}

// ============================================================================
// Traits
// ============================================================================

/// An open transport handle.
///
/// Implementations must not call back into the session from `send` or
/// `close`; events go through the [`TransportSink`].
pub trait Transport: Send + Sync {
    /// Sends one serialized frame.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`](crate::Error::ConnectionClosed)
    /// if the transport is gone.
    fn send(&self, frame: String) -> Result<()>;

    /// Closes the transport. Idempotent.
    fn close(&self);
}

/// Opens transports.
pub trait Connector: Send + Sync {
    /// Starts opening a transport to `url`.
    ///
    /// Returns as soon as the handle exists; readiness is reported later as
    /// [`TransportEvent::Open`] through `sink`.
    fn open(&self, url: &str, headers: &Headers, sink: TransportSink) -> Result<Box<dyn Transport>>;
}

// ============================================================================
// TransportSink
// ============================================================================

/// Delivers transport events onto the event loop.
#[derive(Clone)]
pub struct TransportSink {
    scheduler: Scheduler,
    handler: EventHandler,
}

impl TransportSink {
    /// Creates a sink that runs `handler` on the loop for every event.
    pub fn new<F>(scheduler: &Scheduler, handler: F) -> Self
    where
        F: Fn(TransportEvent) + Send + Sync + 'static,
    {
        Self {
            scheduler: scheduler.clone(),
            handler: Arc::new(handler),
        }
    }

    /// Queues `event` for dispatch on a later tick.
    pub fn emit(&self, event: TransportEvent) {
        trace!(?event, "Transport event queued");
        let handler = Arc::clone(&self.handler);
        self.scheduler.defer(move || handler(event));
    }
}

impl fmt::Debug for TransportSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportSink").finish_non_exhaustive()
    }
}

// ============================================================================
// Tests
// ============================================================================
