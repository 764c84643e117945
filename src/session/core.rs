//! Socket session manager.
//!
//! Owns one logical connection: the transport handle, the connection state,
//! the subscribed-channel set and the outbound queues.
//!
//! # State Machine
//!
//! ```text
//! Closed ──connect()──► Connecting ──Open event──► Open
//!    ▲                      │                        │
//!    └──── Close event / close() ────────────────────┘
//! ```
//!
//! Each channel moves from unsubscribed to subscribed independently, when
//! its `confirm_subscription` frame arrives.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::bus::{SubscribeOptions, TopicBus};
use crate::error::{Error, Result};
use crate::identifiers::{Identifier, SubscriptionKey};
use crate::protocol::{Command, OutboundFrame, confirm_topic};
use crate::runtime::Scheduler;
use crate::transport::{Connector, Headers, Transport, TransportSink};

use super::queue::OutboundQueue;

// ============================================================================
// ConnectionState
// ============================================================================

/// Transport readiness as seen by the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No transport.
    Closed,
    /// Transport opening.
    Connecting,
    /// Transport ready to send.
    Open,
}

// ============================================================================
// Types
// ============================================================================

/// Mutable session state, guarded by one lock.
pub(crate) struct SessionState {
    pub connection: ConnectionState,
    pub transport: Option<Box<dyn Transport>>,
    /// Bumped on every connect and close; events from older transports are
    /// dropped.
    pub generation: u64,
    pub queue: OutboundQueue,
}

/// Shared session internals.
pub(crate) struct SessionInner {
    pub bus: TopicBus,
    pub scheduler: Scheduler,
    pub connector: Arc<dyn Connector>,
    pub url: Option<String>,
    pub headers: Headers,
    pub state: Mutex<SessionState>,
}

// ============================================================================
// Session
// ============================================================================

/// Channel-aware socket session.
///
/// Cloning yields another handle to the same session.
///
/// # Example
///
/// ```ignore
/// session.connect()?;
/// session.subscribe_channel("rooms", Value::Null)?;
/// // Queued until `rooms` is confirmed, then sent.
/// session.send(Command::Message, &Identifier::channel("rooms"), json!({"action": "ping"}))?;
/// ```
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("url", &self.inner.url)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Creates a closed session.
    ///
    /// `url` may be `None`; [`Session::connect`] then fails.
    #[must_use]
    pub fn new(
        bus: TopicBus,
        connector: Arc<dyn Connector>,
        url: Option<String>,
        headers: Headers,
    ) -> Self {
        let scheduler = bus.scheduler().clone();
        Self {
            inner: Arc::new(SessionInner {
                bus,
                scheduler,
                connector,
                url,
                headers,
                state: Mutex::new(SessionState {
                    connection: ConnectionState::Closed,
                    transport: None,
                    generation: 0,
                    queue: OutboundQueue::new(),
                }),
            }),
        }
    }

    /// Returns the bus inbound frames are published on.
    #[inline]
    #[must_use]
    pub fn bus(&self) -> &TopicBus {
        &self.inner.bus
    }

    /// Returns the connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.inner.state.lock().connection
    }

    /// Returns `true` if `channel` has been confirmed.
    #[must_use]
    pub fn is_subscribed(&self, channel: &str) -> bool {
        self.inner.state.lock().queue.is_subscribed(channel)
    }

    /// Returns the confirmed channels, sorted.
    #[must_use]
    pub fn subscribed_channels(&self) -> Vec<String> {
        self.inner.state.lock().queue.subscribed()
    }

    /// Number of frames waiting on `channel`'s confirmation.
    #[must_use]
    pub fn queued(&self, channel: &str) -> usize {
        self.inner.state.lock().queue.queued(channel)
    }

    /// Number of frames waiting on the transport.
    #[must_use]
    pub fn reserved(&self) -> usize {
        self.inner.state.lock().queue.reserved_len()
    }

    /// Opens the transport unless one is already connecting or open.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidArgument`] if no socket URL is configured
    /// - whatever the connector returns if the transport cannot be created
    pub fn connect(&self) -> Result<()> {
        let url = self
            .inner
            .url
            .as_deref()
            .filter(|url| !url.is_empty())
            .ok_or_else(|| Error::invalid_argument("socket url is not configured"))?;

        let mut state = self.inner.state.lock();
        if state.connection != ConnectionState::Closed {
            debug!(state = ?state.connection, "Already connected");
            return Ok(());
        }

        let generation = state.generation + 1;
        let sink = self.sink(generation);
        let transport = self.inner.connector.open(url, &self.inner.headers, sink)?;

        state.generation = generation;
        state.transport = Some(transport);
        state.connection = ConnectionState::Connecting;

        info!(url, generation, "Session connecting");
        Ok(())
    }

    /// Sink that feeds this generation's events to the dispatcher.
    fn sink(&self, generation: u64) -> TransportSink {
        let weak: Weak<SessionInner> = Arc::downgrade(&self.inner);
        TransportSink::new(&self.inner.scheduler, move |event| {
            if let Some(inner) = weak.upgrade() {
                inner.dispatch(generation, event);
            }
        })
    }

    /// Serializes a command and routes it through the outbound queue.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidArgument`] for a non-handshake command whose
    ///   identifier names no channel
    /// - [`Error::Json`] if serialization fails
    pub fn send(
        &self,
        command: impl Into<Command>,
        identifier: &Identifier,
        data: Value,
    ) -> Result<()> {
        let command = command.into();
        let frame = OutboundFrame::new(command.clone(), identifier, &data)?.encode()?;
        self.inner.offer(&command, identifier.channel_name(), frame)
    }

    /// Subscribes `channel` and waits for its confirmation on the bus.
    ///
    /// Once `socket.message.<channel>.confirm_subscription` is published the
    /// channel is marked subscribed and its queued frames are sent.
    pub fn subscribe_channel(&self, channel: &str, data: Value) -> Result<SubscriptionKey> {
        self.send(Command::Subscribe, &Identifier::channel(channel), data)?;

        let weak = Arc::downgrade(&self.inner);
        let name = channel.to_string();
        self.inner.bus.subscribe(
            &confirm_topic(channel),
            move |_, _| {
                if let Some(inner) = weak.upgrade() {
                    inner.confirm_channel(&name);
                }
            },
            SubscribeOptions::new().with_once().with_sync(),
        )
    }

    /// Asks the server to unsubscribe `channel`.
    ///
    /// The channel stays in the local subscribed set.
    pub fn unsubscribe_channel(&self, channel: &str, data: Value) -> Result<()> {
        self.send(Command::Unsubscribe, &Identifier::channel(channel), data)
    }

    /// Closes the transport and discards all session state.
    ///
    /// Bus registrations are kept.
    pub fn close(&self) {
        let transport = {
            let mut state = self.inner.state.lock();
            state.generation += 1;
            state.connection = ConnectionState::Closed;
            state.queue.clear();
            state.transport.take()
        };

        if let Some(transport) = transport {
            transport.close();
        }

        info!("Session closed");
    }
}

// ============================================================================
// SessionInner - Outbound
// ============================================================================

impl SessionInner {
    /// Sends `frame` now or buffers it according to the queueing policy.
    fn offer(&self, command: &Command, channel: Option<&str>, frame: String) -> Result<()> {
        let mut state = self.state.lock();
        let open = state.connection == ConnectionState::Open;

        if let Some(frame) = state.queue.offer(command, channel, frame, open)? {
            Self::write(&mut state, vec![frame]);
        }

        Ok(())
    }

    /// Marks `channel` subscribed and releases its queue.
    pub(crate) fn confirm_channel(&self, channel: &str) {
        let mut state = self.state.lock();
        let frames = state.queue.confirm(channel);
        debug!(channel, released = frames.len(), "Channel confirmed");

        if state.connection == ConnectionState::Open {
            Self::write(&mut state, frames);
        } else {
            state.queue.reserve(frames);
        }
    }

    /// Writes frames in order; on failure the unsent rest goes back to the
    /// head of the reserved queue.
    ///
    /// Frames left reserved by an earlier failure go out ahead of `frames`.
    pub(crate) fn write(state: &mut SessionState, frames: Vec<String>) {
        let Some(transport) = state.transport.as_ref() else {
            state.queue.restore(frames);
            return;
        };

        let mut batch = state.queue.drain_reserved();
        if !batch.is_empty() {
            debug!(retried = batch.len(), "Retrying reserved frames");
        }
        batch.extend(frames);

        let mut frames = batch.into_iter();
        while let Some(frame) = frames.next() {
            if let Err(e) = transport.send(frame.clone()) {
                warn!(error = %e, "Send failed, frames kept for the next open");
                let mut unsent = vec![frame];
                unsent.extend(frames);
                state.queue.restore(unsent);
                return;
            }
        }
    }
}
