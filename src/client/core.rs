//! Client facade.
//!
//! The [`Client`] owns one event loop and wires the bus, the socket
//! session and the optional remote helper to it.
//!
//! # Example
//!
//! ```no_run
//! use pubsub_cable::{Client, SubscribeOptions};
//! use serde_json::{Value, json};
//!
//! # async fn example() -> pubsub_cable::Result<()> {
//! let client = Client::builder()
//!     .socket_url("wss://example.com/cable")
//!     .build()?;
//! client.spawn_loop()?;
//!
//! client.bus().subscribe(
//!     "socket.message.rooms.said",
//!     |_, data| println!("{data}"),
//!     SubscribeOptions::new(),
//! )?;
//!
//! client.connect()?;
//! client.subscribe_channel("rooms", Value::Null)?;
//! client.message("rooms", json!({"action": "ping"}))?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use serde_json::Value;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::bus::TopicBus;
use crate::error::{Error, Result};
use crate::identifiers::{Identifier, SubscriptionKey};
use crate::protocol::Command;
use crate::remote::Remote;
use crate::runtime::{Deferred, EventLoop, Promise, Resolver, Scheduler};
use crate::session::Session;
use crate::transport::Connector;

use super::builder::ClientBuilder;

// ============================================================================
// Types
// ============================================================================

/// Internal shared state for the client.
pub(crate) struct ClientInner {
    /// The loop, until it is spawned. Empty while a manual run holds it.
    pub event_loop: Mutex<Option<EventLoop>>,
    pub spawned: AtomicBool,
    pub scheduler: Scheduler,
    pub bus: TopicBus,
    pub session: Session,
    pub remote: Option<Remote>,
}

// ============================================================================
// Client
// ============================================================================

/// Entry point tying the bus, the session and remote requests to one loop.
///
/// Cloning yields another handle to the same client.
#[derive(Clone)]
pub struct Client {
    pub(crate) inner: Arc<ClientInner>,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("session", &self.inner.session)
            .field("remote", &self.inner.remote)
            .field("loop_spawned", &self.inner.spawned.load(Ordering::Acquire))
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Client - Construction
// ============================================================================

impl Client {
    /// Creates a configuration builder.
    #[inline]
    #[must_use]
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Wires a validated configuration together.
    pub(crate) fn new(config: ClientBuilder, connector: Arc<dyn Connector>) -> Result<Self> {
        let event_loop = EventLoop::new();
        let scheduler = event_loop.scheduler();
        let bus = TopicBus::with_matching(&scheduler, config.topic_match);

        let session = Session::new(
            bus.clone(),
            connector,
            config.socket_url,
            config.socket_headers,
        );

        let remote = match config.http_client {
            Some(client) => Some(Remote::new(
                bus.clone(),
                client,
                config.api_url.unwrap_or_default(),
                config.api_headers,
            )?),
            None => None,
        };

        debug!(remote = remote.is_some(), "Client created");

        Ok(Self {
            inner: Arc::new(ClientInner {
                event_loop: Mutex::new(Some(event_loop)),
                spawned: AtomicBool::new(false),
                scheduler,
                bus,
                session,
                remote,
            }),
        })
    }
}

// ============================================================================
// Client - Event Loop
// ============================================================================

impl Client {
    /// Runs the event loop on the current tokio runtime.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if the loop was already spawned or is being
    ///   driven by [`Client::run_until_idle`]
    /// - [`Error::Connection`] outside a tokio runtime
    pub fn spawn_loop(&self) -> Result<JoinHandle<()>> {
        let runtime = Handle::try_current()
            .map_err(|e| Error::connection(format!("no tokio runtime: {e}")))?;

        let event_loop = self
            .inner
            .event_loop
            .lock()
            .take()
            .ok_or_else(|| Error::config("event loop already spawned"))?;
        self.inner.spawned.store(true, Ordering::Release);

        info!("Event loop spawned");
        Ok(runtime.spawn(event_loop.run()))
    }

    /// Drives the loop manually until it is idle.
    ///
    /// Returns the number of tasks run; `0` once the loop is spawned or
    /// when called from a task already running on it.
    pub fn run_until_idle(&self) -> usize {
        // The lock is released while tasks run so they can use the client.
        let Some(mut event_loop) = self.inner.event_loop.lock().take() else {
            return 0;
        };

        let ran = event_loop.run_until_idle();
        *self.inner.event_loop.lock() = Some(event_loop);
        ran
    }

    /// Closes the session and stops the loop after its pending tasks.
    pub fn shutdown(&self) {
        self.inner.session.close();
        self.inner.scheduler.shutdown();
        info!("Client shut down");
    }
}

// ============================================================================
// Client - Accessors
// ============================================================================

impl Client {
    /// Returns the loop handle.
    #[inline]
    #[must_use]
    pub fn scheduler(&self) -> &Scheduler {
        &self.inner.scheduler
    }

    /// Returns the topic bus.
    #[inline]
    #[must_use]
    pub fn bus(&self) -> &TopicBus {
        &self.inner.bus
    }

    /// Returns the socket session.
    #[inline]
    #[must_use]
    pub fn session(&self) -> &Session {
        &self.inner.session
    }

    /// Returns the remote helper, if an HTTP client was configured.
    #[inline]
    #[must_use]
    pub fn remote(&self) -> Option<&Remote> {
        self.inner.remote.as_ref()
    }

    /// Creates an unsettled deferred on this client's loop.
    #[must_use]
    pub fn deferred<T, E>(&self) -> Deferred<T, E>
    where
        T: Send + Sync + 'static,
        E: Send + Sync + 'static,
    {
        Deferred::new(&self.inner.scheduler)
    }

    /// Creates a promise whose executor runs on the next tick.
    pub fn promise<T, E, F>(&self, executor: F) -> Promise<T, E>
    where
        T: Send + Sync + 'static,
        E: Send + Sync + 'static,
        F: FnOnce(Resolver<T, E>) + Send + 'static,
    {
        Promise::new(&self.inner.scheduler, executor)
    }
}

// ============================================================================
// Client - Session Shortcuts
// ============================================================================

impl Client {
    /// Opens the socket. See [`Session::connect`].
    pub fn connect(&self) -> Result<()> {
        self.inner.session.connect()
    }

    /// Subscribes a channel. See [`Session::subscribe_channel`].
    pub fn subscribe_channel(&self, channel: &str, data: Value) -> Result<SubscriptionKey> {
        self.inner.session.subscribe_channel(channel, data)
    }

    /// Unsubscribes a channel. See [`Session::unsubscribe_channel`].
    pub fn unsubscribe_channel(&self, channel: &str, data: Value) -> Result<()> {
        self.inner.session.unsubscribe_channel(channel, data)
    }

    /// Sends a `message` command on `channel`.
    pub fn message(&self, channel: &str, data: Value) -> Result<()> {
        self.inner
            .session
            .send(Command::Message, &Identifier::channel(channel), data)
    }

    /// Closes the socket. See [`Session::close`].
    pub fn close(&self) {
        self.inner.session.close();
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::convert::Infallible;

    use crate::bus::SubscribeOptions;
    use crate::runtime::PromiseState;
    use crate::session::ConnectionState;

    #[test]
    fn test_connect_without_socket_url() {
        let client = Client::builder().build().unwrap();
        assert!(client.connect().unwrap_err().is_invalid_argument());
        assert_eq!(client.session().state(), ConnectionState::Closed);
    }

    #[test]
    fn test_remote_requires_http_client() {
        let client = Client::builder()
            .api_url("https://example.com/api/")
            .build()
            .unwrap();
        assert!(client.remote().is_none());
    }

    #[test]
    fn test_promise_runs_on_client_loop() {
        let client = Client::builder().build().unwrap();
        let promise: Promise<u32, Infallible> = client.promise(|resolver| resolver.resolve(7));

        assert!(promise.is_pending());
        assert!(client.run_until_idle() > 0);
        assert_eq!(promise.state(), PromiseState::Fulfilled);
    }

    #[test]
    fn test_spawn_outside_runtime_keeps_loop() {
        let client = Client::builder().build().unwrap();
        assert!(client.spawn_loop().unwrap_err().is_connection_error());

        let promise: Promise<(), Infallible> = client.promise(|resolver| resolver.resolve(()));
        assert!(client.run_until_idle() > 0);
        assert_eq!(promise.state(), PromiseState::Fulfilled);
    }

    #[test]
    fn test_listener_can_use_client_while_loop_runs() {
        let client = Client::builder().build().unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let (c, s) = (client.clone(), Arc::clone(&seen));
        client
            .bus()
            .subscribe(
                "evt",
                move |_, _| {
                    let nested = c.run_until_idle();
                    s.lock().extend([format!("{c:?}"), nested.to_string()]);
                },
                SubscribeOptions::new(),
            )
            .unwrap();

        client.bus().publish("evt", Value::Null);
        assert!(client.run_until_idle() > 0);

        let seen = seen.lock();
        assert!(seen[0].contains("loop_spawned: false"));
        assert_eq!(seen[1], "0");
    }

    #[tokio::test]
    async fn test_spawn_loop_once() {
        let client = Client::builder().build().unwrap();
        let handle = client.spawn_loop().unwrap();
        assert!(matches!(client.spawn_loop(), Err(Error::Config { .. })));
        assert_eq!(client.run_until_idle(), 0);
        assert!(format!("{client:?}").contains("loop_spawned: true"));

        let promise: Promise<&'static str, Infallible> = client.promise(|r| r.resolve("done"));
        assert_eq!(promise.wait().await.unwrap(), Ok("done"));

        client.shutdown();
        handle.await.unwrap();
    }
}
