//! Pubsub Cable - promise primitive, topic bus and channel-aware socket
//! session.
//!
//! This library pairs a cooperative event loop with a topic-based
//! publish/subscribe bus and a WebSocket session that speaks an
//! ActionCable-style channel protocol.
//!
//! # Architecture
//!
//! Everything runs on one logical loop:
//!
//! - **Promises** settle once and flush their handlers on a later tick
//! - **Bus** delivers sync listeners inline and async ones on the next tick
//! - **Session** queues outbound frames until the socket is open and the
//!   target channel is confirmed
//! - **Transport** events are deferred onto the loop, then republished as
//!   `socket.*` topics
//!
//! # Quick Start
//!
//! ```no_run
//! use pubsub_cable::{Client, Result, SubscribeOptions};
//! use serde_json::{Value, json};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let client = Client::builder()
//!         .socket_url("wss://example.com/cable")
//!         .build()?;
//!     client.spawn_loop()?;
//!
//!     client.bus().subscribe(
//!         "socket.message.rooms.said",
//!         |topic, data| println!("{topic}: {data}"),
//!         SubscribeOptions::new(),
//!     )?;
//!
//!     client.connect()?;
//!     client.subscribe_channel("rooms", Value::Null)?;
//!
//!     // Sent once `rooms` is confirmed.
//!     client.message("rooms", json!({"action": "ping"}))?;
//!
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`bus`] | Topic bus: [`TopicBus`], [`SubscribeOptions`], [`TopicMatch`] |
//! | [`client`] | Entry point: [`Client`], [`ClientBuilder`] |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | [`SubscriptionKey`] and channel [`Identifier`] |
//! | [`protocol`] | Wire frames and derived topics |
//! | [`remote`] | HTTP request helper |
//! | [`runtime`] | [`EventLoop`], [`Promise`], [`Deferred`] |
//! | [`session`] | [`Session`] and the outbound queueing policy |
//! | [`transport`] | Transport traits and the WebSocket connector |

// ============================================================================
// Modules
// ============================================================================

/// Topic-based publish/subscribe.
pub mod bus;

/// Client factory and configuration.
///
/// Use [`Client::builder()`] to create a configured client.
pub mod client;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Bus registration keys and channel identifiers.
pub mod identifiers;

/// Socket frame types.
pub mod protocol;

/// Remote HTTP requests.
pub mod remote;

/// Event loop and promise primitive.
pub mod runtime;

/// Channel-aware socket session.
pub mod session;

/// Transport layer.
///
/// Traits the session talks to plus a tokio-tungstenite implementation.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Bus types
pub use bus::{Listener, SubscribeOptions, TopicBus, TopicMatch};

// Client types
pub use client::{Client, ClientBuilder};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{Identifier, SubscriptionKey};

// Protocol types
pub use protocol::{Command, InboundFrame, OutboundFrame};

// Remote types
pub use remote::{HttpClient, HttpRequest, HttpResponse, Method, Remote, RemoteError};

// Runtime types
pub use runtime::{Deferred, EventLoop, Promise, PromiseState, Resolver, Scheduler};

// Session types
pub use session::{ConnectionState, Session};

// Transport types
pub use transport::{Connector, Headers, Transport, TransportEvent, TransportSink, WsConnector};
