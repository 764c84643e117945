//! Transport layer.
//!
//! The session only sees the [`Transport`] and [`Connector`] traits, so the
//! socket implementation is swappable (tests use an in-memory recorder).
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐   send(frame)    ┌──────────────────┐
//! │  Session        │─────────────────►│  Transport       │──► server
//! │                 │                  │  (ws task)       │
//! │  dispatch       │◄── EventLoop ◄───│  TransportSink   │◄── server
//! └─────────────────┘   (deferred)     └──────────────────┘
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `connection` | Traits, events and the sink |
//! | `websocket` | tokio-tungstenite implementation |

// ============================================================================
// Submodules
// ============================================================================

/// Transport traits and event delivery.
pub mod connection;

/// WebSocket connector.
pub mod websocket;

// ============================================================================
// Re-exports
// ============================================================================

pub use connection::{Connector, Headers, Transport, TransportEvent, TransportSink};
pub use websocket::WsConnector;
