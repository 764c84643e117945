//! Socket protocol message types.
//!
//! # Protocol Overview
//!
//! | Message | Direction | Purpose |
//! |---------|-----------|---------|
//! | [`OutboundFrame`] | Local → Server | Command on a channel |
//! | [`InboundFrame`] | Server → Local | Confirmation, ping or channel message |
//!
//! Inbound frames are republished on the bus under
//! `socket.message.<channel>.<type>.<action>`, skipping absent segments.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `command` | Outbound command names |
//! | `frame` | Frame types and topic derivation |

// ============================================================================
// Submodules
// ============================================================================

/// Outbound command names.
pub mod command;

/// Frame types and derived topics.
pub mod frame;

// ============================================================================
// Re-exports
// ============================================================================

pub use command::Command;
pub use frame::{
    CLOSE_TOPIC, CONFIRM_SUBSCRIPTION, ERROR_TOPIC, InboundFrame, MESSAGE_TOPIC, OPEN_TOPIC,
    OutboundFrame, confirm_topic,
};
