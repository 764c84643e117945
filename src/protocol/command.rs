//! Outbound command names.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serde::{Serialize, Serializer};

// ============================================================================
// Command
// ============================================================================

/// Command carried by an outbound frame.
///
/// `subscribe` and `unsubscribe` are handshake commands: they bypass the
/// per-channel queue and only wait for the transport to open.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Command {
    /// Ask the server to subscribe the identifier's channel.
    Subscribe,
    /// Ask the server to drop the identifier's channel.
    Unsubscribe,
    /// Ordinary channel message.
    Message,
    /// Any other command name.
    Custom(String),
}

impl Command {
    /// Returns the wire name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Subscribe => "subscribe",
            Self::Unsubscribe => "unsubscribe",
            Self::Message => "message",
            Self::Custom(name) => name,
        }
    }

    /// Returns `true` for `subscribe` and `unsubscribe`.
    #[inline]
    #[must_use]
    pub fn is_handshake(&self) -> bool {
        matches!(self, Self::Subscribe | Self::Unsubscribe)
    }
}

impl From<&str> for Command {
    fn from(name: &str) -> Self {
        match name {
            "subscribe" => Self::Subscribe,
            "unsubscribe" => Self::Unsubscribe,
            "message" => Self::Message,
            other => Self::Custom(other.to_string()),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Command {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

// ============================================================================
// Tests
// ============================================================================
