//! Type-safe identifiers.
//!
//! | Type | Identifies |
//! |------|------------|
//! | [`SubscriptionKey`] | One listener registration on the topic bus |
//! | [`Identifier`] | A channel subscription on the socket session |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::error::{Error, Result};

// ============================================================================
// SubscriptionKey
// ============================================================================

/// Unique key of a topic bus registration.
///
/// Tagged with the topic and a per-bus sequence number, so repeated
/// subscriptions to the same topic stay distinguishable. The sequence also
/// records subscription order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionKey {
    topic: Arc<str>,
    sequence: u64,
}

impl SubscriptionKey {
    #[inline]
    pub(crate) fn new(topic: Arc<str>, sequence: u64) -> Self {
        Self { topic, sequence }
    }

    /// Returns the topic this registration listens on.
    #[inline]
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Returns the sequence number.
    #[inline]
    #[must_use]
    pub const fn sequence(&self) -> u64 {
        self.sequence
    }
}

impl fmt::Display for SubscriptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, ".{}.{}", self.topic, self.sequence)
    }
}

// ============================================================================
// Identifier
// ============================================================================

/// Channel identifier carried by every outbound socket command.
///
/// Serialized as a JSON string inside the frame, e.g.
/// `"{\"channel\":\"rooms\"}"`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identifier(Map<String, Value>);

impl Identifier {
    /// Key holding the channel name.
    pub const CHANNEL_KEY: &'static str = "channel";

    /// Creates an identifier for a channel.
    #[must_use]
    pub fn channel(name: impl Into<String>) -> Self {
        let mut map = Map::new();
        map.insert(Self::CHANNEL_KEY.to_string(), Value::String(name.into()));
        Self(map)
    }

    /// Adds an extra identifying parameter.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Returns the channel name, if any.
    #[inline]
    #[must_use]
    pub fn channel_name(&self) -> Option<&str> {
        self.0.get(Self::CHANNEL_KEY).and_then(Value::as_str)
    }

    /// Serializes the identifier to its wire string.
    pub fn to_wire(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.0)?)
    }
}

impl TryFrom<Value> for Identifier {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(Error::invalid_argument(format!(
                "identifier must be a JSON object, got {other}"
            ))),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
