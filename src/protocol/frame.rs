//! Wire frames and the bus topics derived from them.
//!
//! # Outbound
//!
//! ```json
//! { "command": "message", "identifier": "{\"channel\":\"rooms\"}", "data": "{\"action\":\"ping\"}" }
//! ```
//!
//! # Inbound
//!
//! ```json
//! { "identifier": "{\"channel\":\"rooms\"}", "type": "confirm_subscription" }
//! { "identifier": "{\"channel\":\"rooms\"}", "message": { "action": "said", "data": { ... } } }
//! { "type": "ping", "message": 1700000000 }
//! ```

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::identifiers::Identifier;

use super::Command;

// ============================================================================
// Topics
// ============================================================================

/// Published when the transport reports readiness.
pub const OPEN_TOPIC: &str = "socket.open";

/// Published on transport errors.
pub const ERROR_TOPIC: &str = "socket.error";

/// Published when the transport closes.
pub const CLOSE_TOPIC: &str = "socket.close";

/// Root of every inbound frame topic.
pub const MESSAGE_TOPIC: &str = "socket.message";

/// Frame type confirming a channel subscription.
pub const CONFIRM_SUBSCRIPTION: &str = "confirm_subscription";

/// Topic the confirmation for `channel` is published on.
#[must_use]
pub fn confirm_topic(channel: &str) -> String {
    format!("{MESSAGE_TOPIC}.{channel}.{CONFIRM_SUBSCRIPTION}")
}

// ============================================================================
// OutboundFrame
// ============================================================================

/// Frame sent to the server. Identifier and data travel as JSON strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutboundFrame {
    /// Command name.
    pub command: Command,
    /// Serialized [`Identifier`].
    pub identifier: String,
    /// Serialized payload.
    pub data: String,
}

impl OutboundFrame {
    /// Builds a frame, serializing identifier and payload.
    pub fn new(command: Command, identifier: &Identifier, data: &Value) -> Result<Self> {
        Ok(Self {
            command,
            identifier: identifier.to_wire()?,
            data: serde_json::to_string(data)?,
        })
    }

    /// Serializes the whole frame.
    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

// ============================================================================
// InboundFrame
// ============================================================================

/// Frame received from the server.
#[derive(Debug, Clone, Deserialize)]
pub struct InboundFrame {
    /// Channel identifier, usually a JSON string.
    #[serde(default)]
    pub identifier: Option<Value>,

    /// Frame type (`welcome`, `ping`, `confirm_subscription`, ...).
    #[serde(rename = "type", default)]
    pub kind: Option<String>,

    /// Message body.
    #[serde(default)]
    pub message: Option<Value>,

    /// Any other members.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl InboundFrame {
    /// Parses a text frame.
    ///
    /// # Errors
    ///
    /// - [`Error::Json`] if the text is not JSON
    /// - [`Error::Protocol`] if it is JSON but not an object
    pub fn parse(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)?;
        if !value.is_object() {
            return Err(Error::protocol("frame is not a JSON object"));
        }
        Ok(serde_json::from_value(value)?)
    }

    /// Returns the channel named by the identifier.
    ///
    /// `None` if there is no identifier or it does not name a channel.
    #[must_use]
    pub fn channel(&self) -> Option<String> {
        let channel_of = |value: &Value| {
            value
                .get(Identifier::CHANNEL_KEY)
                .and_then(Value::as_str)
                .map(str::to_string)
        };

        match self.identifier.as_ref()? {
            Value::String(raw) => serde_json::from_str::<Value>(raw)
                .ok()
                .as_ref()
                .and_then(channel_of),
            other => channel_of(other),
        }
    }

    /// Returns the action of an action-carrying message.
    #[must_use]
    pub fn action(&self) -> Option<&str> {
        self.message.as_ref()?.get("action")?.as_str()
    }

    /// Derives the bus topic:
    /// `socket.message[.<channel>][.<type>][.<action>]`.
    #[must_use]
    pub fn topic(&self) -> String {
        let mut topic = String::from(MESSAGE_TOPIC);
        let segments = [self.channel(), self.kind.clone(), self.action().map(str::to_string)];

        for segment in segments.into_iter().flatten() {
            topic.push('.');
            topic.push_str(&segment);
        }

        topic
    }

    /// Consumes the frame into the payload listeners receive.
    ///
    /// Action messages are unwrapped to their `data`; other messages are
    /// passed as-is; frames without a message yield the frame's members.
    #[must_use]
    pub fn into_payload(self) -> Value {
        let has_action = self.action().is_some();

        match self.message {
            Some(Value::Object(mut message)) if has_action => {
                message.remove("data").unwrap_or(Value::Null)
            }
            Some(message) => message,
            None => {
                let mut members = self.extra;
                if let Some(identifier) = self.identifier {
                    members.insert("identifier".to_string(), identifier);
                }
                if let Some(kind) = self.kind {
                    members.insert("type".to_string(), Value::String(kind));
                }
                Value::Object(members)
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
