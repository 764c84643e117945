//! Outbound queueing policy.
//!
//! | Command | Channel state | Transport open | Outcome |
//! |---------|---------------|----------------|---------|
//! | `subscribe` / `unsubscribe` | any | yes | send now |
//! | `subscribe` / `unsubscribe` | any | no | reserved queue |
//! | other | subscribed | yes | send now |
//! | other | subscribed | no | reserved queue |
//! | other | not subscribed | any | channel queue |
//!
//! The reserved queue drains when the transport opens; a channel queue
//! drains when that channel's subscription is confirmed.

// ============================================================================
// Imports
// ============================================================================

use std::collections::VecDeque;

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

use crate::error::{Error, Result};
use crate::protocol::Command;

// ============================================================================
// Route
// ============================================================================

/// Where an outbound frame goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Write to the transport now.
    SendNow,
    /// Hold until the transport opens.
    Reserved,
    /// Hold until the named channel is confirmed.
    Channel(String),
}

// ============================================================================
// OutboundQueue
// ============================================================================

/// Subscribed-channel set plus the buffered frames.
#[derive(Debug, Default)]
pub struct OutboundQueue {
    subscribed: FxHashSet<String>,
    reserved: VecDeque<String>,
    channels: FxHashMap<String, VecDeque<String>>,
}

impl OutboundQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Decides where a frame for `command` on `channel` goes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] for a non-handshake command
    /// without a channel.
    pub fn route(&self, command: &Command, channel: Option<&str>, open: bool) -> Result<Route> {
        let ready = command.is_handshake() || channel.is_some_and(|c| self.subscribed.contains(c));

        if ready {
            return Ok(if open { Route::SendNow } else { Route::Reserved });
        }

        let channel = channel.ok_or_else(|| {
            Error::invalid_argument(format!("{command} command needs a channel identifier"))
        })?;
        Ok(Route::Channel(channel.to_string()))
    }

    /// Routes `frame`, buffering it unless it can go out now.
    ///
    /// Returns the frame back if the caller should send it immediately.
    pub fn offer(
        &mut self,
        command: &Command,
        channel: Option<&str>,
        frame: String,
        open: bool,
    ) -> Result<Option<String>> {
        match self.route(command, channel, open)? {
            Route::SendNow => Ok(Some(frame)),
            Route::Reserved => {
                self.reserved.push_back(frame);
                debug!(%command, reserved = self.reserved.len(), "Queued until open");
                Ok(None)
            }
            Route::Channel(name) => {
                let queue = self.channels.entry(name).or_default();
                queue.push_back(frame);
                debug!(%command, channel = ?channel, queued = queue.len(), "Queued until confirmed");
                Ok(None)
            }
        }
    }

    /// Appends frames to the reserved queue.
    pub fn reserve(&mut self, frames: impl IntoIterator<Item = String>) {
        self.reserved.extend(frames);
    }

    /// Puts frames back at the head of the reserved queue, keeping order.
    pub fn restore(&mut self, frames: Vec<String>) {
        for frame in frames.into_iter().rev() {
            self.reserved.push_front(frame);
        }
    }

    /// Takes the reserved queue in FIFO order.
    pub fn drain_reserved(&mut self) -> Vec<String> {
        self.reserved.drain(..).collect()
    }

    /// Marks `channel` subscribed and takes its queue in FIFO order.
    ///
    /// A repeated confirmation returns an empty queue.
    pub fn confirm(&mut self, channel: &str) -> Vec<String> {
        self.subscribed.insert(channel.to_string());
        self.channels
            .remove(channel)
            .map(Vec::from)
            .unwrap_or_default()
    }

    /// Returns `true` if `channel` has been confirmed.
    #[inline]
    #[must_use]
    pub fn is_subscribed(&self, channel: &str) -> bool {
        self.subscribed.contains(channel)
    }

    /// Returns the confirmed channels, sorted.
    #[must_use]
    pub fn subscribed(&self) -> Vec<String> {
        let mut channels: Vec<_> = self.subscribed.iter().cloned().collect();
        channels.sort();
        channels
    }

    /// Number of frames waiting on `channel`'s confirmation.
    #[must_use]
    pub fn queued(&self, channel: &str) -> usize {
        self.channels.get(channel).map_or(0, VecDeque::len)
    }

    /// Number of frames waiting on the transport.
    #[inline]
    #[must_use]
    pub fn reserved_len(&self) -> usize {
        self.reserved.len()
    }

    /// Forgets confirmed channels but keeps every buffered frame.
    pub fn reset_subscriptions(&mut self) {
        self.subscribed.clear();
    }

    /// Forgets everything.
    pub fn clear(&mut self) {
        self.subscribed.clear();
        self.reserved.clear();
        self.channels.clear();
    }
}

// ============================================================================
// Tests
// ============================================================================
