//! Topic matching and subscription options.

// ============================================================================
// TopicMatch
// ============================================================================

/// How a query topic selects registered topics.
///
/// Applies to both `publish` and `unsubscribe`. A query always selects
/// registrations that are at or *below* it, so publishing `socket.message`
/// reaches listeners on `socket.message.rooms.ping`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TopicMatch {
    /// Registration `r` matches query `q` if `r == q` or `r` starts with
    /// `q` followed by a dot. `"foo"` does not reach `"foobar"`.
    #[default]
    Namespace,
    /// Raw string prefix. `"foo"` reaches `"foobar"`.
    Literal,
}

impl TopicMatch {
    /// Returns `true` if a registration on `registered` is selected by
    /// `query`.
    #[must_use]
    pub fn matches(self, registered: &str, query: &str) -> bool {
        match self {
            Self::Literal => registered.starts_with(query),
            Self::Namespace => match registered.strip_prefix(query) {
                Some(rest) => rest.is_empty() || rest.starts_with('.'),
                None => false,
            },
        }
    }
}

// ============================================================================
// SubscribeOptions
// ============================================================================

/// Delivery options for one registration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubscribeOptions {
    /// Remove the registration after its first delivery.
    pub once: bool,
    /// Deliver inside the `publish` call instead of on the next tick.
    pub sync: bool,
}

impl SubscribeOptions {
    /// Creates options with both flags off.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            once: false,
            sync: false,
        }
    }

    /// Sets the `once` flag.
    #[inline]
    #[must_use]
    pub const fn with_once(mut self) -> Self {
        self.once = true;
        self
    }

    /// Sets the `sync` flag.
    #[inline]
    #[must_use]
    pub const fn with_sync(mut self) -> Self {
        self.sync = true;
        self
    }
}

// ============================================================================
// Tests
// ============================================================================
