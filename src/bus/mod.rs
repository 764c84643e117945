//! Topic-based publish/subscribe.
//!
//! # Delivery
//!
//! | Option | Effect |
//! |--------|--------|
//! | `sync` | Listener runs inside `publish`, before it returns |
//! | (none) | Listener runs on the next tick, batched with the other async ones |
//! | `once` | Registration is dropped before the first delivery runs |
//!
//! Topics are dot-delimited. A publish or unsubscribe on `a` also selects
//! registrations on `a.b`; see [`TopicMatch`] for the exact rule.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `core` | [`TopicBus`] |
//! | `topic` | [`TopicMatch`] and [`SubscribeOptions`] |

// ============================================================================
// Submodules
// ============================================================================

/// Bus implementation.
pub mod core;

/// Matching rules and options.
pub mod topic;

// ============================================================================
// Re-exports
// ============================================================================

pub use self::core::{Listener, TopicBus};
pub use topic::{SubscribeOptions, TopicMatch};
