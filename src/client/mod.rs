//! Client entry point.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Client`] | Owns the loop, bus, session and remote helper |
//! | [`ClientBuilder`] | Fluent configuration builder |

// ============================================================================
// Submodules
// ============================================================================

/// Fluent builder for client configuration.
pub mod builder;

/// Client implementation.
pub mod core;

// ============================================================================
// Re-exports
// ============================================================================

pub use self::core::Client;
pub use builder::ClientBuilder;
