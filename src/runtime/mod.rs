//! Cooperative scheduling and the promise primitive.
//!
//! | Module | Description |
//! |--------|-------------|
//! | `event_loop` | Task queue, [`Scheduler`] handle and [`EventLoop`] driver |
//! | `promise` | [`Promise`], [`Resolver`] and [`Deferred`] |

// ============================================================================
// Submodules
// ============================================================================

/// Single-threaded task queue.
pub mod event_loop;

/// One-shot settlement with handler accumulation.
pub mod promise;

// ============================================================================
// Re-exports
// ============================================================================

pub use event_loop::{EventLoop, Scheduler};
pub use promise::{Deferred, Promise, PromiseState, Resolver};
