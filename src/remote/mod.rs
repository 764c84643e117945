//! Remote HTTP requests.
//!
//! The HTTP stack is supplied by the caller as an [`HttpClient`]; this
//! module adds URL resolution, default headers and bus notifications.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `core` | [`Remote`] and the [`HttpClient`] trait |
//! | `encode` | Query-string encoding |
//! | `request` | Request, response and error types |

// ============================================================================
// Submodules
// ============================================================================

/// Request helper and client trait.
pub mod core;

/// Query-string encoding.
pub mod encode;

/// Request and response types.
pub mod request;

// ============================================================================
// Re-exports
// ============================================================================

pub use self::core::{FAIL_TOPIC, HttpClient, Remote, SUCCESS_TOPIC};
pub use encode::{encode_query, is_blank};
pub use request::{HttpRequest, HttpResponse, Method, RemoteError};
