//! HTTP request and response types exchanged with an [`HttpClient`].
//!
//! [`HttpClient`]: super::HttpClient

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serde::Serialize;
use serde_json::{Value, json};
use thiserror::Error;

use crate::transport::Headers;

// ============================================================================
// Method
// ============================================================================

/// HTTP method.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    /// `GET`
    #[default]
    Get,
    /// `POST`
    Post,
    /// `PUT`
    Put,
    /// `DELETE`
    Delete,
}

impl Method {
    /// Returns the method name.
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// HttpRequest
// ============================================================================

/// Outgoing request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpRequest {
    /// Request method.
    pub method: Method,
    /// Absolute URL or path.
    pub url: String,
    /// Request headers.
    pub headers: Headers,
}

impl HttpRequest {
    /// Creates a request without headers.
    #[must_use]
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Headers::default(),
        }
    }

    /// Creates a `GET` request.
    #[inline]
    #[must_use]
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::Get, url)
    }

    /// Adds a header, replacing any previous value.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

// ============================================================================
// HttpResponse
// ============================================================================

/// Completed response with a JSON body.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HttpResponse {
    /// Status code.
    pub status: u16,
    /// Response headers.
    pub headers: Headers,
    /// Decoded body.
    pub body: Value,
}

impl HttpResponse {
    /// Creates a response with no headers.
    #[must_use]
    pub fn new(status: u16, body: Value) -> Self {
        Self {
            status,
            headers: Headers::default(),
            body,
        }
    }

    /// Returns `true` if the body reports application errors.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.body.get("errors").is_some_and(|errors| !errors.is_null())
    }

    /// Returns `true` if the body carries a `data` member.
    #[must_use]
    pub fn has_data(&self) -> bool {
        self.body.get("data").is_some_and(|data| !data.is_null())
    }

    /// Serializes the response for publication on the bus.
    #[must_use]
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

// ============================================================================
// RemoteError
// ============================================================================

/// Reason a remote request was rejected.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RemoteError {
    /// The server answered with an `errors` body. Carries the response as-is.
    #[error("Request rejected with status {}", .0.status)]
    Rejected(HttpResponse),

    /// The client could not complete the request.
    #[error("Request failed: {message}")]
    Failed {
        /// Description of the failure.
        message: String,
    },
}

impl RemoteError {
    /// Creates a [`RemoteError::Failed`].
    #[inline]
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }

    /// Returns the response, if the server produced one.
    #[must_use]
    pub fn response(&self) -> Option<&HttpResponse> {
        match self {
            Self::Rejected(response) => Some(response),
            Self::Failed { .. } => None,
        }
    }

    /// Serializes the failure for publication on the bus.
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Self::Rejected(response) => response.to_value(),
            Self::Failed { message } => json!({ "message": message }),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
