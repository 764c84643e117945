//! Builder pattern for client configuration.
//!
//! # Example
//!
//! ```no_run
//! use pubsub_cable::Client;
//!
//! # fn example() -> pubsub_cable::Result<()> {
//! let client = Client::builder()
//!     .socket_url("wss://example.com/cable")
//!     .socket_header("Authorization", "Bearer token")
//!     .build()?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use url::Url;

use crate::bus::TopicMatch;
use crate::error::{Error, Result};
use crate::remote::HttpClient;
use crate::transport::{Connector, Headers, WsConnector};

use super::core::Client;

// ============================================================================
// ClientBuilder
// ============================================================================

/// Builder for configuring a [`Client`].
///
/// Use [`Client::builder()`] to create a new builder.
#[derive(Clone, Default)]
pub struct ClientBuilder {
    /// WebSocket endpoint.
    pub(crate) socket_url: Option<String>,
    /// Headers sent with the socket handshake.
    pub(crate) socket_headers: Headers,
    /// Prefix for relative remote queries.
    pub(crate) api_url: Option<String>,
    /// Default headers for remote requests.
    pub(crate) api_headers: Headers,
    /// Topic matching mode of the bus.
    pub(crate) topic_match: TopicMatch,
    /// HTTP stack for remote requests.
    pub(crate) http_client: Option<Arc<dyn HttpClient>>,
    /// Transport factory; WebSocket when unset.
    pub(crate) connector: Option<Arc<dyn Connector>>,
}

impl fmt::Debug for ClientBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientBuilder")
            .field("socket_url", &self.socket_url)
            .field("api_url", &self.api_url)
            .field("topic_match", &self.topic_match)
            .field("http_client", &self.http_client.is_some())
            .field("connector", &self.connector.is_some())
            .finish()
    }
}

// ============================================================================
// ClientBuilder Implementation
// ============================================================================

impl ClientBuilder {
    /// Creates a builder with no configuration.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the WebSocket endpoint (`ws://` or `wss://`).
    #[inline]
    #[must_use]
    pub fn socket_url(mut self, url: impl Into<String>) -> Self {
        self.socket_url = Some(url.into());
        self
    }

    /// Adds a header to the socket handshake.
    #[inline]
    #[must_use]
    pub fn socket_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.socket_headers.insert(name.into(), value.into());
        self
    }

    /// Sets the prefix for relative remote queries (`http://` or `https://`).
    #[inline]
    #[must_use]
    pub fn api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = Some(url.into());
        self
    }

    /// Adds a default header to every remote request.
    #[inline]
    #[must_use]
    pub fn api_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.api_headers.insert(name.into(), value.into());
        self
    }

    /// Sets how the bus matches topics.
    #[inline]
    #[must_use]
    pub fn topic_match(mut self, matching: TopicMatch) -> Self {
        self.topic_match = matching;
        self
    }

    /// Enables remote requests through `client`.
    #[inline]
    #[must_use]
    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Replaces the WebSocket transport.
    #[inline]
    #[must_use]
    pub fn connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Builds the client with validation.
    ///
    /// # Errors
    ///
    /// - [`Error::Url`] if a URL does not parse
    /// - [`Error::Config`] if a URL has the wrong scheme
    pub fn build(mut self) -> Result<Client> {
        if let Some(url) = &self.socket_url {
            validate_url(url, &["ws", "wss"])?;
        }
        if let Some(url) = &self.api_url {
            validate_url(url, &["http", "https"])?;
        }

        let connector = self
            .connector
            .take()
            .unwrap_or_else(|| Arc::new(WsConnector::new()) as Arc<dyn Connector>);

        Client::new(self, connector)
    }
}

// ============================================================================
// Validation
// ============================================================================

/// Checks that `url` parses and uses one of `schemes`.
fn validate_url(url: &str, schemes: &[&str]) -> Result<()> {
    let parsed = Url::parse(url)?;

    if !schemes.contains(&parsed.scheme()) {
        return Err(Error::config(format!(
            "URL {url} must use one of: {}",
            schemes.join(", ")
        )));
    }

    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
