//! Remote request helper.
//!
//! Wraps an [`HttpClient`] with API-prefix resolution, default headers,
//! error-body detection and bus notifications.
//!
//! | Outcome | Promise | Topic |
//! |---------|---------|-------|
//! | response with `data` | fulfilled | `remote.request.success` |
//! | response without `data` | fulfilled | `remote.request.fail` |
//! | response with `errors` | rejected with the response | `remote.request.fail` |
//! | client failure | rejected | `remote.request.fail` |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use regex::Regex;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::bus::TopicBus;
use crate::error::{Error, Result};
use crate::runtime::{Deferred, Promise, Resolver};
use crate::transport::Headers;

use super::encode::{encode_query, is_blank};
use super::request::{HttpRequest, HttpResponse, Method, RemoteError};

// ============================================================================
// Topics
// ============================================================================

/// Published after a request fulfills with a `data` body.
pub const SUCCESS_TOPIC: &str = "remote.request.success";

/// Published after any other settlement.
pub const FAIL_TOPIC: &str = "remote.request.fail";

// ============================================================================
// HttpClient
// ============================================================================

/// Performs HTTP requests.
///
/// Implementations settle `resolver` exactly once, from any thread.
pub trait HttpClient: Send + Sync {
    /// Starts `request` and reports its outcome through `resolver`.
    fn request(&self, request: HttpRequest, resolver: Resolver<HttpResponse, RemoteError>);
}

// ============================================================================
// Remote
// ============================================================================

struct RemoteInner {
    bus: TopicBus,
    client: Arc<dyn HttpClient>,
    api_url: String,
    headers: Headers,
    /// Matches `http(s)://<api host>` at the start of a URL.
    origin: Option<Regex>,
}

/// Request helper bound to one API.
///
/// Cloning yields another handle to the same configuration.
#[derive(Clone)]
pub struct Remote {
    inner: Arc<RemoteInner>,
}

impl fmt::Debug for Remote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Remote")
            .field("api_url", &self.inner.api_url)
            .finish_non_exhaustive()
    }
}

impl Remote {
    /// Creates a helper.
    ///
    /// `api_url` prefixes relative queries; if it is absolute, request URLs
    /// on the same host are reduced to their path.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Regex`] if the host pattern cannot be compiled.
    pub fn new(
        bus: TopicBus,
        client: Arc<dyn HttpClient>,
        api_url: impl Into<String>,
        headers: Headers,
    ) -> Result<Self> {
        let api_url = api_url.into();
        let origin = match host_of(&api_url) {
            Some(host) => Some(Regex::new(&format!("^https?://{}", regex::escape(&host)))?),
            None => None,
        };

        Ok(Self {
            inner: Arc::new(RemoteInner {
                bus,
                client,
                api_url,
                headers,
                origin,
            }),
        })
    }

    /// Returns the API prefix.
    #[inline]
    #[must_use]
    pub fn api_url(&self) -> &str {
        &self.inner.api_url
    }

    /// Sends `request`.
    ///
    /// Default headers are applied under the request's own.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the URL is blank once the
    /// origin is stripped.
    pub fn request(&self, mut request: HttpRequest) -> Result<Promise<HttpResponse, RemoteError>> {
        if let Some(origin) = &self.inner.origin {
            request.url = origin.replace(&request.url, "").into_owned();
        }

        if request.url.trim().is_empty() {
            return Err(Error::invalid_argument("request url must not be blank"));
        }

        let mut headers = self.inner.headers.clone();
        headers.extend(request.headers.drain());
        request.headers = headers;

        let scheduler = self.inner.bus.scheduler();
        let (raw, raw_resolver) = Deferred::new(scheduler).into_parts();
        let (promise, resolver) = Deferred::new(scheduler).into_parts();

        raw.all(move |outcome: std::result::Result<&HttpResponse, &RemoteError>| match outcome {
            Ok(response) if response.has_errors() => {
                resolver.reject(RemoteError::Rejected(response.clone()));
            }
            Ok(response) => resolver.resolve(response.clone()),
            Err(reason) => resolver.reject(reason.clone()),
        });

        let (bus, fail_bus) = (self.inner.bus.clone(), self.inner.bus.clone());
        promise.then(
            move |response: &HttpResponse| {
                let topic = if response.has_data() {
                    SUCCESS_TOPIC
                } else {
                    FAIL_TOPIC
                };
                bus.publish(topic, response.to_value());
            },
            move |reason: &RemoteError| {
                warn!(error = %reason, "Remote request failed");
                fail_bus.publish(FAIL_TOPIC, reason.to_value());
            },
        );

        debug!(method = %request.method, url = %request.url, "Remote request");
        self.inner.client.request(request, raw_resolver);

        Ok(promise)
    }

    /// Sends a `GET` for `query` with `params` in the query string.
    pub fn get(&self, query: &str, params: &Value) -> Result<Promise<HttpResponse, RemoteError>> {
        self.call(Method::Get, query, params)
    }

    /// Sends a `POST` for `query` with `params` in the query string.
    pub fn post(&self, query: &str, params: &Value) -> Result<Promise<HttpResponse, RemoteError>> {
        self.call(Method::Post, query, params)
    }

    /// Sends a `PUT` for `query` with `params` in the query string.
    pub fn put(&self, query: &str, params: &Value) -> Result<Promise<HttpResponse, RemoteError>> {
        self.call(Method::Put, query, params)
    }

    /// Sends a `DELETE` for `query` with `params` in the query string.
    pub fn delete(&self, query: &str, params: &Value) -> Result<Promise<HttpResponse, RemoteError>> {
        self.call(Method::Delete, query, params)
    }

    fn call(
        &self,
        method: Method,
        query: &str,
        params: &Value,
    ) -> Result<Promise<HttpResponse, RemoteError>> {
        self.request(HttpRequest::new(method, self.resolve_url(query, params)))
    }

    /// Prefixes relative queries with the API URL and appends `params`.
    fn resolve_url(&self, query: &str, params: &Value) -> String {
        let mut url = if query.starts_with("http") || query.starts_with('/') {
            query.to_string()
        } else {
            format!("{}{query}", self.inner.api_url)
        };

        if !is_blank(params) {
            url.push('?');
            url.push_str(&encode_query(params));
        }

        url
    }
}

/// `host[:port]` of an absolute URL.
fn host_of(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?;

    Some(match parsed.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    })
}

// ============================================================================
// Tests
// ============================================================================
