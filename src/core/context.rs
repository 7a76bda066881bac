//! Request-scoped context threaded through the interceptor chain.

use std::any::Any;
use std::collections::HashMap;
use std::net::IpAddr;
use std::time::{Duration, Instant};

use http::HeaderMap;
use opentelemetry::trace::{SpanRef, TraceContextExt};
use opentelemetry::Context as OtelContext;

use super::Error;
use crate::observability::Telemetry;

/// HTTP version as static string (no allocation).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HttpVersion(&'static str);

impl HttpVersion {
    pub const HTTP_10: Self = Self("HTTP/1.0");
    pub const HTTP_11: Self = Self("HTTP/1.1");
    pub const HTTP_20: Self = Self("HTTP/2.0");

    /// Get the version string.
    #[inline]
    pub const fn as_str(&self) -> &'static str {
        self.0
    }

    /// Create from http::Version.
    #[inline]
    pub fn from_http(version: http::Version) -> Self {
        match version {
            http::Version::HTTP_10 => Self::HTTP_10,
            http::Version::HTTP_2 => Self::HTTP_20,
            _ => Self::HTTP_11,
        }
    }
}

impl std::fmt::Display for HttpVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0)
    }
}

impl Default for HttpVersion {
    fn default() -> Self {
        Self::HTTP_11
    }
}

/// Matched route for a request.
#[derive(Clone, Debug, Default)]
pub struct RouteMatch {
    /// Route pattern as registered, e.g. `/api/championships/{id}`.
    pub pattern: String,
    /// Captured path parameters.
    pub params: HashMap<String, String>,
}

/// Request context shared across interceptors and handlers.
///
/// Carries request-scoped data through the chain:
/// - Client information and timing
/// - The active trace span and its identifiers
/// - The matched route and path parameters
/// - Custom key-value storage for interceptor communication
pub struct Context {
    /// Client IP address.
    pub client_ip: IpAddr,

    /// W3C Trace ID (32 hex chars), empty until a span is attached.
    pub trace_id: String,

    /// Span ID (16 hex chars), empty until a span is attached.
    pub span_id: String,

    /// Parent span ID (if propagated from upstream).
    pub parent_span_id: Option<String>,

    /// Short request ID for logging.
    pub request_id: String,

    /// Request start time.
    pub started_at: Instant,

    /// HTTP version (no allocation, Copy).
    pub http_version: HttpVersion,

    route: Option<RouteMatch>,

    otel: OtelContext,

    span_error_recorded: bool,

    rejection: Option<Error>,

    /// Custom key-value storage for interceptors.
    values: HashMap<String, Box<dyn Any + Send + Sync>>,
}

impl Context {
    /// Create a new context for a request from `client_ip`.
    #[inline]
    pub fn new(client_ip: IpAddr) -> Self {
        Self {
            client_ip,
            trace_id: String::new(),
            span_id: String::new(),
            parent_span_id: None,
            request_id: "-".to_string(),
            started_at: Instant::now(),
            http_version: HttpVersion::HTTP_11,
            route: None,
            otel: OtelContext::new(),
            span_error_recorded: false,
            rejection: None,
            values: HashMap::new(),
        }
    }

    /// Set the HTTP version.
    #[inline]
    pub fn with_http_version(mut self, version: HttpVersion) -> Self {
        self.http_version = version;
        self
    }

    /// Make `cx` the active trace context of this request.
    ///
    /// Trace and span identifiers are copied out of the span so log records
    /// can be correlated without touching the span again.
    pub fn attach_span(&mut self, cx: OtelContext, parent_span_id: Option<String>) {
        {
            let span = cx.span();
            let sc = span.span_context();
            if sc.is_valid() {
                self.trace_id = sc.trace_id().to_string();
                self.span_id = sc.span_id().to_string();
                self.request_id = make_request_id(&self.trace_id, &self.span_id);
            }
        }
        self.parent_span_id = parent_span_id;
        self.otel = cx;
    }

    /// The active trace context (empty when tracing is not in the chain).
    #[inline]
    pub fn otel_context(&self) -> &OtelContext {
        &self.otel
    }

    /// The active span, a no-op span when none is attached.
    #[inline]
    pub fn span(&self) -> SpanRef<'_> {
        self.otel.span()
    }

    /// Whether a handler error has been recorded on the active span.
    #[inline]
    pub fn span_error_recorded(&self) -> bool {
        self.span_error_recorded
    }

    /// Mark the active span as carrying a recorded error.
    #[inline]
    pub fn mark_span_error(&mut self) {
        self.span_error_recorded = true;
    }

    /// Fail the request before it reaches a handler.
    ///
    /// The chain still runs, so the request is logged and traced; the
    /// endpoint answers with `err` instead of dispatching.
    pub fn reject(&mut self, err: Error) {
        self.rejection = Some(err);
    }

    /// Take the pending rejection, if any.
    #[inline]
    pub fn take_rejection(&mut self) -> Option<Error> {
        self.rejection.take()
    }

    /// Propagation headers for an outbound call made on behalf of this request.
    pub fn outbound_headers(&self, telemetry: &Telemetry) -> HeaderMap {
        let mut headers = HeaderMap::new();
        telemetry.inject(&self.otel, &mut headers);
        headers
    }

    /// Record the matched route.
    #[inline]
    pub fn set_route(&mut self, route: RouteMatch) {
        self.route = Some(route);
    }

    /// Matched route pattern, if any.
    #[inline]
    pub fn route(&self) -> Option<&str> {
        self.route.as_ref().map(|r| r.pattern.as_str())
    }

    /// Get a captured path parameter.
    #[inline]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.route
            .as_ref()
            .and_then(|r| r.params.get(name))
            .map(|v| v.as_str())
    }

    /// Set a custom value.
    #[inline]
    pub fn set<T: Send + Sync + 'static>(&mut self, key: &str, value: T) {
        self.values.insert(key.to_string(), Box::new(value));
    }

    /// Get a custom value.
    #[inline]
    pub fn get<T: 'static>(&self, key: &str) -> Option<&T> {
        self.values.get(key).and_then(|v| v.downcast_ref())
    }

    /// Remove a custom value.
    #[inline]
    pub fn remove<T: 'static>(&mut self, key: &str) -> Option<T> {
        self.values
            .remove(key)
            .and_then(|v| v.downcast().ok())
            .map(|b| *b)
    }

    /// Get elapsed time since request started.
    #[inline]
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }
}

/// Build request ID from trace_id and span_id.
#[inline]
fn make_request_id(trace_id: &str, span_id: &str) -> String {
    let trace_part = &trace_id[..12.min(trace_id.len())];
    let span_part = &span_id[..4.min(span_id.len())];

    let mut id = String::with_capacity(trace_part.len() + 1 + span_part.len());
    id.push_str(trace_part);
    id.push('-');
    id.push_str(span_part);
    id
}
