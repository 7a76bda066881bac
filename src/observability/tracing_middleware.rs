//! Request tracing interceptor.
//!
//! Continues the caller's trace when `traceparent` is present, otherwise
//! starts a new one. The server span is stored in the request [`Context`]
//! and ended exactly once, also when the request is cancelled or panics.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use futures_util::FutureExt;
use http::StatusCode;
use opentelemetry::trace::{SpanKind, Status, TraceContextExt, Tracer};
use opentelemetry::{Context as OtelContext, KeyValue};
use opentelemetry_semantic_conventions::trace::{
    CLIENT_ADDRESS, ERROR_TYPE, HTTP_REQUEST_METHOD, HTTP_RESPONSE_STATUS_CODE, HTTP_ROUTE,
    NETWORK_PROTOCOL_VERSION, URL_PATH, URL_QUERY, USER_AGENT_ORIGINAL,
};

use super::Telemetry;
use crate::core::{panic_message, Context, Error, Request, Response, Result};
use crate::middleware::{Interceptor, Next};

/// Starts one server span per request.
pub struct TracingInterceptor {
    telemetry: Arc<Telemetry>,
}

impl TracingInterceptor {
    pub fn new(telemetry: Arc<Telemetry>) -> Self {
        Self { telemetry }
    }
}

/// Span name for a request: the route pattern, or `HTTP <METHOD>` when unrouted.
pub fn span_name(method: &http::Method, route: Option<&str>) -> String {
    match route {
        Some(pattern) => pattern.to_string(),
        None => format!("HTTP {}", method),
    }
}

#[async_trait]
impl Interceptor for TracingInterceptor {
    fn name(&self) -> &'static str {
        "tracing"
    }

    async fn intercept(&self, req: Request, ctx: &mut Context, next: Next<'_>) -> Result<Response> {
        let parent_cx = self.telemetry.extract(req.headers());
        let parent_span_id = {
            let parent = parent_cx.span();
            let sc = parent.span_context();
            sc.is_valid().then(|| sc.span_id().to_string())
        };

        let mut attributes = vec![
            KeyValue::new(HTTP_REQUEST_METHOD, req.method().to_string()),
            KeyValue::new(URL_PATH, req.path().to_string()),
            KeyValue::new(CLIENT_ADDRESS, ctx.client_ip.to_string()),
            KeyValue::new(
                NETWORK_PROTOCOL_VERSION,
                ctx.http_version.as_str().trim_start_matches("HTTP/"),
            ),
        ];
        if let Some(route) = ctx.route() {
            attributes.push(KeyValue::new(HTTP_ROUTE, route.to_string()));
        }
        if let Some(query) = req.query() {
            attributes.push(KeyValue::new(URL_QUERY, query.to_string()));
        }
        if let Some(ua) = req.user_agent() {
            attributes.push(KeyValue::new(USER_AGENT_ORIGINAL, ua.to_string()));
        }

        let start_time = SystemTime::now()
            .checked_sub(ctx.elapsed())
            .unwrap_or_else(SystemTime::now);

        let tracer = self.telemetry.tracer();
        let span = tracer
            .span_builder(span_name(req.method(), ctx.route()))
            .with_kind(SpanKind::Server)
            .with_start_time(start_time)
            .with_attributes(attributes)
            .start_with_context(tracer, &parent_cx);
        let cx = parent_cx.with_span(span);
        ctx.attach_span(cx.clone(), parent_span_id);

        let mut guard = SpanGuard {
            cx: &cx,
            armed: true,
        };
        let outcome = AssertUnwindSafe(next.run(req, ctx)).catch_unwind().await;
        guard.armed = false;

        let span = cx.span();
        let result = match outcome {
            Ok(result) => result,
            Err(payload) => {
                span.set_attribute(KeyValue::new(
                    HTTP_RESPONSE_STATUS_CODE,
                    i64::from(StatusCode::INTERNAL_SERVER_ERROR.as_u16()),
                ));
                record_error(&cx, &Error::Panic(panic_message(payload.as_ref())));
                ctx.mark_span_error();
                span.end();
                std::panic::resume_unwind(payload);
            }
        };

        match &result {
            Ok(res) => {
                let status = res.status();
                span.set_attribute(KeyValue::new(
                    HTTP_RESPONSE_STATUS_CODE,
                    i64::from(status.as_u16()),
                ));
                // Client errors leave the server span status unset
                if status.is_server_error() && !ctx.span_error_recorded() {
                    span.set_status(Status::error(format!("HTTP {}", status.as_u16())));
                }
            }
            Err(err) => {
                span.set_attribute(KeyValue::new(
                    HTTP_RESPONSE_STATUS_CODE,
                    i64::from(err.status().as_u16()),
                ));
                if !ctx.span_error_recorded() {
                    record_error(&cx, err);
                    ctx.mark_span_error();
                }
            }
        }
        span.end();

        result
    }
}

/// Attach `err` to the active span of `cx`: exception event, type and error status.
pub fn record_error(cx: &OtelContext, err: &Error) {
    let span = cx.span();
    span.record_error(err);
    span.set_attribute(KeyValue::new(ERROR_TYPE, error_type(err)));
    span.set_status(Status::error(err.to_string()));
}

fn error_type(err: &Error) -> &'static str {
    match err {
        Error::NotFound(_) => "not_found",
        Error::MethodNotAllowed(_) => "method_not_allowed",
        Error::BadRequest(_) => "bad_request",
        Error::Timeout { .. } => "timeout",
        Error::Internal(_) => "internal",
        Error::Panic(_) => "panic",
        Error::Io(_) => "io",
        Error::Json(_) => "json",
    }
}

/// Ends the span if the request future is dropped before it completes.
struct SpanGuard<'a> {
    cx: &'a OtelContext,
    armed: bool,
}

impl Drop for SpanGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let span = self.cx.span();
        span.set_status(Status::error("request aborted"));
        span.end();
    }
}
