//! Error handler that records failures on the request span.

use std::sync::Arc;

use super::tracing_middleware::record_error;
use crate::core::{Context, Error, Response};
use crate::middleware::{DefaultErrorHandler, ErrorHandler};

/// Records the error on the active span, then delegates the response.
///
/// Recording happens before the response is built, so the span already
/// carries the error when the tracing interceptor ends it.
pub struct SpanErrorHandler {
    inner: Arc<dyn ErrorHandler>,
}

impl SpanErrorHandler {
    pub fn new(inner: Arc<dyn ErrorHandler>) -> Self {
        Self { inner }
    }
}

impl Default for SpanErrorHandler {
    fn default() -> Self {
        Self::new(Arc::new(DefaultErrorHandler))
    }
}

impl ErrorHandler for SpanErrorHandler {
    fn handle(&self, err: &Error, ctx: &mut Context) -> Response {
        if !ctx.span_error_recorded() {
            record_error(ctx.otel_context(), err);
            ctx.mark_span_error();
        }
        self.inner.handle(err, ctx)
    }
}
