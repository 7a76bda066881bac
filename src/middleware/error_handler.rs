//! Translation of request errors into HTTP responses.

use serde::Serialize;

use crate::core::{Context, Error, Response};

/// Turns an error escaping the handler into the response sent to the client.
pub trait ErrorHandler: Send + Sync {
    fn handle(&self, err: &Error, ctx: &mut Context) -> Response;
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    message: &'a str,
}

/// Maps each error to its status and a JSON `{"message": ...}` body.
///
/// Only bad-request errors expose their detail. Every other status is
/// described by its canonical reason phrase.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultErrorHandler;

impl DefaultErrorHandler {
    pub fn new() -> Self {
        Self
    }
}

impl ErrorHandler for DefaultErrorHandler {
    fn handle(&self, err: &Error, ctx: &mut Context) -> Response {
        let status = err.status();

        let message = match err {
            Error::BadRequest(msg) => msg.as_str(),
            _ => status.canonical_reason().unwrap_or("Unknown Error"),
        };

        if status.is_server_error() {
            tracing::error!(
                request_id = %ctx.request_id,
                trace_id = %ctx.trace_id,
                status = status.as_u16(),
                error = %err,
                "request failed"
            );
        }

        Response::json(status, &ErrorBody { message })
            .unwrap_or_else(|_| Response::empty(status))
    }
}
