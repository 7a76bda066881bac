//! Request logging interceptor.
//!
//! Emits one entry record before the rest of the pipeline runs and one exit
//! record after it returns, on every path: success, handler error, panic and
//! cancellation.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures_util::FutureExt;
use http::StatusCode;
use serde_json::Value;

use super::{ErrorHandler, Interceptor, Next};
use crate::core::{panic_message, Context, Request, Response, Result};
use crate::logging::{headers_to_json, Fields, Logger};

/// Status logged when the client went away before a response was produced.
pub const CLIENT_CLOSED_REQUEST: u16 = 499;

/// Logs `>>> METHOD URI` on entry and `<<< METHOD URI` on exit.
///
/// Errors returned by the inner pipeline are handed to the error handler
/// here, so the exit record carries the status the client actually receives.
pub struct LoggingInterceptor {
    logger: Logger,
    errors: Arc<dyn ErrorHandler>,
}

impl LoggingInterceptor {
    pub fn new(logger: Logger, errors: Arc<dyn ErrorHandler>) -> Self {
        Self { logger, errors }
    }
}

#[async_trait]
impl Interceptor for LoggingInterceptor {
    fn name(&self) -> &'static str {
        "logging"
    }

    async fn intercept(&self, req: Request, ctx: &mut Context, next: Next<'_>) -> Result<Response> {
        let started = ctx.started_at;
        let line = format!("{} {}", req.method(), req.request_uri());

        let mut fields = correlation(ctx);
        fields.insert("method".into(), req.method().as_str().into());
        fields.insert("uri".into(), req.request_uri().into());
        fields.insert("remote_ip".into(), ctx.client_ip.to_string().into());
        fields.insert("headers".into(), headers_to_json(req.headers()));
        self.logger.debug(format!(">>> {}", line), fields);

        let mut guard = ExitGuard {
            logger: &self.logger,
            line: &line,
            started,
            correlation: correlation(ctx),
            armed: true,
        };

        let outcome = AssertUnwindSafe(next.run(req, ctx)).catch_unwind().await;
        guard.armed = false;

        let (res, error) = match outcome {
            Ok(Ok(res)) => (res, None),
            Ok(Err(err)) => (self.errors.handle(&err, ctx), Some(err.to_string())),
            Err(payload) => {
                let mut fields = correlation(ctx);
                fields.insert(
                    "status".into(),
                    StatusCode::INTERNAL_SERVER_ERROR.as_u16().into(),
                );
                insert_latency(&mut fields, started.elapsed());
                fields.insert("panicked".into(), true.into());
                fields.insert("error".into(), panic_message(payload.as_ref()).into());
                self.logger.debug(format!("<<< {}", line), fields);
                std::panic::resume_unwind(payload);
            }
        };

        let elapsed = started.elapsed();
        let mut fields = correlation(ctx);
        fields.insert("status".into(), res.status().as_u16().into());
        fields.insert("headers".into(), headers_to_json(res.headers()));
        insert_latency(&mut fields, elapsed);
        if let Some(error) = error {
            fields.insert("error".into(), error.into());
        }
        self.logger.debug(format!("<<< {}", line), fields);

        Ok(res)
    }
}

fn correlation(ctx: &Context) -> Fields {
    let mut fields = Fields::new();
    fields.insert("request_id".into(), ctx.request_id.as_str().into());
    fields.insert("trace_id".into(), ctx.trace_id.as_str().into());
    fields
}

fn insert_latency(fields: &mut Fields, elapsed: Duration) {
    fields.insert("latency".into(), format!("{:?}", elapsed).into());
    fields.insert(
        "latency_ms".into(),
        Value::from(elapsed.as_secs_f64() * 1000.0),
    );
}

/// Writes the exit record if the request future is dropped mid-flight.
struct ExitGuard<'a> {
    logger: &'a Logger,
    line: &'a str,
    started: Instant,
    correlation: Fields,
    armed: bool,
}

impl Drop for ExitGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }

        let mut fields = std::mem::take(&mut self.correlation);
        fields.insert("status".into(), CLIENT_CLOSED_REQUEST.into());
        insert_latency(&mut fields, self.started.elapsed());
        fields.insert("aborted".into(), true.into());
        self.logger.debug(format!("<<< {}", self.line), fields);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Error;
    use crate::logging::{Level, MemorySink};
    use crate::middleware::test_support::{context, request, Fixed};
    use crate::middleware::{Chain, DefaultErrorHandler, Endpoint};
    use http::Method;

    struct Pending;

    #[async_trait]
    impl Endpoint for Pending {
        async fn call(&self, _req: Request, _ctx: &mut Context) -> Result<Response> {
            std::future::pending::<()>().await;
            Ok(Response::empty(StatusCode::OK))
        }
    }

    fn chain(sink: &Arc<MemorySink>) -> Chain {
        Chain::new().with(LoggingInterceptor::new(
            Logger::new(sink.clone(), true),
            Arc::new(DefaultErrorHandler),
        ))
    }

    #[tokio::test]
    async fn test_entry_and_exit_records() {
        let sink = Arc::new(MemorySink::new());
        let mut ctx = context();
        let mut req = request(Method::GET, "/health?verbose=1");
        req.headers_mut()
            .insert("user-agent", "probe/1.0".parse().unwrap());

        let res = chain(&sink)
            .run(req, &mut ctx, &Fixed::Status(StatusCode::OK))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);

        let records = sink.records();
        assert_eq!(records.len(), 2);

        let entry = &records[0];
        assert_eq!(entry.level, Level::Debug);
        assert_eq!(entry.message, ">>> GET /health?verbose=1");
        assert_eq!(entry.fields["headers"]["user-agent"][0], "probe/1.0");
        assert_eq!(entry.fields["request_id"], "-");
        assert!(entry
            .caller
            .as_deref()
            .unwrap()
            .starts_with("src/middleware/access_log.rs:"));

        let exit = &records[1];
        assert_eq!(exit.message, "<<< GET /health?verbose=1");
        assert_eq!(exit.fields["status"], 200);
        assert!(exit.fields["latency_ms"].as_f64().unwrap() >= 0.0);
        assert!(exit.fields["latency"].is_string());
        assert!(exit.fields.get("error").is_none());
    }

    #[tokio::test]
    async fn test_error_is_translated_and_logged() {
        let sink = Arc::new(MemorySink::new());
        let mut ctx = context();

        let res = chain(&sink)
            .run(
                request(Method::GET, "/api/championships/1"),
                &mut ctx,
                &Fixed::Fail(|| Error::Internal("lookup failed".into())),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let exit = &sink.with_message("<<< GET /api/championships/1")[0];
        assert_eq!(exit.fields["status"], 500);
        assert_eq!(exit.fields["error"], "lookup failed");
        assert_eq!(
            exit.fields["headers"]["content-type"][0],
            "application/json"
        );
    }

    #[test]
    fn test_cancelled_request_still_logs_exit() {
        let sink = Arc::new(MemorySink::new());
        let mut ctx = context();
        let chain = chain(&sink);

        let mut task =
            tokio_test::task::spawn(chain.run(request(Method::GET, "/slow"), &mut ctx, &Pending));
        tokio_test::assert_pending!(task.poll());
        assert_eq!(sink.records().len(), 1);
        drop(task);

        let records = sink.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].message, "<<< GET /slow");
        assert_eq!(records[1].fields["status"], 499);
        assert_eq!(records[1].fields["aborted"], true);
    }

    #[tokio::test]
    async fn test_panic_still_logs_exit() {
        let sink = Arc::new(MemorySink::new());
        let mut ctx = context();
        let chain = chain(&sink);

        let outcome = AssertUnwindSafe(chain.run(request(Method::GET, "/boom"), &mut ctx, &Fixed::Panic))
            .catch_unwind()
            .await;
        assert!(outcome.is_err());

        let exit = &sink.with_message("<<< GET /boom")[0];
        assert_eq!(exit.fields["status"], 500);
        assert_eq!(exit.fields["panicked"], true);
        assert_eq!(exit.fields["error"], "endpoint exploded");
        assert_eq!(sink.records().len(), 2);
    }
}
