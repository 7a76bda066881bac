//! Per-request deadline.

use std::time::Duration;

use async_trait::async_trait;

use super::{Interceptor, Next};
use crate::core::{Context, Error, Request, Response, Result};

/// Fails a request with [`Error::Timeout`] once `limit` has elapsed.
///
/// The inner pipeline is dropped at the deadline, which cancels the handler.
#[derive(Clone, Copy, Debug)]
pub struct TimeoutInterceptor {
    limit: Duration,
}

impl TimeoutInterceptor {
    pub fn new(limit: Duration) -> Self {
        Self { limit }
    }

    pub fn limit(&self) -> Duration {
        self.limit
    }
}

#[async_trait]
impl Interceptor for TimeoutInterceptor {
    fn name(&self) -> &'static str {
        "timeout"
    }

    async fn intercept(&self, req: Request, ctx: &mut Context, next: Next<'_>) -> Result<Response> {
        match tokio::time::timeout(self.limit, next.run(req, ctx)).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout {
                duration_ms: self.limit.as_millis() as u64,
            }),
        }
    }
}
