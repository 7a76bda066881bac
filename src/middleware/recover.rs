//! Outermost panic barrier.

use std::panic::AssertUnwindSafe;

use async_trait::async_trait;
use futures_util::FutureExt;

use super::{Interceptor, Next};
use crate::core::{Context, Error, Request, Response, Result};

/// Converts a panic anywhere inside the pipeline into [`Error::Panic`].
///
/// Inner interceptors observe the unwind through their drop guards, so the
/// span still ends and the exit record is still written.
#[derive(Clone, Copy, Debug, Default)]
pub struct RecoverInterceptor;

impl RecoverInterceptor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Interceptor for RecoverInterceptor {
    fn name(&self) -> &'static str {
        "recover"
    }

    async fn intercept(&self, req: Request, ctx: &mut Context, next: Next<'_>) -> Result<Response> {
        let path = req.path().to_string();
        match AssertUnwindSafe(next.run(req, ctx)).catch_unwind().await {
            Ok(result) => result,
            Err(payload) => {
                let err = Error::from_panic(payload);
                tracing::error!(
                    path = %path,
                    request_id = %ctx.request_id,
                    error = %err,
                    "recovered from panic"
                );
                Err(err)
            }
        }
    }
}
