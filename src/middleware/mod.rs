//! Interceptor pipeline wrapped around every request.
//!
//! An [`Interceptor`] sees the request on the way in and the handler's
//! result on the way out. Interceptors are composed into an ordered
//! [`Chain`]; each one decides when (and whether) to call [`Next::run`].
//! The innermost step is an [`Endpoint`], normally the router.
//!
//! # Lifecycle
//!
//! ```text
//! Request → Recover → Tracing → Logging → [Timeout] → Endpoint
//!                                                        ↓
//! Response ← Recover ← Tracing ← Logging ← [Timeout] ←───┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use async_trait::async_trait;
//! use championship::core::{Context, Request, Response, Result};
//! use championship::middleware::{Chain, Interceptor, Next};
//!
//! struct Stamp;
//!
//! #[async_trait]
//! impl Interceptor for Stamp {
//!     fn name(&self) -> &'static str { "stamp" }
//!
//!     async fn intercept(&self, req: Request, ctx: &mut Context, next: Next<'_>) -> Result<Response> {
//!         let res = next.run(req, ctx).await?;
//!         Ok(res.with_header("x-stamp", "1"))
//!     }
//! }
//!
//! let chain = Chain::new().with(Stamp);
//! ```

mod chain;

pub mod access_log;
pub mod error_handler;
pub mod recover;
pub mod timeout;

pub use access_log::LoggingInterceptor;
pub use chain::Chain;
pub use error_handler::{DefaultErrorHandler, ErrorHandler};
pub use recover::RecoverInterceptor;
pub use timeout::TimeoutInterceptor;

use std::sync::Arc;

use async_trait::async_trait;

use crate::core::{Context, Request, Response, Result};

/// A step wrapped around request handling.
///
/// Implementations must call `next.run(req, ctx)` exactly once to continue
/// the pipeline, or return without calling it to short-circuit.
#[async_trait]
pub trait Interceptor: Send + Sync {
    /// Unique name for this interceptor (used for logging/debugging).
    fn name(&self) -> &'static str;

    /// Handle `req`, delegating to the rest of the pipeline through `next`.
    async fn intercept(&self, req: Request, ctx: &mut Context, next: Next<'_>) -> Result<Response>;
}

/// Terminal step of a pipeline.
#[async_trait]
pub trait Endpoint: Send + Sync {
    async fn call(&self, req: Request, ctx: &mut Context) -> Result<Response>;
}

/// The remainder of a pipeline, handed to each interceptor.
pub struct Next<'a> {
    rest: &'a [Arc<dyn Interceptor>],
    endpoint: &'a dyn Endpoint,
}

impl<'a> Next<'a> {
    pub(crate) fn new(rest: &'a [Arc<dyn Interceptor>], endpoint: &'a dyn Endpoint) -> Self {
        Self { rest, endpoint }
    }

    /// Run the remaining interceptors and the endpoint.
    pub async fn run(self, req: Request, ctx: &mut Context) -> Result<Response> {
        match self.rest.split_first() {
            Some((head, rest)) => {
                head.intercept(req, ctx, Next::new(rest, self.endpoint))
                    .await
            }
            None => self.endpoint.call(req, ctx).await,
        }
    }

    /// Number of interceptors still ahead.
    pub fn remaining(&self) -> usize {
        self.rest.len()
    }
}
