//! Ordered interceptor chain.

use std::sync::Arc;

use super::{Endpoint, Interceptor, Next};
use crate::core::{Context, Request, Response, Result};

/// Interceptors in the order they wrap a request.
///
/// The first interceptor added is the outermost: it sees the request first
/// and the result last. Order is exactly insertion order.
pub struct Chain {
    interceptors: Vec<Arc<dyn Interceptor>>,
}

impl Chain {
    /// Create a new empty chain.
    pub fn new() -> Self {
        Self {
            interceptors: Vec::new(),
        }
    }

    /// Append an interceptor inside the ones already added.
    pub fn with<I: Interceptor + 'static>(mut self, interceptor: I) -> Self {
        self.interceptors.push(Arc::new(interceptor));
        self
    }

    /// Append a shared interceptor.
    pub fn with_arc(mut self, interceptor: Arc<dyn Interceptor>) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    pub fn len(&self) -> usize {
        self.interceptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }

    /// Interceptor names, outermost first.
    pub fn names(&self) -> Vec<&'static str> {
        self.interceptors.iter().map(|i| i.name()).collect()
    }

    /// Run `req` through every interceptor and finally `endpoint`.
    pub async fn run(
        &self,
        req: Request,
        ctx: &mut Context,
        endpoint: &dyn Endpoint,
    ) -> Result<Response> {
        Next::new(&self.interceptors, endpoint).run(req, ctx).await
    }
}

impl Default for Chain {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for Chain {
    fn clone(&self) -> Self {
        Self {
            interceptors: self.interceptors.clone(),
        }
    }
}
