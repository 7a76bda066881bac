//! Path router built on a radix tree (`matchit`).
//!
//! Patterns use `{name}` for a single segment and `{*name}` for the rest of
//! the path, e.g. `/api/championships/{id}` or `/static/{*path}`.

use std::collections::HashMap;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::FutureExt;
use http::Method;
use matchit::Router as MatchitRouter;

use crate::core::{Context, Error, Request, Response, Result, RouteMatch};
use crate::middleware::Endpoint;

/// A request handler bound to a route.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn call(&self, req: Request, ctx: &mut Context) -> Result<Response>;
}

/// A pattern could not be added to the router.
#[derive(Debug)]
pub struct RouteError {
    pub pattern: String,
    pub details: String,
}

impl fmt::Display for RouteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cannot register route '{}': {}", self.pattern, self.details)
    }
}

impl std::error::Error for RouteError {}

struct Route {
    pattern: String,
    handlers: Vec<(Method, Arc<dyn Handler>)>,
}

impl Route {
    fn handler(&self, method: &Method) -> Option<&Arc<dyn Handler>> {
        self.handlers
            .iter()
            .find(|(m, _)| m == method)
            .map(|(_, h)| h)
    }
}

/// Maps method and path to a [`Handler`].
pub struct Router {
    inner: MatchitRouter<usize>,
    routes: Vec<Route>,
    by_pattern: HashMap<String, usize>,
}

impl Router {
    pub fn new() -> Self {
        Self {
            inner: MatchitRouter::new(),
            routes: Vec::new(),
            by_pattern: HashMap::new(),
        }
    }

    /// Register `handler` for `method` on `pattern`.
    ///
    /// Registering the same method and pattern twice replaces the handler.
    pub fn route<H: Handler + 'static>(
        &mut self,
        method: Method,
        pattern: &str,
        handler: H,
    ) -> std::result::Result<&mut Self, RouteError> {
        let index = match self.by_pattern.get(pattern) {
            Some(&index) => index,
            None => {
                let index = self.routes.len();
                self.inner
                    .insert(convert_path_params(pattern), index)
                    .map_err(|e| RouteError {
                        pattern: pattern.to_string(),
                        details: e.to_string(),
                    })?;
                self.routes.push(Route {
                    pattern: pattern.to_string(),
                    handlers: Vec::new(),
                });
                self.by_pattern.insert(pattern.to_string(), index);
                index
            }
        };

        let route = &mut self.routes[index];
        let handler: Arc<dyn Handler> = Arc::new(handler);
        match route.handlers.iter_mut().find(|(m, _)| *m == method) {
            Some(slot) => slot.1 = handler,
            None => route.handlers.push((method, handler)),
        }
        Ok(self)
    }

    /// Register a `GET` handler.
    pub fn get<H: Handler + 'static>(
        &mut self,
        pattern: &str,
        handler: H,
    ) -> std::result::Result<&mut Self, RouteError> {
        self.route(Method::GET, pattern, handler)
    }

    /// Match `path` against the registered patterns, ignoring the method.
    pub fn resolve(&self, path: &str) -> Option<RouteMatch> {
        let matched = self.inner.at(path).ok()?;
        let route = self.routes.get(*matched.value)?;
        Some(RouteMatch {
            pattern: route.pattern.clone(),
            params: collect_params(&matched.params),
        })
    }

    /// Registered patterns in registration order.
    pub fn patterns(&self) -> Vec<&str> {
        self.routes.iter().map(|r| r.pattern.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Endpoint for Router {
    async fn call(&self, req: Request, ctx: &mut Context) -> Result<Response> {
        if let Some(err) = ctx.take_rejection() {
            return Err(err);
        }

        let (index, params) = match self.inner.at(req.path()) {
            Ok(matched) => (*matched.value, collect_params(&matched.params)),
            Err(_) => return Err(Error::NotFound(req.path().to_string())),
        };
        let route = self
            .routes
            .get(index)
            .ok_or_else(|| Error::NotFound(req.path().to_string()))?;

        let handler = route
            .handler(req.method())
            .cloned()
            .ok_or_else(|| Error::MethodNotAllowed(req.method().to_string()))?;

        if ctx.route().is_none() {
            ctx.set_route(RouteMatch {
                pattern: route.pattern.clone(),
                params,
            });
        }

        match AssertUnwindSafe(handler.call(req, ctx)).catch_unwind().await {
            Ok(result) => result,
            Err(payload) => Err(Error::from_panic(payload)),
        }
    }
}

fn collect_params(params: &matchit::Params<'_, '_>) -> HashMap<String, String> {
    params
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Convert `{param}` / `{*rest}` style to matchit's `:param` / `*rest`.
fn convert_path_params(path: &str) -> String {
    let mut result = String::with_capacity(path.len());
    let mut chars = path.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '{' => {
                if chars.peek() == Some(&'*') {
                    chars.next();
                    result.push('*');
                } else {
                    result.push(':');
                }
            }
            '}' => {}
            _ => result.push(ch),
        }
    }

    result
}
