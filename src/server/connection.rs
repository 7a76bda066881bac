//! Per-connection request handling.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming as IncomingBody;
use hyper::{Request as HyperRequest, Response as HyperResponse};
use tracing::debug;

use super::router::Router;
use crate::core::{Context, Error, HttpVersion, Request};
use crate::middleware::{Chain, ErrorHandler};

/// Check if an error is a common connection reset or timeout.
#[inline]
pub(crate) fn is_connection_error(err_str: &str) -> bool {
    err_str.contains("connection reset")
        || err_str.contains("broken pipe")
        || err_str.contains("Connection reset")
        || err_str.contains("os error 104")
        || err_str.contains("os error 32")
        || err_str.contains("timed out")
}

/// Everything a connection needs to answer requests.
pub struct ConnectionContext {
    pub chain: Chain,
    pub router: Router,
    pub errors: Arc<dyn ErrorHandler>,
}

impl ConnectionContext {
    /// Turn one hyper request into a response by running the chain.
    pub async fn handle_request(
        &self,
        req: HyperRequest<IncomingBody>,
        remote_addr: SocketAddr,
    ) -> Result<HyperResponse<Full<Bytes>>, Infallible> {
        let (parts, body) = req.into_parts();

        // Latency and span timing start before the body is read
        let mut ctx = Context::new(remote_addr.ip())
            .with_http_version(HttpVersion::from_http(parts.version));

        let body = match body.collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => {
                debug!(error = %e, "Failed to read request body");
                ctx.reject(Error::BadRequest(format!("unreadable request body: {}", e)));
                Bytes::new()
            }
        };

        let mut request = Request::new(parts.method, parts.uri, parts.headers, body);
        request.set_version(parts.version);

        if let Some(route) = self.router.resolve(request.path()) {
            ctx.set_route(route);
        }

        let response = match self.chain.run(request, &mut ctx, &self.router).await {
            Ok(response) => response,
            Err(err) => self.errors.handle(&err, &mut ctx),
        };

        Ok(response.into())
    }
}
