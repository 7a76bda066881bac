//! HTTP server driving the interceptor chain.
//!
//! # Example
//!
//! ```rust,ignore
//! use championship::middleware::{Chain, RecoverInterceptor};
//! use championship::server::{Router, Server};
//!
//! let server = Server::builder(config)
//!     .chain(Chain::new().with(RecoverInterceptor))
//!     .router(router)
//!     .build();
//!
//! let bound = server.bind().await?;
//! bound.serve(shutdown_signal()).await;
//! ```
//!
//! # Graceful Shutdown
//!
//! [`BoundServer::serve`] stops accepting as soon as the shutdown future
//! resolves, then waits up to the drain timeout for open connections to
//! finish their in-flight requests.

mod connection;
mod router;
mod static_files;

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use hyper_util::server::graceful::GracefulShutdown;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

pub use router::{Handler, RouteError, Router};
pub use static_files::{StaticFiles, PATH_PARAM};

use crate::config::ServerConfig;
use crate::middleware::{Chain, DefaultErrorHandler, ErrorHandler};
use connection::{is_connection_error, ConnectionContext};

/// Assembles a [`Server`].
pub struct ServerBuilder {
    config: ServerConfig,
    chain: Chain,
    router: Router,
    errors: Arc<dyn ErrorHandler>,
}

impl ServerBuilder {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            chain: Chain::new(),
            router: Router::new(),
            errors: Arc::new(DefaultErrorHandler),
        }
    }

    /// Interceptors wrapped around every routed request.
    pub fn chain(mut self, chain: Chain) -> Self {
        self.chain = chain;
        self
    }

    pub fn router(mut self, router: Router) -> Self {
        self.router = router;
        self
    }

    /// Handler for errors that escape the chain.
    pub fn error_handler(mut self, errors: Arc<dyn ErrorHandler>) -> Self {
        self.errors = errors;
        self
    }

    pub fn build(self) -> Server {
        Server {
            config: self.config,
            ctx: Arc::new(ConnectionContext {
                chain: self.chain,
                router: self.router,
                errors: self.errors,
            }),
        }
    }
}

/// A configured server that has not opened its socket yet.
pub struct Server {
    config: ServerConfig,
    ctx: Arc<ConnectionContext>,
}

impl Server {
    pub fn builder(config: ServerConfig) -> ServerBuilder {
        ServerBuilder::new(config)
    }

    /// Interceptor names, outermost first.
    pub fn chain_names(&self) -> Vec<&'static str> {
        self.ctx.chain.names()
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Open the listen socket.
    pub async fn bind(self) -> std::io::Result<BoundServer> {
        let listener = TcpListener::bind(self.config.listen_addr).await?;
        Ok(BoundServer {
            listener,
            ctx: self.ctx,
            drain_timeout: self.config.drain_timeout,
        })
    }
}

/// A server holding its listen socket.
pub struct BoundServer {
    listener: TcpListener,
    ctx: Arc<ConnectionContext>,
    drain_timeout: Duration,
}

impl BoundServer {
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections until `shutdown` resolves, then drain.
    ///
    /// Returns `true` if every connection finished within the drain timeout.
    pub async fn serve<F>(self, shutdown: F) -> bool
    where
        F: Future<Output = ()>,
    {
        let BoundServer {
            listener,
            ctx,
            drain_timeout,
        } = self;

        if let Ok(addr) = listener.local_addr() {
            info!("Server listening on http://{}", addr);
        }

        let builder = auto::Builder::new(TokioExecutor::new());
        let graceful = GracefulShutdown::new();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                result = listener.accept() => {
                    let (stream, remote_addr) = match result {
                        Ok(conn) => conn,
                        Err(e) => {
                            error!("Accept error: {}", e);
                            continue;
                        }
                    };
                    let _ = stream.set_nodelay(true);

                    let ctx = Arc::clone(&ctx);
                    let service = service_fn(move |req| {
                        let ctx = Arc::clone(&ctx);
                        async move { ctx.handle_request(req, remote_addr).await }
                    });

                    let conn = builder
                        .serve_connection(TokioIo::new(stream), service)
                        .into_owned();
                    let conn = graceful.watch(conn);

                    tokio::spawn(async move {
                        if let Err(err) = conn.await {
                            let err_str = format!("{:?}", err);
                            if !is_connection_error(&err_str) {
                                debug!("Connection error: {:?}", err);
                            }
                        }
                    });
                }
                _ = &mut shutdown => {
                    info!("Shutdown signal received, no longer accepting connections");
                    break;
                }
            }
        }

        drop(listener);

        match tokio::time::timeout(drain_timeout, graceful.shutdown()).await {
            Ok(()) => {
                info!("All connections drained");
                true
            }
            Err(_) => {
                warn!(
                    timeout_ms = drain_timeout.as_millis() as u64,
                    "Drain timeout reached, closing remaining connections"
                );
                false
            }
        }
    }
}
