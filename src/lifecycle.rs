//! Process startup and shutdown sequencing.
//!
//! Startup: logger → tracer provider → interceptors and routes → listener.
//! Shutdown: stop accepting → drain connections → flush and stop the
//! tracer provider. Every step logs its own failure; only startup failures
//! are fatal.

use std::fmt;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{error, info, warn};

use crate::config::{ConfigError, ServerConfig};
use crate::handlers::{GetChampionship, Health};
use crate::logging::Logger;
use crate::middleware::{Chain, ErrorHandler, LoggingInterceptor, RecoverInterceptor, TimeoutInterceptor};
use crate::observability::{ShutdownOutcome, SpanErrorHandler, Telemetry, TelemetryError, TracingInterceptor};
use crate::server::{RouteError, Router, Server, StaticFiles};

/// Errors that stop the process before it serves traffic.
#[derive(Debug)]
pub enum StartupError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Routes(RouteError),
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },
}

impl fmt::Display for StartupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StartupError::Config(e) => write!(f, "invalid configuration: {}", e),
            StartupError::Telemetry(e) => write!(f, "tracer provider: {}", e),
            StartupError::Routes(e) => write!(f, "{}", e),
            StartupError::Bind { addr, source } => {
                write!(f, "failed to bind {}: {}", addr, source)
            }
        }
    }
}

impl std::error::Error for StartupError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StartupError::Config(e) => Some(e),
            StartupError::Telemetry(e) => Some(e),
            StartupError::Routes(e) => Some(e),
            StartupError::Bind { source, .. } => Some(source),
        }
    }
}

impl From<ConfigError> for StartupError {
    fn from(e: ConfigError) -> Self {
        StartupError::Config(e)
    }
}

impl From<TelemetryError> for StartupError {
    fn from(e: TelemetryError) -> Self {
        StartupError::Telemetry(e)
    }
}

impl From<RouteError> for StartupError {
    fn from(e: RouteError) -> Self {
        StartupError::Routes(e)
    }
}

/// Application routes: health, championships and the static docs.
pub fn routes(config: &ServerConfig) -> Result<Router, RouteError> {
    let mut router = Router::new();
    router
        .get("/health", Health)?
        .get("/api/championships/{id}", GetChampionship)?
        .get("/static/{*path}", StaticFiles::new(&config.static_root))?;
    Ok(router)
}

/// Interceptors in their fixed order: recover → tracing → logging → [timeout].
pub fn interceptors(
    config: &ServerConfig,
    telemetry: Arc<Telemetry>,
    logger: Logger,
    errors: Arc<dyn ErrorHandler>,
) -> Chain {
    let mut chain = Chain::new()
        .with(RecoverInterceptor::new())
        .with(TracingInterceptor::new(telemetry))
        .with(LoggingInterceptor::new(logger, errors));
    if let Some(limit) = config.request_timeout {
        chain = chain.with(TimeoutInterceptor::new(limit));
    }
    chain
}

/// Wire telemetry, logger, interceptors and routes into a server.
pub fn build_server(
    config: &ServerConfig,
    telemetry: Arc<Telemetry>,
    logger: Logger,
) -> Result<Server, RouteError> {
    let errors: Arc<dyn ErrorHandler> = Arc::new(SpanErrorHandler::default());

    let server = Server::builder(config.clone())
        .chain(interceptors(config, telemetry, logger, errors.clone()))
        .router(routes(config)?)
        .error_handler(errors)
        .build();

    info!(chain = ?server.chain_names(), "Request pipeline assembled");
    Ok(server)
}

/// Serve until `shutdown` resolves, then drain and stop the tracer provider.
///
/// If the listener cannot be bound the tracer is still flushed before the
/// error is returned.
pub async fn run<F>(
    config: &ServerConfig,
    telemetry: Arc<Telemetry>,
    logger: Logger,
    shutdown: F,
) -> Result<(), StartupError>
where
    F: Future<Output = ()>,
{
    let server = build_server(config, telemetry.clone(), logger)?;

    let bound = match server.bind().await {
        Ok(bound) => bound,
        Err(source) => {
            error!(addr = %config.listen_addr, error = %source, "Failed to bind listener");
            shutdown_tracer(&telemetry).await;
            return Err(StartupError::Bind {
                addr: config.listen_addr,
                source,
            });
        }
    };

    bound.serve(shutdown).await;
    shutdown_tracer(&telemetry).await;
    Ok(())
}

/// Stop the tracer provider, logging the outcome.
pub async fn shutdown_tracer(telemetry: &Telemetry) -> ShutdownOutcome {
    let outcome = telemetry.shutdown().await;
    match &outcome {
        ShutdownOutcome::Flushed => info!("Tracer provider stopped"),
        ShutdownOutcome::Failed(e) => warn!("Error shutting down tracer provider: {}", e),
        ShutdownOutcome::TimedOut => warn!("Tracer provider shutdown timed out"),
        ShutdownOutcome::AlreadyShutdown => {}
    }
    outcome
}

/// Resolves on Ctrl+C or, on Unix, SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
