//! Startup failures and the ordered stop: listener, drain, tracer flush.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use championship::config::{ConfigError, TelemetryConfig};
use championship::lifecycle::{self, StartupError};
use championship::logging::Logger;
use championship::observability::{ShutdownOutcome, Telemetry, TelemetryState};
use championship::ServerConfig;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper::Method;
use hyper_util::rt::TokioIo;
use opentelemetry_sdk::trace::InMemorySpanExporter;
use reqwest::StatusCode;
use tokio::net::TcpListener;

use crate::helpers::*;

/// Minimal OTLP/HTTP receiver counting trace export requests.
async fn start_collector(exports: Arc<AtomicUsize>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let exports = exports.clone();
            tokio::spawn(async move {
                let service = service_fn(move |req: hyper::Request<Incoming>| {
                    let exports = exports.clone();
                    async move {
                        let is_export =
                            req.method() == Method::POST && req.uri().path() == "/v1/traces";
                        let _ = req.into_body().collect().await;
                        if is_export {
                            exports.fetch_add(1, Ordering::SeqCst);
                        }
                        Ok::<_, Infallible>(hyper::Response::new(Full::new(Bytes::new())))
                    }
                });
                let _ = hyper::server::conn::http1::Builder::new()
                    .serve_connection(TokioIo::new(stream), service)
                    .await;
            });
        }
    });

    addr
}

#[test]
fn test_collector_endpoint_must_be_url() {
    assert!(matches!(
        TelemetryConfig::new("jaeger:4318"),
        Err(ConfigError::Invalid { .. })
    ));
    assert!(matches!(
        TelemetryConfig::new("ftp://jaeger:4318"),
        Err(ConfigError::Invalid { .. })
    ));

    let config = TelemetryConfig::new("http://jaeger:4318").unwrap();
    assert_eq!(config.endpoint, "http://jaeger:4318/v1/traces");
}

#[tokio::test]
async fn test_bind_failure_is_fatal() {
    let occupied = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let config = ServerConfig::default().with_listen_addr(occupied.local_addr().unwrap());
    let telemetry = Arc::new(memory_telemetry(&InMemorySpanExporter::default()));

    let err = lifecycle::run(
        &config,
        telemetry.clone(),
        Logger::disabled(),
        std::future::pending(),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, StartupError::Bind { .. }));
    assert_eq!(telemetry.state(), TelemetryState::Shutdown);
}

#[tokio::test]
async fn test_stop_refuses_new_connections() {
    let server = TestServer::start().await;
    let base_url = server.base_url.clone();

    let resp = server.get("/health").await;
    assert_status(&resp, StatusCode::OK);
    drop(resp);

    assert!(server.stop().await);

    let result = reqwest::Client::new()
        .get(format!("{}/health", base_url))
        .timeout(Duration::from_secs(2))
        .send()
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_run_returns_after_shutdown_signal() {
    let exporter = InMemorySpanExporter::default();
    let telemetry = Arc::new(memory_telemetry(&exporter));
    let config = ServerConfig::default().with_listen_addr("127.0.0.1:0".parse().unwrap());

    let result = tokio::time::timeout(
        Duration::from_secs(10),
        lifecycle::run(&config, telemetry.clone(), Logger::disabled(), async {}),
    )
    .await
    .expect("run did not return after shutdown");

    assert!(result.is_ok());
    assert_eq!(telemetry.state(), TelemetryState::Shutdown);
    assert_eq!(
        lifecycle::shutdown_tracer(&telemetry).await,
        ShutdownOutcome::AlreadyShutdown
    );
}

// The OTLP exporter owns a blocking HTTP client, so the provider is built
// outside the runtime the same way the binary does it.
#[test]
fn test_shutdown_flushes_spans_to_collector() {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .unwrap();

    let exports = Arc::new(AtomicUsize::new(0));
    let addr = runtime.block_on(start_collector(exports.clone()));

    let mut config = test_telemetry_config(&format!("http://{}", addr));
    config.scheduled_delay = Duration::from_secs(60);
    config.export_timeout = Duration::from_secs(5);
    let telemetry = Arc::new(Telemetry::init(&config).expect("Failed to init telemetry"));

    runtime.block_on(async {
        let server = TestServer::start_with_telemetry(
            ServerConfig::default(),
            telemetry.clone(),
            InMemorySpanExporter::default(),
        )
        .await;

        let resp = server.get("/api/championships/1").await;
        assert_status(&resp, StatusCode::OK);
        assert_eq!(exports.load(Ordering::SeqCst), 0);

        assert!(server.stop().await);
        assert_eq!(
            lifecycle::shutdown_tracer(&telemetry).await,
            ShutdownOutcome::Flushed
        );
    });

    assert!(exports.load(Ordering::SeqCst) >= 1);
    assert_eq!(telemetry.state(), TelemetryState::Shutdown);
}
