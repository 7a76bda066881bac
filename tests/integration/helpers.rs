//! Test helpers and utilities

use std::sync::Arc;
use std::time::Duration;

use championship::config::{ServerConfig, TelemetryConfig};
use championship::lifecycle;
use championship::logging::{LogRecord, Logger, MemorySink};
use championship::observability::Telemetry;
use opentelemetry::Value;
use opentelemetry_sdk::trace::{InMemorySpanExporter, SpanData};
use reqwest::{Client, Response, StatusCode};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// A running in-process server with captured spans and log records.
pub struct TestServer {
    pub base_url: String,
    pub client: Client,
    pub exporter: InMemorySpanExporter,
    pub logs: Arc<MemorySink>,
    pub telemetry: Arc<Telemetry>,
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<bool>>,
}

#[allow(dead_code)]
impl TestServer {
    /// Start a server with default configuration on an ephemeral port.
    pub async fn start() -> Self {
        Self::start_with(ServerConfig::default()).await
    }

    /// Start a server with `config`; the listen address is always replaced.
    pub async fn start_with(config: ServerConfig) -> Self {
        let exporter = InMemorySpanExporter::default();
        Self::start_with_telemetry(config, Arc::new(memory_telemetry(&exporter)), exporter).await
    }

    /// Start a server around an existing tracer provider.
    pub async fn start_with_telemetry(
        config: ServerConfig,
        telemetry: Arc<Telemetry>,
        exporter: InMemorySpanExporter,
    ) -> Self {
        let config = config.with_listen_addr("127.0.0.1:0".parse().unwrap());
        let logs = Arc::new(MemorySink::new());
        let logger = Logger::new(logs.clone(), false);

        let server = lifecycle::build_server(&config, telemetry.clone(), logger)
            .expect("Failed to build server");
        let bound = server.bind().await.expect("Failed to bind");
        let addr = bound.local_addr().expect("No local address");

        let (tx, rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(bound.serve(async {
            let _ = rx.await;
        }));

        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: format!("http://{}", addr),
            client,
            exporter,
            logs,
            telemetry,
            shutdown: Some(tx),
            handle: Some(handle),
        }
    }

    /// Make a GET request to the server
    pub async fn get(&self, path: &str) -> Response {
        self.client
            .get(format!("{}{}", self.base_url, path))
            .send()
            .await
            .expect("GET request failed")
    }

    /// Make a GET request with custom headers
    pub async fn get_with_headers(&self, path: &str, headers: &[(&str, &str)]) -> Response {
        let mut req = self.client.get(format!("{}{}", self.base_url, path));
        for (name, value) in headers {
            req = req.header(*name, *value);
        }
        req.send().await.expect("GET request failed")
    }

    /// Finished spans captured so far.
    pub fn spans(&self) -> Vec<SpanData> {
        self.exporter
            .get_finished_spans()
            .expect("Failed to read spans")
    }

    /// The single finished span, failing if there is not exactly one.
    pub fn only_span(&self) -> SpanData {
        let mut spans = self.spans();
        assert_eq!(spans.len(), 1, "Expected one span, got {:?}", spans);
        spans.remove(0)
    }

    /// Log records with the given message.
    pub fn records(&self, message: &str) -> Vec<LogRecord> {
        self.logs.with_message(message)
    }

    /// Wait until `count` finished spans exist, for requests the client
    /// cannot observe completing.
    pub async fn wait_for_spans(&self, count: usize) -> Vec<SpanData> {
        for _ in 0..100 {
            let spans = self.spans();
            if spans.len() >= count {
                return spans;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("Expected {} spans, got {:?}", count, self.spans());
    }

    /// Stop accepting and drain; returns whether the drain completed in time.
    pub async fn stop(mut self) -> bool {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        match self.handle.take() {
            Some(handle) => handle.await.expect("Server task panicked"),
            None => true,
        }
    }
}

/// Tracer provider exporting synchronously into `exporter`.
pub fn memory_telemetry(exporter: &InMemorySpanExporter) -> Telemetry {
    Telemetry::with_exporter(&test_telemetry_config("http://127.0.0.1:4318"), exporter.clone())
}

/// Telemetry configuration that never touches the global provider.
pub fn test_telemetry_config(endpoint: &str) -> TelemetryConfig {
    let mut config = TelemetryConfig::new(endpoint).expect("Invalid endpoint");
    config.register_global = false;
    config
}

/// Look up a span attribute by key.
pub fn attr(span: &SpanData, key: &str) -> Option<Value> {
    span.attributes
        .iter()
        .find(|kv| kv.key.as_str() == key)
        .map(|kv| kv.value.clone())
}

/// Assert that response has expected status
pub fn assert_status(response: &Response, expected: StatusCode) {
    assert_eq!(
        response.status(),
        expected,
        "Expected status {}, got {}",
        expected,
        response.status()
    );
}

/// Assert that response contains header with prefix
pub fn assert_header_starts_with(response: &Response, name: &str, prefix: &str) {
    let value = response
        .headers()
        .get(name)
        .unwrap_or_else(|| panic!("Header '{}' not found", name))
        .to_str()
        .unwrap();
    assert!(
        value.starts_with(prefix),
        "Header '{}' expected to start with '{}', got '{}'",
        name,
        prefix,
        value
    );
}
