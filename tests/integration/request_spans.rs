//! Server span lifecycle, trace continuation and error recording.

use crate::helpers::*;
use opentelemetry::trace::{SpanKind, Status, TraceId};
use opentelemetry::Value;
use reqwest::StatusCode;

const TRACEPARENT: &str = "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01";

#[tokio::test]
async fn test_routed_request_opens_server_span() {
    let server = TestServer::start().await;
    server.get("/api/championships/3?expand=true").await;

    let span = server.only_span();
    assert_eq!(span.name, "/api/championships/{id}");
    assert_eq!(span.span_kind, SpanKind::Server);
    assert_eq!(span.status, Status::Unset);
    assert_eq!(attr(&span, "http.request.method"), Some(Value::from("GET")));
    assert_eq!(
        attr(&span, "http.route"),
        Some(Value::from("/api/championships/{id}"))
    );
    assert_eq!(
        attr(&span, "url.path"),
        Some(Value::from("/api/championships/3"))
    );
    assert_eq!(attr(&span, "url.query"), Some(Value::from("expand=true")));
    assert_eq!(attr(&span, "http.response.status_code"), Some(Value::I64(200)));

    server.stop().await;
}

#[tokio::test]
async fn test_traceparent_is_continued() {
    let server = TestServer::start().await;
    server
        .get_with_headers("/health", &[("traceparent", TRACEPARENT)])
        .await;

    let span = server.only_span();
    assert_eq!(
        span.span_context.trace_id(),
        TraceId::from_hex("4bf92f3577b34da6a3ce929d0e0e4736").unwrap()
    );
    assert_eq!(span.parent_span_id.to_string(), "00f067aa0ba902b7");

    let exit = &server.records("<<< GET /health")[0];
    assert_eq!(exit.fields["trace_id"], "4bf92f3577b34da6a3ce929d0e0e4736");

    server.stop().await;
}

#[tokio::test]
async fn test_requests_without_context_start_new_traces() {
    let server = TestServer::start().await;
    server.get("/health").await;
    server.get("/health").await;

    let spans = server.spans();
    assert_eq!(spans.len(), 2);
    assert_ne!(
        spans[0].span_context.trace_id(),
        spans[1].span_context.trace_id()
    );
    assert!(spans.iter().all(|s| !s.span_context.trace_id().to_string().is_empty()));

    server.stop().await;
}

#[tokio::test]
async fn test_unrouted_request_records_error() {
    let server = TestServer::start().await;
    let resp = server.get("/missing").await;
    assert_status(&resp, StatusCode::NOT_FOUND);

    let span = server.only_span();
    assert_eq!(span.name, "HTTP GET");
    assert!(matches!(span.status, Status::Error { .. }));
    assert_eq!(attr(&span, "error.type"), Some(Value::from("not_found")));
    assert_eq!(attr(&span, "http.response.status_code"), Some(Value::I64(404)));
    assert!(attr(&span, "http.route").is_none());

    let exceptions: Vec<_> = span
        .events
        .events
        .iter()
        .filter(|e| e.name == "exception")
        .collect();
    assert_eq!(exceptions.len(), 1);

    server.stop().await;
}

#[tokio::test]
async fn test_static_miss_records_error_on_routed_span() {
    let dir = tempfile::tempdir().unwrap();
    let config = championship::ServerConfig::default().with_static_root(dir.path());
    let server = TestServer::start_with(config).await;

    let resp = server.get("/static/nope.json").await;
    assert_status(&resp, StatusCode::NOT_FOUND);

    let span = server.only_span();
    assert_eq!(span.name, "/static/{*path}");
    assert!(matches!(span.status, Status::Error { .. }));

    server.stop().await;
}
