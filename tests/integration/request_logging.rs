//! Request/response log pairing and correlation with the request span.

use crate::helpers::*;
use opentelemetry::trace::Status;
use opentelemetry::Value;
use reqwest::StatusCode;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

#[tokio::test]
async fn test_entry_and_exit_records_are_paired() {
    let server = TestServer::start().await;
    let resp = server
        .get_with_headers("/health?probe=1", &[("user-agent", "kube-probe/1.29")])
        .await;
    assert_status(&resp, StatusCode::OK);

    let entries = server.records(">>> GET /health?probe=1");
    let exits = server.records("<<< GET /health?probe=1");
    assert_eq!(entries.len(), 1);
    assert_eq!(exits.len(), 1);

    let entry = &entries[0];
    assert_eq!(entry.fields["method"], "GET");
    assert_eq!(entry.fields["uri"], "/health?probe=1");
    assert_eq!(entry.fields["remote_ip"], "127.0.0.1");
    assert_eq!(entry.fields["headers"]["user-agent"][0], "kube-probe/1.29");

    let exit = &exits[0];
    assert_eq!(exit.fields["status"], 200);
    assert!(exit.fields["latency_ms"].is_number());
    assert!(exit.fields.get("error").is_none());
    assert_eq!(
        exit.fields["headers"]["content-type"][0],
        "application/json"
    );

    server.stop().await;
}

#[tokio::test]
async fn test_records_carry_span_trace_id() {
    let server = TestServer::start().await;
    server.get("/api/championships/7").await;

    let span = server.only_span();
    let trace_id = span.span_context.trace_id().to_string();

    let entry = &server.records(">>> GET /api/championships/7")[0];
    let exit = &server.records("<<< GET /api/championships/7")[0];
    assert_eq!(entry.fields["trace_id"], trace_id.as_str());
    assert_eq!(exit.fields["trace_id"], trace_id.as_str());

    server.stop().await;
}

#[tokio::test]
async fn test_failed_request_logs_error_and_status() {
    let server = TestServer::start().await;
    let resp = server.get("/nowhere").await;
    assert_status(&resp, StatusCode::NOT_FOUND);

    let exit = &server.records("<<< GET /nowhere")[0];
    assert_eq!(exit.fields["status"], 404);
    assert!(exit.fields["error"].is_string());

    server.stop().await;
}

#[tokio::test]
async fn test_each_request_logged_once() {
    let server = TestServer::start().await;
    for _ in 0..3 {
        server.get("/health").await;
    }

    assert_eq!(server.records(">>> GET /health").len(), 3);
    assert_eq!(server.records("<<< GET /health").len(), 3);
    assert_eq!(server.logs.records().len(), 6);

    server.stop().await;
}

#[tokio::test]
async fn test_unreadable_body_is_logged_and_traced() {
    let server = TestServer::start().await;
    let addr = server.base_url.trim_start_matches("http://").to_string();

    let mut stream = TcpStream::connect(&addr).await.unwrap();
    stream
        .write_all(
            b"POST /health HTTP/1.1\r\nHost: localhost\r\n\
              Transfer-Encoding: chunked\r\n\r\nnot-a-chunk-size\r\n",
        )
        .await
        .unwrap();

    let spans = server.wait_for_spans(1).await;
    assert_eq!(spans.len(), 1);
    let span = &spans[0];
    assert_eq!(span.name, "/health");
    assert!(matches!(span.status, Status::Error { .. }));
    assert_eq!(attr(span, "error.type"), Some(Value::from("bad_request")));
    assert_eq!(attr(span, "http.response.status_code"), Some(Value::I64(400)));

    assert_eq!(server.records(">>> POST /health").len(), 1);
    let exits = server.records("<<< POST /health");
    assert_eq!(exits.len(), 1);
    assert_eq!(exits[0].fields["status"], 400);
    assert!(exits[0].fields["error"]
        .as_str()
        .unwrap()
        .contains("unreadable request body"));

    drop(stream);
    server.stop().await;
}
