//! Route behaviour: health, championships, unknown routes and methods.

use crate::helpers::*;
use reqwest::StatusCode;
use serde_json::{json, Value};

#[tokio::test]
async fn test_health_reports_up() {
    let server = TestServer::start().await;
    let resp = server.get("/health").await;

    assert_status(&resp, StatusCode::OK);
    assert_header_starts_with(&resp, "content-type", "application/json");
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, json!({"status": "UP"}));

    server.stop().await;
}

#[tokio::test]
async fn test_championship_is_fixed_record() {
    let server = TestServer::start().await;

    for id in ["1", "42", "not-a-number"] {
        let resp = server.get(&format!("/api/championships/{}", id)).await;
        assert_status(&resp, StatusCode::OK);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(
            body,
            json!({"name": "Uefa", "title": "Champions League", "country": "Europe"})
        );
    }

    server.stop().await;
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let server = TestServer::start().await;
    let resp = server.get("/api/teams").await;

    assert_status(&resp, StatusCode::NOT_FOUND);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, json!({"message": "Not Found"}));

    server.stop().await;
}

#[tokio::test]
async fn test_wrong_method_is_rejected() {
    let server = TestServer::start().await;
    let resp = server
        .client
        .post(format!("{}/health", server.base_url))
        .send()
        .await
        .expect("POST request failed");

    assert_status(&resp, StatusCode::METHOD_NOT_ALLOWED);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, json!({"message": "Method Not Allowed"}));

    server.stop().await;
}

#[tokio::test]
async fn test_concurrent_requests() {
    let server = TestServer::start().await;

    let requests = (0..16).map(|i| {
        let client = server.client.clone();
        let url = format!("{}/api/championships/{}", server.base_url, i);
        async move { client.get(url).send().await.map(|r| r.status()) }
    });
    let statuses = futures_util::future::join_all(requests).await;

    for status in statuses {
        assert_eq!(status.unwrap(), StatusCode::OK);
    }
    assert_eq!(server.spans().len(), 16);
    assert_eq!(server.records("<<< GET /api/championships/3").len(), 1);

    server.stop().await;
}
