//! Static documentation serving.

use crate::helpers::*;
use championship::ServerConfig;
use reqwest::StatusCode;

fn docs_root() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("swagger.json"),
        r#"{"openapi":"3.0.0","info":{"title":"Championships"}}"#,
    )
    .unwrap();
    std::fs::create_dir(dir.path().join("ui")).unwrap();
    std::fs::write(dir.path().join("ui").join("index.html"), "<html>docs</html>").unwrap();
    dir
}

#[tokio::test]
async fn test_serves_swagger_document() {
    let dir = docs_root();
    let server = TestServer::start_with(ServerConfig::default().with_static_root(dir.path())).await;

    let resp = server.get("/static/swagger.json").await;
    assert_status(&resp, StatusCode::OK);
    assert_header_starts_with(&resp, "content-type", "application/json");
    let body = resp.text().await.unwrap();
    assert!(body.contains("Championships"));

    server.stop().await;
}

#[tokio::test]
async fn test_directory_serves_index() {
    let dir = docs_root();
    let server = TestServer::start_with(ServerConfig::default().with_static_root(dir.path())).await;

    let resp = server.get("/static/ui/").await;
    assert_status(&resp, StatusCode::OK);
    assert_header_starts_with(&resp, "content-type", "text/html");
    assert_eq!(resp.text().await.unwrap(), "<html>docs</html>");

    server.stop().await;
}

#[tokio::test]
async fn test_missing_file_is_not_found() {
    let dir = docs_root();
    let server = TestServer::start_with(ServerConfig::default().with_static_root(dir.path())).await;

    let resp = server.get("/static/missing.css").await;
    assert_status(&resp, StatusCode::NOT_FOUND);

    server.stop().await;
}

#[tokio::test]
async fn test_encoded_traversal_is_rejected() {
    let outer = tempfile::tempdir().unwrap();
    std::fs::write(outer.path().join("secret.txt"), "secret").unwrap();
    let docs = outer.path().join("docs");
    std::fs::create_dir(&docs).unwrap();

    let server = TestServer::start_with(ServerConfig::default().with_static_root(&docs)).await;

    let resp = server.get("/static/%2E%2E/secret.txt").await;
    assert_status(&resp, StatusCode::NOT_FOUND);

    server.stop().await;
}
