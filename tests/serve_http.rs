// tests/serve_http.rs
//
// HTTP-level tests for the feed server Router without opening sockets.
// We exercise the router directly via tower::ServiceExt::oneshot.

use axum::{
    body::{self, Body},
    Router,
};
use http::{header, Request, StatusCode};
use serde_json::Value as Json;
use std::path::Path;
use tower::ServiceExt as _; // for `oneshot`

use avalanche_feeds::metrics::Metrics;
use avalanche_feeds::serve::{self, AppState};

const BODY_LIMIT: usize = 1024 * 1024;
const FEED_XML: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<rss version=\"2.0\"></rss>\n";

fn test_router(root: &Path) -> Router {
    let state = AppState::new(root.join("feeds"), root.join("index.html"));
    serve::router(state, &Metrics::detached())
}

async fn get(app: Router, uri: &str) -> (StatusCode, Option<String>, String) {
    let req = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .expect("build request");
    let resp = app.oneshot(req).await.expect("oneshot");
    let status = resp.status();
    let ctype = resp
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body")
        .to_vec();
    (status, ctype, String::from_utf8(bytes).expect("utf8"))
}

#[tokio::test]
async fn health_returns_ok_json() {
    let dir = tempfile::tempdir().unwrap();
    let (status, _, body) = get(test_router(dir.path()), "/health").await;
    assert_eq!(status, StatusCode::OK);
    let v: Json = serde_json::from_str(&body).unwrap();
    assert_eq!(v["status"], "ok");
}

#[tokio::test]
async fn existing_feed_is_served_verbatim() {
    let dir = tempfile::tempdir().unwrap();
    let center = dir.path().join("feeds").join("demo-center");
    std::fs::create_dir_all(&center).unwrap();
    std::fs::write(center.join("demo-zone.xml"), FEED_XML).unwrap();

    let (status, ctype, body) = get(test_router(dir.path()), "/feed/demo-center/demo-zone").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ctype.as_deref(), Some("application/rss+xml"));
    assert_eq!(body, FEED_XML);
}

#[tokio::test]
async fn missing_or_unsafe_feed_is_404() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("secret.xml"), "nope").unwrap();

    let (status, _, _) = get(test_router(dir.path()), "/feed/demo-center/demo-zone").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _, _) = get(test_router(dir.path()), "/feed/../secret").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _, _) = get(test_router(dir.path()), "/feed/%2E%2E/secret").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn index_falls_back_to_placeholder() {
    let dir = tempfile::tempdir().unwrap();
    let (status, ctype, body) = get(test_router(dir.path()), "/").await;
    assert_eq!(status, StatusCode::OK);
    assert!(ctype.unwrap().starts_with("text/html"));
    assert!(body.contains("Index page not yet generated"));

    std::fs::write(dir.path().join("index.html"), "<h1>Feeds</h1>").unwrap();
    let (status, _, body) = get(test_router(dir.path()), "/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "<h1>Feeds</h1>");
}

#[tokio::test]
async fn metrics_route_is_mounted() {
    let dir = tempfile::tempdir().unwrap();
    let (status, _, _) = get(test_router(dir.path()), "/metrics").await;
    assert_eq!(status, StatusCode::OK);
}
