use std::sync::Arc;

use meshwatch_core::timers::IterationTimers;
use meshwatch_server::debug_server;
use tokio::sync::RwLock;
use tower::ServiceExt;

#[tokio::test]
async fn healthz_reports_ok() {
    let published = Arc::new(RwLock::new(Vec::new()));
    let app = debug_server::router(published, IterationTimers::new());

    let response = app
        .oneshot(axum::http::Request::builder().uri("/healthz").body(axum::body::Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), axum::http::StatusCode::OK);
}

#[tokio::test]
async fn snapshot_is_unavailable_before_first_publish() {
    let published = Arc::new(RwLock::new(Vec::new()));
    let app = debug_server::router(published, IterationTimers::new());

    let response = app
        .oneshot(axum::http::Request::builder().uri("/debug/snapshot").body(axum::body::Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), axum::http::StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn snapshot_is_served_once_published() {
    let published = Arc::new(RwLock::new(b"{\"cluster\":{}}".to_vec()));
    let app = debug_server::router(published, IterationTimers::new());

    let response = app
        .oneshot(axum::http::Request::builder().uri("/debug/snapshot").body(axum::body::Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), axum::http::StatusCode::OK);
}
