mod common;

use axum::http::{Method, StatusCode};

use common::app::spawn_test_server;
use common::http::{assert_json_error, request, response_json};

#[tokio::test]
async fn it_health_live_and_ready() {
    let app = spawn_test_server().await;

    let live = request(&app.app, Method::GET, "/health/live", None, &[]).await;
    let (live_status, _, _) = response_json(live).await;
    assert_eq!(live_status, StatusCode::OK);

    let ready = request(&app.app, Method::GET, "/health/ready", None, &[]).await;
    let (ready_status, _, _) = response_json(ready).await;
    assert_eq!(ready_status, StatusCode::OK);
}

#[tokio::test]
async fn it_health_reports_store_and_llm() {
    let app = spawn_test_server().await;

    let db = request(&app.app, Method::GET, "/health/database", None, &[]).await;
    let (status, _, body) = response_json(db).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["healthy"], true);

    let root = request(&app.app, Method::GET, "/health", None, &[]).await;
    let (status, headers, body) = response_json(root).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["llm"]["enabled"], false);
    assert!(headers.get("x-request-id").is_some());
}

#[tokio::test]
async fn it_unknown_route_returns_json_404_with_trace_id() {
    let app = spawn_test_server().await;

    let response = request(&app.app, Method::GET, "/api/nope", None, &[]).await;
    let (status, headers, body) = response_json(response).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_json_error(&body, "NOT_FOUND");
    assert_eq!(
        body["traceId"].as_str(),
        headers.get("x-request-id").and_then(|v| v.to_str().ok())
    );
}
