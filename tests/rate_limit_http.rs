mod common;

use axum::http::{Method, StatusCode};

use common::app::spawn_test_server_with_limit;
use common::auth::{auth_header, login_and_get_token};
use common::http::{assert_json_error, request, response_json};

#[tokio::test]
async fn it_rate_limit_triggers_429_with_headers() {
    // 注册本身也占用一次配额
    let app = spawn_test_server_with_limit(4).await;
    let token = login_and_get_token(&app.app).await;

    let mut last = None;
    for _ in 0..4 {
        let response = request(
            &app.app,
            Method::GET,
            "/api/users/me",
            None,
            &[("authorization", auth_header(&token))],
        )
        .await;
        last = Some(response_json(response).await);
    }

    let (status, headers, body) = last.unwrap();
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_json_error(&body, "RATE_LIMITED");
    assert!(headers.get("retry-after").is_some());
    assert_eq!(headers.get("ratelimit-limit").unwrap(), "4");
    assert_eq!(headers.get("ratelimit-remaining").unwrap(), "0");
    assert!(headers.get("ratelimit-reset").is_some());
}

#[tokio::test]
async fn it_health_is_not_rate_limited() {
    let app = spawn_test_server_with_limit(1).await;

    for _ in 0..5 {
        let response = request(&app.app, Method::GET, "/health/live", None, &[]).await;
        let (status, headers, _) = response_json(response).await;
        assert_eq!(status, StatusCode::OK);
        assert!(headers.get("ratelimit-limit").is_none());
    }
}
