use axum::http::Method;
use axum::Router;

use super::http::{request, response_json};

pub const TEST_PASSWORD: &str = "Passw0rd2030";

/// 注册一个新用户，返回 (token, user_id)。
pub async fn register_user(app: &Router) -> (String, String) {
    let email = format!("user-{}@test.com", uuid::Uuid::new_v4().simple());
    let username = format!("user-{}", &uuid::Uuid::new_v4().simple().to_string()[..12]);

    let response = request(
        app,
        Method::POST,
        "/api/auth/register",
        Some(serde_json::json!({
            "email": email,
            "username": username,
            "password": TEST_PASSWORD,
        })),
        &[],
    )
    .await;

    let (status, _, body) = response_json(response).await;
    assert!(status.is_success(), "register failed: {body}");

    let token = body["data"]["token"]
        .as_str()
        .expect("token in register response")
        .to_string();
    let user_id = body["data"]["user"]["id"]
        .as_str()
        .expect("user id in register response")
        .to_string();
    (token, user_id)
}

pub async fn login_and_get_token(app: &Router) -> String {
    register_user(app).await.0
}

pub fn auth_header(token: &str) -> String {
    format!("Bearer {token}")
}

pub async fn setup_admin_and_get_token(app: &Router) -> String {
    let response = request(
        app,
        Method::POST,
        "/api/admin/auth/setup",
        Some(serde_json::json!({
            "email": format!("admin-{}@test.com", uuid::Uuid::new_v4().simple()),
            "password": "AdminPassw0rd",
        })),
        &[],
    )
    .await;

    let (status, _headers, body) = response_json(response).await;
    assert!(status.is_success(), "admin setup failed: {body}");

    body["data"]["token"]
        .as_str()
        .expect("admin token in setup response")
        .to_string()
}
