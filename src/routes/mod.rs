pub mod admin;
pub mod auth;
pub mod favorites;
pub mod health;
pub mod leaderboard;
pub mod practice;
pub mod questions;
pub mod users;
pub mod wrong_answers;

use axum::extract::DefaultBodyLimit;
use axum::response::IntoResponse;
use axum::Router;

use crate::middleware::{rate_limit, request_id};
use crate::response::AppError;
use crate::state::AppState;

/// 请求体上限 2 MiB
const MAX_BODY_SIZE: usize = 2 * 1024 * 1024;

pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .nest("/auth", auth::router())
        .nest("/users", users::router())
        .nest("/questions", questions::router())
        .nest("/practice", practice::router())
        .nest("/favorites", favorites::router())
        .nest("/wrong-answers", wrong_answers::router())
        .nest("/leaderboard", leaderboard::router())
        .nest("/admin", admin::router())
        .layer(DefaultBodyLimit::max(MAX_BODY_SIZE));

    // 限流挂在外层：嵌套路由内看到的是去掉前缀后的路径
    Router::new()
        .nest("/api", api_routes)
        .nest("/health", health::router())
        .fallback(fallback_404)
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            rate_limit::rate_limit_middleware,
        ))
        .layer(axum::middleware::from_fn(request_id::request_id_middleware))
        .with_state(state)
}

async fn fallback_404() -> impl IntoResponse {
    AppError::not_found("Not found")
}
