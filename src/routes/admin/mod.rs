pub mod auth;
pub mod explanations;
pub mod questions;

use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;

use crate::auth::AdminAuthUser;
use crate::response::{ok, AppError};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::router())
        .nest("/questions", questions::router())
        .nest("/explanations", explanations::router())
        .route("/alerts", get(explanations::list_alerts))
        .route("/stats", get(admin_stats))
}

async fn admin_stats(
    State(state): State<AppState>,
    _admin: AdminAuthUser,
) -> Result<Response, AppError> {
    let store = state.store();
    Ok(ok(serde_json::json!({
        "users": store.count_users()?,
        "questions": store.count_questions()?,
        "practiceSessions": store.count_practice_sessions()?,
        "categories": store.list_categories()?,
    }))
    .into_response())
}
