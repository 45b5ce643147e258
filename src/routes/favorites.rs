use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, put};
use axum::Router;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::auth::AuthUser;
use crate::response::{ok, AppError};
use crate::routes::questions::QuestionView;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_favorites))
        .route("/:question_id", put(add_favorite).delete(remove_favorite))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FavoriteItem {
    question: QuestionView,
    favorited_at: DateTime<Utc>,
}

async fn list_favorites(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Response, AppError> {
    let marks = state.store().list_favorites(&auth.user_id)?;
    let ids: Vec<String> = marks.iter().map(|m| m.question_id.clone()).collect();
    let bank = state.store().question_map(&ids)?;

    // 已删除的题目不再展示
    let items: Vec<FavoriteItem> = marks
        .iter()
        .filter_map(|mark| {
            bank.get(&mark.question_id).map(|q| FavoriteItem {
                question: QuestionView::from(q),
                favorited_at: mark.created_at,
            })
        })
        .collect();
    Ok(ok(items).into_response())
}

async fn add_favorite(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(question_id): Path<String>,
) -> Result<Response, AppError> {
    if state.store().get_question(&question_id)?.is_none() {
        return Err(AppError::not_found("Question not found"));
    }
    state.store().add_favorite(&auth.user_id, &question_id)?;
    Ok(ok(serde_json::json!({ "questionId": question_id, "favorite": true })).into_response())
}

async fn remove_favorite(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(question_id): Path<String>,
) -> Result<Response, AppError> {
    let removed = state.store().remove_favorite(&auth.user_id, &question_id)?;
    Ok(ok(serde_json::json!({
        "questionId": question_id,
        "favorite": false,
        "removed": removed,
    }))
    .into_response())
}
