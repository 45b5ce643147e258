use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use serde::Serialize;

use crate::auth::AuthUser;
use crate::response::{ok, AppError};
use crate::routes::auth::UserProfile;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/me", get(me))
        .route("/me/stats", get(my_stats))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UserStats {
    sessions: u64,
    questions_attempted: u64,
    answered: u64,
    correct: u64,
    accuracy: u32,
    best_score: u32,
    total_score: u64,
    open_wrong_answers: usize,
    mastered_wrong_answers: usize,
    favorites: usize,
}

async fn me(State(state): State<AppState>, auth: AuthUser) -> Result<Response, AppError> {
    let user = state
        .store()
        .get_user_by_id(&auth.user_id)?
        .ok_or_else(|| AppError::not_found("User not found"))?;
    Ok(ok(UserProfile::from(&user)).into_response())
}

async fn my_stats(State(state): State<AppState>, auth: AuthUser) -> Result<Response, AppError> {
    let store = state.store();
    let totals = store.practice_totals(&auth.user_id)?;
    let wrong = store.list_wrong_answers(&auth.user_id, true)?;
    let mastered = wrong.iter().filter(|c| c.mastered).count();

    Ok(ok(UserStats {
        sessions: totals.sessions,
        questions_attempted: totals.questions,
        answered: totals.answered,
        correct: totals.correct,
        accuracy: totals.accuracy(),
        best_score: totals.best_score,
        total_score: totals.total_score,
        open_wrong_answers: wrong.len() - mastered,
        mastered_wrong_answers: mastered,
        favorites: store.list_favorites(&auth.user_id)?.len(),
    })
    .into_response())
}
