use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::AuthUser;
use crate::response::{ok, AppError};
use crate::routes::questions::RevealedQuestion;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(list_wrong_answers))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WrongAnswerQuery {
    #[serde(default)]
    include_mastered: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WrongAnswerItem {
    question: RevealedQuestion,
    wrong_count: u32,
    mastered: bool,
    last_wrong_at: DateTime<Utc>,
}

/// 错题本条目附带答案与解析，供复习使用。
async fn list_wrong_answers(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<WrongAnswerQuery>,
) -> Result<Response, AppError> {
    let counters = state
        .store()
        .list_wrong_answers(&auth.user_id, query.include_mastered)?;
    let ids: Vec<String> = counters.iter().map(|c| c.question_id.clone()).collect();
    let bank = state.store().question_map(&ids)?;

    let items: Vec<WrongAnswerItem> = counters
        .iter()
        .filter_map(|counter| {
            bank.get(&counter.question_id).map(|q| WrongAnswerItem {
                question: RevealedQuestion::from(q),
                wrong_count: counter.wrong_count,
                mastered: counter.mastered,
                last_wrong_at: counter.last_wrong_at,
            })
        })
        .collect();
    Ok(ok(items).into_response())
}
