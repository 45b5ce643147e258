use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use serde::{Deserialize, Serialize};

use crate::auth::AuthUser;
use crate::practice::OptionLetter;
use crate::response::{ok, paginated, AppError};
use crate::state::AppState;
use crate::store::operations::questions::{ExplanationSource, Question};
use crate::validation::page_window;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_questions))
        .route("/categories", get(list_categories))
        .route("/:id", get(get_question))
}

/// 作答中展示的题目：不含正确答案与解析。
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionView {
    pub id: String,
    pub prompt: String,
    pub options: Vec<String>,
    pub category: String,
    pub difficulty: u8,
}

impl From<&Question> for QuestionView {
    fn from(q: &Question) -> Self {
        Self {
            id: q.id.clone(),
            prompt: q.prompt.clone(),
            options: q.options.clone(),
            category: q.category.clone(),
            difficulty: q.difficulty,
        }
    }
}

/// 交卷后或错题本中展示的题目，附带答案与解析。
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RevealedQuestion {
    #[serde(flatten)]
    pub question: QuestionView,
    pub correct_answer: OptionLetter,
    pub explanation: Option<String>,
    pub explanation_source: Option<ExplanationSource>,
    pub key_points: Vec<String>,
}

impl From<&Question> for RevealedQuestion {
    fn from(q: &Question) -> Self {
        Self {
            question: QuestionView::from(q),
            correct_answer: q.correct_answer,
            explanation: q.explanation.clone(),
            explanation_source: q.explanation_source,
            key_points: q.key_points.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListQuery {
    category: Option<String>,
    page: Option<u64>,
    per_page: Option<u64>,
}

async fn list_questions(
    State(state): State<AppState>,
    _auth: AuthUser,
    Query(query): Query<ListQuery>,
) -> Result<Response, AppError> {
    let (page, per_page, offset) = page_window(query.page, query.per_page);
    let category = query.category.as_deref().filter(|c| !c.trim().is_empty());
    let (items, total) = state
        .store()
        .list_questions(category, per_page as usize, offset)?;
    let views: Vec<QuestionView> = items.iter().map(QuestionView::from).collect();
    Ok(paginated(views, total, page, per_page).into_response())
}

async fn list_categories(
    State(state): State<AppState>,
    _auth: AuthUser,
) -> Result<Response, AppError> {
    Ok(ok(state.store().list_categories()?).into_response())
}

async fn get_question(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let question = state
        .store()
        .get_question(&id)?
        .ok_or_else(|| AppError::not_found("Question not found"))?;
    Ok(ok(QuestionView::from(&question)).into_response())
}
