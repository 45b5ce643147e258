use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::routing::{post, put};
use axum::Router;
use chrono::Utc;
use serde::Deserialize;

use crate::auth::AdminAuthUser;
use crate::extractors::JsonBody;
use crate::practice::OptionLetter;
use crate::response::{created, ok, AppError};
use crate::state::AppState;
use crate::store::operations::questions::{ExplanationSource, Question};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_question))
        .route("/:id", put(update_question).delete(delete_question))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuestionInput {
    prompt: String,
    options: Vec<String>,
    correct_answer: OptionLetter,
    category: String,
    difficulty: u8,
    explanation: Option<String>,
    #[serde(default)]
    key_points: Vec<String>,
}

impl QuestionInput {
    /// 人工填写的解析优先于 AI 生成的解析。
    fn apply_explanation(&self, question: &mut Question) {
        if let Some(text) = self.explanation.as_deref().map(str::trim) {
            if !text.is_empty() {
                question.explanation = Some(text.to_string());
                question.key_points = self.key_points.clone();
                question.explanation_source = Some(ExplanationSource::Human);
            }
        }
    }
}

async fn create_question(
    State(state): State<AppState>,
    admin: AdminAuthUser,
    JsonBody(input): JsonBody<QuestionInput>,
) -> Result<Response, AppError> {
    let mut question = Question::new(
        input.prompt.trim(),
        input.options.iter().map(|o| o.trim().to_string()).collect(),
        input.correct_answer,
        input.category.trim(),
        input.difficulty,
    );
    input.apply_explanation(&mut question);
    state.store().upsert_question(&question)?;

    tracing::info!(admin_id = %admin.admin_id, question_id = %question.id, "Question created");
    Ok(created(question).into_response())
}

async fn update_question(
    State(state): State<AppState>,
    admin: AdminAuthUser,
    Path(id): Path<String>,
    JsonBody(input): JsonBody<QuestionInput>,
) -> Result<Response, AppError> {
    let mut question = state
        .store()
        .get_question(&id)?
        .ok_or_else(|| AppError::not_found("Question not found"))?;

    question.prompt = input.prompt.trim().to_string();
    question.options = input.options.iter().map(|o| o.trim().to_string()).collect();
    question.correct_answer = input.correct_answer;
    question.category = input.category.trim().to_string();
    question.difficulty = input.difficulty;
    input.apply_explanation(&mut question);
    question.updated_at = Utc::now();
    state.store().upsert_question(&question)?;

    tracing::info!(admin_id = %admin.admin_id, question_id = %id, "Question updated");
    Ok(ok(question).into_response())
}

async fn delete_question(
    State(state): State<AppState>,
    admin: AdminAuthUser,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    if !state.store().delete_question(&id)? {
        return Err(AppError::not_found("Question not found"));
    }
    tracing::info!(admin_id = %admin.admin_id, question_id = %id, "Question deleted");
    Ok(ok(serde_json::json!({ "deleted": true, "id": id })).into_response())
}
