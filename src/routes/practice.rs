use std::collections::HashMap;

use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::AuthUser;
use crate::extractors::JsonBody;
use crate::practice::finalize::{FinalizeReport, WriteKind};
use crate::practice::service::{self, EventOutcome, FavoriteOutcome, FavoriteToggle, RunEvent};
use crate::practice::{
    OptionLetter, PracticeError, PracticeMode, PracticeRun, PracticeSummary, RunStatus,
};
use crate::response::{created, ok, paginated, AppError};
use crate::routes::questions::{QuestionView, RevealedQuestion};
use crate::state::AppState;
use crate::store::operations::practice_sessions::{AnswerRecord, PracticeSessionRecord};
use crate::store::operations::questions::Question;
use crate::validation::page_window;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/sessions", post(start_session))
        .route("/sessions/:id", get(get_session))
        .route("/sessions/:id/answer", post(select_answer))
        .route("/sessions/:id/advance", post(advance))
        .route("/sessions/:id/retreat", post(retreat))
        .route("/sessions/:id/submit", post(submit))
        .route("/sessions/:id/favorite", post(toggle_favorite))
        .route("/history", get(list_history))
        .route("/history/:id", get(get_history))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartRequest {
    mode: PracticeMode,
    count: Option<usize>,
    category: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnswerRequest {
    answer: OptionLetter,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FavoriteRequest {
    question_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HistoryQuery {
    page: Option<u64>,
    per_page: Option<u64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CurrentQuestion {
    position: usize,
    question_id: String,
    selected: Option<OptionLetter>,
    favorite: bool,
    is_last: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ResultItem {
    question: RevealedQuestion,
    selected: Option<OptionLetter>,
    is_correct: bool,
}

/// 会话的对外视图。正确答案和解析只在交卷完成后出现在 `results` 中。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SessionView {
    id: String,
    mode: PracticeMode,
    status: RunStatus,
    total_questions: usize,
    answered: usize,
    time_budget_secs: u32,
    remaining_secs: u32,
    expires_at: DateTime<Utc>,
    started_at: DateTime<Utc>,
    current: Option<CurrentQuestion>,
    questions: Vec<QuestionView>,
    favorites: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<PracticeSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    results: Option<Vec<ResultItem>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    failed_writes: Vec<WriteKind>,
}

impl SessionView {
    fn build(
        run: &PracticeRun,
        report: Option<&FinalizeReport>,
        bank: &HashMap<String, Question>,
    ) -> Self {
        let finalized = run.status == RunStatus::Finalized;
        let questions = run
            .questions
            .iter()
            .filter_map(|rq| bank.get(&rq.question_id))
            .map(QuestionView::from)
            .collect();

        let current = (!finalized).then(|| {
            let rq = run.current();
            CurrentQuestion {
                position: run.position,
                question_id: rq.question_id.clone(),
                selected: run.draft,
                favorite: run.is_favorite(&rq.question_id),
                is_last: run.is_last(),
            }
        });

        let results = finalized.then(|| {
            run.questions
                .iter()
                .filter_map(|rq| {
                    let question = bank.get(&rq.question_id)?;
                    let selected = run.answers.get(&rq.question_id).copied();
                    Some(ResultItem {
                        question: RevealedQuestion::from(question),
                        selected,
                        is_correct: selected == Some(rq.correct_answer),
                    })
                })
                .collect()
        });

        Self {
            id: run.id.clone(),
            mode: run.mode,
            status: run.status,
            total_questions: run.len(),
            answered: run.answers.len(),
            time_budget_secs: run.time_budget_secs,
            remaining_secs: run.remaining_secs,
            expires_at: run.expires_at(),
            started_at: run.started_at,
            current,
            questions,
            favorites: run.favorites.iter().cloned().collect(),
            summary: run.summary.clone(),
            results,
            failed_writes: report.map(|r| r.failed_writes.clone()).unwrap_or_default(),
        }
    }
}

fn render(state: &AppState, outcome: &EventOutcome) -> Result<SessionView, AppError> {
    let bank = state.store().question_map(&outcome.run.question_ids())?;
    Ok(SessionView::build(&outcome.run, outcome.report.as_ref(), &bank))
}

#[derive(Debug, Serialize)]
struct EmptyStart {
    empty: bool,
    mode: PracticeMode,
}

async fn start_session(
    State(state): State<AppState>,
    auth: AuthUser,
    JsonBody(req): JsonBody<StartRequest>,
) -> Result<Response, AppError> {
    let started = service::start_run(
        state.store(),
        &state.config().practice,
        &auth.user_id,
        req.mode,
        req.count,
        req.category.as_deref(),
        Utc::now(),
    );
    // 无题可练：返回空状态，不创建会话
    let (run, questions) = match started {
        Err(PracticeError::NoContent) => {
            return Ok(ok(EmptyStart {
                empty: true,
                mode: req.mode,
            })
            .into_response())
        }
        other => other?,
    };
    let bank: HashMap<String, Question> =
        questions.into_iter().map(|q| (q.id.clone(), q)).collect();
    Ok(created(SessionView::build(&run, None, &bank)).into_response())
}

async fn get_session(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let outcome = service::load_run(
        state.store(),
        state.run_locks(),
        &id,
        &auth.user_id,
        Utc::now(),
    )
    .await?;
    Ok(ok(render(&state, &outcome)?).into_response())
}

async fn dispatch(
    state: &AppState,
    auth: &AuthUser,
    id: &str,
    event: RunEvent,
) -> Result<Response, AppError> {
    let outcome = service::apply_event(
        state.store(),
        state.run_locks(),
        id,
        &auth.user_id,
        event,
        Utc::now(),
    )
    .await?;
    Ok(ok(render(state, &outcome)?).into_response())
}

async fn select_answer(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
    JsonBody(req): JsonBody<AnswerRequest>,
) -> Result<Response, AppError> {
    dispatch(&state, &auth, &id, RunEvent::Select(req.answer)).await
}

async fn advance(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    dispatch(&state, &auth, &id, RunEvent::Advance).await
}

async fn retreat(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    dispatch(&state, &auth, &id, RunEvent::Retreat).await
}

async fn submit(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    dispatch(&state, &auth, &id, RunEvent::Submit).await
}

/// 收藏切换结果。倒计时恰好到期时不切换收藏，改为返回交卷后的会话。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FavoriteResponse {
    #[serde(flatten)]
    outcome: Option<FavoriteOutcome>,
    session_status: RunStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    session: Option<SessionView>,
}

async fn toggle_favorite(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
    JsonBody(req): JsonBody<FavoriteRequest>,
) -> Result<Response, AppError> {
    let toggle = service::toggle_favorite(
        state.store(),
        state.run_locks(),
        &id,
        &auth.user_id,
        req.question_id.trim(),
        Utc::now(),
    )
    .await?;

    let response = match toggle {
        FavoriteToggle::Applied { run, outcome } => FavoriteResponse {
            outcome: Some(outcome),
            session_status: run.status,
            session: None,
        },
        FavoriteToggle::Finalized(finalized) => FavoriteResponse {
            outcome: None,
            session_status: finalized.run.status,
            session: Some(render(&state, &finalized)?),
        },
    };
    Ok(ok(response).into_response())
}

async fn list_history(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<HistoryQuery>,
) -> Result<Response, AppError> {
    let (page, per_page, offset) = page_window(query.page, query.per_page);
    let (records, total) =
        state
            .store()
            .list_practice_sessions(&auth.user_id, per_page as usize, offset)?;
    Ok(paginated(records, total, page, per_page).into_response())
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HistoryDetail {
    session: PracticeSessionRecord,
    answers: Vec<AnswerRecord>,
}

async fn get_history(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let session = state
        .store()
        .get_practice_session(&auth.user_id, &id)?
        .ok_or_else(|| AppError::not_found("Practice record not found"))?;
    let answers = state.store().list_answer_records(&session.id)?;
    Ok(ok(HistoryDetail { session, answers }).into_response())
}
