use std::collections::BTreeSet;

use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::Deserialize;

use crate::auth::AdminAuthUser;
use crate::constants::MAX_PAGE_SIZE;
use crate::explanations::{run_job, BatchConfig};
use crate::extractors::JsonBody;
use crate::response::{accepted, ok, AppError};
use crate::state::AppState;
use crate::store::operations::explanation_jobs::ExplanationJob;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/batch", post(start_batch))
        .route("/jobs/:id", get(get_job))
        .route("/alerts", get(list_alerts))
        .route("/stats", get(explanation_stats))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BatchRequest {
    #[serde(default)]
    question_ids: Vec<String>,
    #[serde(default)]
    only_missing: bool,
}

#[derive(Debug, Deserialize)]
pub struct AlertQuery {
    limit: Option<usize>,
}

/// 去重并保持首次出现的顺序。
fn dedup_ids(ids: Vec<String>) -> Vec<String> {
    let mut seen = BTreeSet::new();
    ids.into_iter()
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty() && seen.insert(id.clone()))
        .collect()
}

/// 受理后立即返回 202，生成在后台任务中进行；进度通过 `/jobs/:id` 查询。
async fn start_batch(
    State(state): State<AppState>,
    admin: AdminAuthUser,
    JsonBody(req): JsonBody<BatchRequest>,
) -> Result<Response, AppError> {
    if !state.explainer().is_enabled() {
        return Err(AppError::bad_request(
            "EXPLAIN_DISABLED",
            "AI explanation generation is disabled",
        ));
    }

    let store = state.store_arc();
    let ids = if req.only_missing {
        store
            .questions_missing_explanation(usize::MAX)?
            .into_iter()
            .map(|q| q.id)
            .collect()
    } else {
        dedup_ids(req.question_ids)
    };
    if ids.is_empty() {
        return Err(AppError::bad_request(
            "EXPLAIN_EMPTY_BATCH",
            "No questions selected for explanation",
        ));
    }

    let job = ExplanationJob::new(&admin.admin_id, ids);
    store.save_explanation_job(&job)?;
    tracing::info!(
        admin_id = %admin.admin_id,
        job_id = %job.id,
        total = job.total(),
        "Explanation batch accepted"
    );

    let explainer = state.explainer().clone();
    let config = BatchConfig::from(&state.config().explain);
    let pending = job.clone();
    tokio::spawn(async move {
        run_job(store.as_ref(), explainer.as_ref(), pending, config).await;
    });

    Ok(accepted(job).into_response())
}

async fn get_job(
    State(state): State<AppState>,
    _admin: AdminAuthUser,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    let job = state
        .store()
        .get_explanation_job(&id)?
        .ok_or_else(|| AppError::not_found("Explanation job not found"))?;
    Ok(ok(job).into_response())
}

pub async fn list_alerts(
    State(state): State<AppState>,
    _admin: AdminAuthUser,
    Query(query): Query<AlertQuery>,
) -> Result<Response, AppError> {
    let limit = query.limit.unwrap_or(20).clamp(1, MAX_PAGE_SIZE as usize);
    Ok(ok(state.store().list_alerts(limit)?).into_response())
}

async fn explanation_stats(
    State(state): State<AppState>,
    _admin: AdminAuthUser,
) -> Result<Response, AppError> {
    let store = state.store();
    let total = store.count_questions()?;
    let missing = store.questions_missing_explanation(usize::MAX)?.len();
    Ok(ok(serde_json::json!({
        "questions": total,
        "withExplanation": total.saturating_sub(missing),
        "missingExplanation": missing,
        "llmEnabled": state.explainer().is_enabled(),
    }))
    .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedup_keeps_first_occurrence_order() {
        let ids = vec![
            "q2".to_string(),
            " q1 ".to_string(),
            "q2".to_string(),
            "".to_string(),
            "q3".to_string(),
        ];
        assert_eq!(dedup_ids(ids), vec!["q2", "q1", "q3"]);
    }
}
