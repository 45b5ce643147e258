use crate::constants::EXPLAIN_BACKFILL_LIMIT;
use crate::explanations::{run_job, BatchConfig};
use crate::services::explainer::ExplanationBackend;
use crate::store::operations::explanation_jobs::ExplanationJob;
use crate::store::Store;

pub const REQUESTED_BY: &str = "worker";

/// 为缺少解析的题目补生成，每次至多处理固定数量。
pub async fn run<B: ExplanationBackend>(store: &Store, backend: &B, config: BatchConfig) {
    let pending = match store.questions_missing_explanation(EXPLAIN_BACKFILL_LIMIT) {
        Ok(pending) => pending,
        Err(e) => {
            tracing::error!(error = %e, "explanation_backfill: failed to scan questions");
            return;
        }
    };
    if pending.is_empty() {
        tracing::debug!("explanation_backfill: nothing to do");
        return;
    }

    let job = ExplanationJob::new(REQUESTED_BY, pending.into_iter().map(|q| q.id).collect());
    if let Err(e) = store.save_explanation_job(&job) {
        tracing::error!(error = %e, "explanation_backfill: failed to record job");
        return;
    }
    let job = run_job(store, backend, job, config).await;
    tracing::info!(
        job_id = %job.id,
        succeeded = job.succeeded,
        failed = job.failures.len(),
        "explanation_backfill: done"
    );
}
