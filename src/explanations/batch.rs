use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;

use crate::config::ExplainConfig;
use crate::constants::{EXPLAIN_ALERT_FAILURE_RATIO, EXPLAIN_ALERT_MIN_FAILURES};
use crate::services::explainer::ExplanationBackend;
use crate::store::operations::alerts::OperatorAlert;
use crate::store::operations::explanation_jobs::{ExplanationJob, ItemFailure, JobStatus};
use crate::store::operations::questions::{ExplanationSource, Question};
use crate::store::Store;

use super::classify::{classify, FailureKind};

#[derive(Debug, Clone, Copy)]
pub struct BatchConfig {
    pub batch_size: usize,
    pub delay: Duration,
}

impl From<&ExplainConfig> for BatchConfig {
    fn from(config: &ExplainConfig) -> Self {
        Self {
            batch_size: config.batch_size.max(1),
            delay: Duration::from_millis(config.batch_delay_ms),
        }
    }
}

/// 失败数同时超过比例阈值和绝对阈值才告警。
pub fn should_alert(failed: usize, total: usize) -> bool {
    failed as f64 > total as f64 * EXPLAIN_ALERT_FAILURE_RATIO
        && failed >= EXPLAIN_ALERT_MIN_FAILURES
}

async fn explain_one<B: ExplanationBackend>(
    store: &Store,
    backend: &B,
    question_id: &str,
) -> Result<(), ItemFailure> {
    let failure = |kind: FailureKind, message: String| ItemFailure {
        question_id: question_id.to_string(),
        kind,
        message,
    };

    let question: Question = match store.get_question(question_id) {
        Ok(Some(q)) => q,
        Ok(None) => return Err(failure(FailureKind::Unknown, "question not found".into())),
        Err(e) => return Err(failure(FailureKind::Unknown, e.to_string())),
    };

    let generated = backend
        .explain(&question)
        .await
        .map_err(|e| failure(classify(&e), e.to_string()))?;

    store
        .set_question_explanation(
            question_id,
            &generated.explanation,
            &generated.key_points,
            ExplanationSource::Ai,
        )
        .map_err(|e| failure(FailureKind::Unknown, e.to_string()))
}

/// 分批生成解析：批内并发，批间固定间隔；单题失败不影响同批其他题。
/// 每批结束后持久化任务进度，全部完成后最多产生一条告警。
pub async fn run_job<B: ExplanationBackend>(
    store: &Store,
    backend: &B,
    mut job: ExplanationJob,
    config: BatchConfig,
) -> ExplanationJob {
    let ids = job.question_ids.clone();
    let chunks: Vec<&[String]> = ids.chunks(config.batch_size.max(1)).collect();
    tracing::info!(
        job_id = %job.id,
        total = ids.len(),
        batches = chunks.len(),
        "Explanation job started"
    );

    for (index, chunk) in chunks.iter().enumerate() {
        if index > 0 && !config.delay.is_zero() {
            tokio::time::sleep(config.delay).await;
        }

        let results = join_all(chunk.iter().map(|qid| explain_one(store, backend, qid))).await;
        for result in results {
            job.processed += 1;
            match result {
                Ok(()) => job.succeeded += 1,
                Err(failure) => {
                    tracing::warn!(
                        job_id = %job.id,
                        question_id = %failure.question_id,
                        kind = ?failure.kind,
                        error = %failure.message,
                        "Explanation generation failed"
                    );
                    job.failures.push(failure);
                }
            }
        }

        if let Err(e) = store.save_explanation_job(&job) {
            tracing::warn!(job_id = %job.id, error = %e, "Failed to persist job progress");
        }
    }

    let failed = job.failures.len();
    let total = job.total();
    if should_alert(failed, total) {
        let alert = OperatorAlert::explanation_failures(Some(&job.id), failed as u32, total as u32);
        match store.create_alert(&alert) {
            Ok(()) => {
                job.alert_raised = true;
                tracing::error!(job_id = %job.id, failed, total, "Explanation failure threshold exceeded");
            }
            Err(e) => tracing::warn!(job_id = %job.id, error = %e, "Failed to record operator alert"),
        }
    }

    job.status = JobStatus::Completed;
    job.finished_at = Some(Utc::now());
    if let Err(e) = store.save_explanation_job(&job) {
        tracing::warn!(job_id = %job.id, error = %e, "Failed to persist finished job");
    }
    tracing::info!(
        job_id = %job.id,
        succeeded = job.succeeded,
        failed,
        "Explanation job finished"
    );
    job
}
