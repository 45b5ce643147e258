use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::store::operations::practice_sessions::PracticeSessionRecord;
use crate::store::operations::wrong_answers::WrongAnswerCounter;
use crate::store::{Store, StoreError};

use super::scoring::{self, Graded, PracticeSummary};
use super::{FinalizeTrigger, PracticeError, PracticeRun};

/// 交卷时需要的持久化能力。单独抽出来便于在测试里注入写入失败。
pub trait OutcomeStore {
    fn save_answer_records(
        &self,
        session_id: &str,
        user_id: &str,
        graded: &[Graded],
        answered_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    fn save_completion(&self, record: &PracticeSessionRecord) -> Result<(), StoreError>;

    fn upsert_favorites(&self, user_id: &str, question_ids: &[String]) -> Result<(), StoreError>;

    fn wrong_counter(
        &self,
        user_id: &str,
        question_id: &str,
    ) -> Result<Option<WrongAnswerCounter>, StoreError>;

    fn put_wrong_counter(&self, counter: &WrongAnswerCounter) -> Result<(), StoreError>;
}

impl OutcomeStore for Store {
    fn save_answer_records(
        &self,
        session_id: &str,
        user_id: &str,
        graded: &[Graded],
        answered_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        Store::save_answer_records(self, session_id, user_id, graded, answered_at)
    }

    fn save_completion(&self, record: &PracticeSessionRecord) -> Result<(), StoreError> {
        self.save_practice_session(record)
    }

    fn upsert_favorites(&self, user_id: &str, question_ids: &[String]) -> Result<(), StoreError> {
        self.add_favorites(user_id, question_ids)
    }

    fn wrong_counter(
        &self,
        user_id: &str,
        question_id: &str,
    ) -> Result<Option<WrongAnswerCounter>, StoreError> {
        self.get_wrong_answer(user_id, question_id)
    }

    fn put_wrong_counter(&self, counter: &WrongAnswerCounter) -> Result<(), StoreError> {
        self.put_wrong_answer(counter)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteKind {
    AnswerRecords,
    Completion,
    Favorites,
    WrongCounters,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizeReport {
    pub summary: PracticeSummary,
    pub failed_writes: Vec<WriteKind>,
}

/// 交卷：合并草稿、判分，然后依次尝试各项写入。
///
/// 每项写入相互独立，失败只记日志并写进报告，不影响其余写入，
/// 也不影响返回本地计算好的统计结果。
pub fn finalize_run<S: OutcomeStore + ?Sized>(
    store: &S,
    run: &mut PracticeRun,
    trigger: FinalizeTrigger,
    now: DateTime<Utc>,
) -> Result<FinalizeReport, PracticeError> {
    run.begin_finalize(trigger, now)?;

    let graded = scoring::grade(&run.questions, &run.answers);
    let summary = scoring::summarize(&graded, run.len(), run.duration_secs());
    let completed_at = run.finalized_at.unwrap_or(now);
    let mut failed_writes = Vec::new();

    if let Err(e) = store.save_answer_records(&run.id, &run.user_id, &graded, completed_at) {
        tracing::warn!(session_id = %run.id, error = %e, "Failed to save answer records");
        failed_writes.push(WriteKind::AnswerRecords);
    }

    let record = PracticeSessionRecord::from_run(run, &summary);
    if let Err(e) = store.save_completion(&record) {
        tracing::warn!(session_id = %run.id, error = %e, "Failed to save practice completion");
        failed_writes.push(WriteKind::Completion);
    }

    let favorites: Vec<String> = run.favorites.iter().cloned().collect();
    if !favorites.is_empty() {
        if let Err(e) = store.upsert_favorites(&run.user_id, &favorites) {
            tracing::warn!(session_id = %run.id, error = %e, "Failed to persist favorites");
            failed_writes.push(WriteKind::Favorites);
        }
    }

    let mut counter_failed = false;
    for g in &graded {
        let result = store
            .wrong_counter(&run.user_id, &g.question_id)
            .and_then(|existing| {
                match scoring::next_counter(&run.user_id, existing.as_ref(), g, completed_at) {
                    Some(next) => store.put_wrong_counter(&next),
                    None => Ok(()),
                }
            });
        if let Err(e) = result {
            tracing::warn!(
                session_id = %run.id,
                question_id = %g.question_id,
                error = %e,
                "Failed to update wrong-answer counter"
            );
            counter_failed = true;
        }
    }
    if counter_failed {
        failed_writes.push(WriteKind::WrongCounters);
    }

    run.complete(summary.clone());
    tracing::info!(
        session_id = %run.id,
        user_id = %run.user_id,
        trigger = ?trigger,
        correct = summary.correct_count,
        total = summary.total_questions,
        score = summary.score,
        failed_writes = failed_writes.len(),
        "Practice run finalized"
    );

    Ok(FinalizeReport {
        summary,
        failed_writes,
    })
}
