use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::explanations::classify::FailureKind;
use crate::store::keys;
use crate::store::{Store, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Running,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemFailure {
    pub question_id: String,
    pub kind: FailureKind,
    pub message: String,
}

/// 一次批量生成解析的任务进度。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplanationJob {
    pub id: String,
    pub requested_by: String,
    pub question_ids: Vec<String>,
    pub status: JobStatus,
    pub processed: u32,
    pub succeeded: u32,
    pub failures: Vec<ItemFailure>,
    pub alert_raised: bool,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl ExplanationJob {
    pub fn new(requested_by: &str, question_ids: Vec<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            requested_by: requested_by.to_string(),
            question_ids,
            status: JobStatus::Running,
            processed: 0,
            succeeded: 0,
            failures: Vec::new(),
            alert_raised: false,
            created_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn total(&self) -> usize {
        self.question_ids.len()
    }
}

impl Store {
    pub fn save_explanation_job(&self, job: &ExplanationJob) -> Result<(), StoreError> {
        let key = keys::explanation_job_key(&job.id)?;
        self.explanation_jobs
            .insert(key.as_bytes(), Self::serialize(job)?)?;
        Ok(())
    }

    pub fn get_explanation_job(&self, job_id: &str) -> Result<Option<ExplanationJob>, StoreError> {
        let key = keys::explanation_job_key(job_id)?;
        match self.explanation_jobs.get(key.as_bytes())? {
            Some(raw) => Ok(Some(Self::deserialize(&raw)?)),
            None => Ok(None),
        }
    }

    /// 进程重启后遗留的 Running 任务不会再推进，启动时统一收尾。
    pub fn close_stale_explanation_jobs(&self) -> Result<u32, StoreError> {
        let mut closed = 0u32;
        for item in self.explanation_jobs.iter() {
            let (key, value) = item?;
            let mut job: ExplanationJob = Self::deserialize(&value)?;
            if job.status == JobStatus::Running {
                job.status = JobStatus::Completed;
                job.finished_at = Some(Utc::now());
                self.explanation_jobs
                    .insert(key, Self::serialize(&job)?)?;
                closed += 1;
            }
        }
        Ok(closed)
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn stale_running_jobs_are_closed() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path().join("jobs-db").to_str().unwrap()).unwrap();

        let job = ExplanationJob::new("admin-1", vec!["q1".into(), "q2".into()]);
        store.save_explanation_job(&job).unwrap();
        assert_eq!(store.close_stale_explanation_jobs().unwrap(), 1);

        let loaded = store.get_explanation_job(&job.id).unwrap().unwrap();
        assert_eq!(loaded.status, JobStatus::Completed);
        assert_eq!(loaded.total(), 2);
        assert_eq!(store.close_stale_explanation_jobs().unwrap(), 0);
    }
}
