use chrono::{DateTime, Utc};
use sled::transaction::{ConflictableTransactionError, TransactionError};

use crate::practice::{PracticeRun, RunStatus};
use crate::store::keys::{self, PRACTICE_RUN_ACTIVE_PREFIX};
use crate::store::{Store, StoreError};

fn tx_error(error: TransactionError<()>) -> StoreError {
    match error {
        TransactionError::Abort(()) => {
            StoreError::Sled(sled::Error::Unsupported("transaction aborted".into()))
        }
        TransactionError::Storage(e) => StoreError::Sled(e),
    }
}

impl Store {
    /// 会话本体与作答中索引在同一事务内更新。
    pub fn save_practice_run(&self, run: &PracticeRun) -> Result<(), StoreError> {
        let key = keys::practice_run_key(&run.id)?.into_bytes();
        let active = keys::practice_run_active_key(&run.id)?.into_bytes();
        let value = Self::serialize(run)?;
        let in_progress = run.status == RunStatus::InProgress;

        self.practice_runs
            .transaction(move |tx| {
                tx.insert(key.as_slice(), value.as_slice())?;
                if in_progress {
                    tx.insert(active.as_slice(), &[] as &[u8])?;
                } else {
                    tx.remove(active.as_slice())?;
                }
                Ok::<(), ConflictableTransactionError<()>>(())
            })
            .map_err(tx_error)
    }

    pub fn get_practice_run(&self, run_id: &str) -> Result<Option<PracticeRun>, StoreError> {
        let key = keys::practice_run_key(run_id)?;
        match self.practice_runs.get(key.as_bytes())? {
            Some(raw) => Ok(Some(Self::deserialize(&raw)?)),
            None => Ok(None),
        }
    }

    /// 仍在作答中的会话 id，只扫描索引前缀。
    pub fn in_progress_run_ids(&self) -> Result<Vec<String>, StoreError> {
        let mut ids = Vec::new();
        for item in self.practice_runs.scan_prefix(PRACTICE_RUN_ACTIVE_PREFIX) {
            let (key, _) = item?;
            match std::str::from_utf8(&key) {
                Ok(key) => {
                    if let Some(id) = key.strip_prefix(PRACTICE_RUN_ACTIVE_PREFIX) {
                        ids.push(id.to_string());
                    }
                }
                Err(e) => tracing::warn!(error = %e, "Skipping malformed active run index key"),
            }
        }
        Ok(ids)
    }

    /// 删除 `cutoff` 之前交卷的会话本体，返回删除数量。
    /// 无法解析的行记录日志后跳过。
    pub fn prune_finished_runs(&self, cutoff: DateTime<Utc>) -> Result<u32, StoreError> {
        let mut stale = Vec::new();
        for item in self.practice_runs.iter() {
            let (key, value) = item?;
            if key.starts_with(PRACTICE_RUN_ACTIVE_PREFIX.as_bytes()) {
                continue;
            }
            let run: PracticeRun = match Self::deserialize(&value) {
                Ok(run) => run,
                Err(e) => {
                    tracing::warn!(
                        key = %String::from_utf8_lossy(&key),
                        error = %e,
                        "Skipping unreadable practice run"
                    );
                    continue;
                }
            };
            let finished_before_cutoff = run.status == RunStatus::Finalized
                && run.finalized_at.is_some_and(|at| at < cutoff);
            if finished_before_cutoff {
                stale.push(key);
            }
        }

        let mut removed = 0;
        for key in stale {
            if self.practice_runs.remove(key)?.is_some() {
                removed += 1;
            }
        }
        Ok(removed)
    }
}
