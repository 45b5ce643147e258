use chrono::Utc;

use crate::practice::locks::RunLocks;
use crate::practice::service::expire_overdue_runs;
use crate::store::Store;

/// 为无人访问、倒计时已归零的练习交卷，并回收空闲的会话锁。
pub async fn run(store: &Store, locks: &RunLocks) {
    match expire_overdue_runs(store, locks, Utc::now()).await {
        Ok(0) => tracing::debug!("practice_timeout: nothing due"),
        Ok(count) => tracing::info!(expired = count, "practice_timeout: done"),
        Err(e) => tracing::error!(error = %e, "practice_timeout failed"),
    }
    let pruned = locks.prune().await;
    if pruned > 0 {
        tracing::debug!(pruned, "practice_timeout: idle run locks dropped");
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use chrono::Duration;

    use super::*;
    use crate::practice::{OptionLetter, PracticeMode, PracticeRun, RunQuestion, RunStatus};

    #[tokio::test]
    async fn overdue_run_is_finalized_with_time_up() {
        let tmp = tempfile::tempdir().unwrap();
        let store = Store::open(tmp.path().join("timeout.sled").to_str().unwrap()).unwrap();
        let locks = RunLocks::new();

        let started = Utc::now() - Duration::seconds(120);
        let run = PracticeRun::start(
            "u1",
            PracticeMode::Random,
            vec![RunQuestion {
                question_id: "q1".into(),
                correct_answer: OptionLetter::A,
            }],
            BTreeSet::new(),
            60,
            started,
        )
        .unwrap();
        store.save_practice_run(&run).unwrap();

        super::run(&store, &locks).await;

        let saved = store.get_practice_run(&run.id).unwrap().unwrap();
        assert_eq!(saved.status, RunStatus::Finalized);
        assert_eq!(saved.remaining_secs, 0);
        assert_eq!(locks.len().await, 0);
    }
}
