use chrono::{Duration, Utc};

use crate::constants::FINISHED_RUN_RETENTION_DAYS;
use crate::store::Store;

/// 清理过期的登录会话（用户与管理员），并删除超过保留期的已交卷练习会话本体。
pub async fn run(store: &Store) {
    tracing::debug!("session_cleanup: start");
    match store.cleanup_expired_sessions() {
        Ok(count) => tracing::info!(cleaned = count, "session_cleanup: done"),
        Err(e) => tracing::error!(error = %e, "session_cleanup failed"),
    }

    let cutoff = Utc::now() - Duration::days(FINISHED_RUN_RETENTION_DAYS);
    match store.prune_finished_runs(cutoff) {
        Ok(0) => {}
        Ok(count) => tracing::info!(pruned = count, "session_cleanup: finished practice runs pruned"),
        Err(e) => tracing::error!(error = %e, "session_cleanup: practice run pruning failed"),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;
    use crate::practice::{OptionLetter, PracticeMode, PracticeRun, RunQuestion, RunStatus};
    use crate::store::operations::sessions::AuthSession;

    #[tokio::test]
    async fn expired_sessions_are_removed() {
        let tmp = tempfile::tempdir().unwrap();
        let store = Store::open(tmp.path().join("cleanup.sled").to_str().unwrap()).unwrap();
        let now = Utc::now();
        let session = |hash: &str, expires_at| AuthSession {
            token_hash: hash.to_string(),
            user_id: "u1".to_string(),
            created_at: now - Duration::hours(2),
            expires_at,
        };
        store
            .create_session(&session("stale", now - Duration::minutes(1)))
            .unwrap();
        store
            .create_session(&session("live", now + Duration::hours(1)))
            .unwrap();

        run(&store).await;

        assert!(store.get_session("live").unwrap().is_some());
        // 过期会话的主记录与用户索引一并删除
        assert_eq!(store.sessions.len(), 2);
    }

    #[tokio::test]
    async fn old_finished_runs_are_pruned() {
        let tmp = tempfile::tempdir().unwrap();
        let store = Store::open(tmp.path().join("cleanup2.sled").to_str().unwrap()).unwrap();
        let long_ago = Utc::now() - Duration::days(FINISHED_RUN_RETENTION_DAYS + 1);

        let mut run = PracticeRun::start(
            "u1",
            PracticeMode::Random,
            vec![RunQuestion {
                question_id: "q1".into(),
                correct_answer: OptionLetter::A,
            }],
            BTreeSet::new(),
            60,
            long_ago,
        )
        .unwrap();
        run.status = RunStatus::Finalized;
        run.finalized_at = Some(long_ago);
        store.save_practice_run(&run).unwrap();

        super::run(&store).await;

        assert!(store.get_practice_run(&run.id).unwrap().is_none());
    }
}
