//! 服务端驱动练习会话：加锁读取、补齐倒计时、应用事件、落库。
//!
//! 倒计时按墙钟懒惰推进：每次事件先 `catch_up`，归零即以 `TimeUp` 交卷；
//! 无人访问的会话由 `practice_timeout` 任务调用 [`expire_overdue_runs`] 收尾。

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::PracticeConfig;
use crate::store::operations::questions::Question;
use crate::store::{Store, StoreError};

use super::finalize::{finalize_run, FinalizeReport};
use super::locks::RunLocks;
use super::run::{Advance, PracticeRun, RunQuestion, Tick};
use super::{FinalizeTrigger, OptionLetter, PracticeError, PracticeMode};

#[derive(Debug, Clone, Copy)]
pub enum RunEvent {
    Select(OptionLetter),
    Advance,
    Retreat,
    Submit,
}

#[derive(Debug, Clone)]
pub struct EventOutcome {
    pub run: PracticeRun,
    pub report: Option<FinalizeReport>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FavoriteOutcome {
    pub question_id: String,
    pub favorite: bool,
    pub persisted: bool,
}

/// 按模式挑选题目，数量超过上限时截断。
pub fn select_questions(
    store: &Store,
    user_id: &str,
    mode: PracticeMode,
    count: usize,
    category: Option<&str>,
) -> Result<Vec<Question>, PracticeError> {
    let questions = match mode {
        PracticeMode::Random => store.random_questions(count, None)?,
        PracticeMode::Category => {
            let category = category
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .ok_or_else(|| PracticeError::InvalidRequest("category is required".into()))?;
            store.random_questions(count, Some(category))?
        }
        PracticeMode::Favorites => {
            let ids: Vec<String> = store
                .list_favorites(user_id)?
                .into_iter()
                .map(|mark| mark.question_id)
                .collect();
            let mut picked = store.get_questions_batch(&ids)?;
            picked.truncate(count);
            picked
        }
        PracticeMode::WrongAnswers => {
            let ids: Vec<String> = store
                .list_wrong_answers(user_id, false)?
                .into_iter()
                .map(|counter| counter.question_id)
                .collect();
            let mut picked = store.get_questions_batch(&ids)?;
            picked.truncate(count);
            picked
        }
    };
    Ok(questions)
}

pub fn start_run(
    store: &Store,
    config: &PracticeConfig,
    user_id: &str,
    mode: PracticeMode,
    count: Option<usize>,
    category: Option<&str>,
    now: DateTime<Utc>,
) -> Result<(PracticeRun, Vec<Question>), PracticeError> {
    let count = count
        .unwrap_or(config.default_size)
        .clamp(1, config.max_size.max(1));
    let questions = select_questions(store, user_id, mode, count, category)?;
    let snapshot: Vec<RunQuestion> = questions
        .iter()
        .map(|q| RunQuestion {
            question_id: q.id.clone(),
            correct_answer: q.correct_answer,
        })
        .collect();

    let run = PracticeRun::start(
        user_id,
        mode,
        snapshot,
        store.favorite_ids(user_id)?,
        config.time_budget_secs,
        now,
    )?;
    store.save_practice_run(&run)?;

    tracing::info!(
        session_id = %run.id,
        user_id = %user_id,
        mode = ?mode,
        questions = run.len(),
        "Practice run started"
    );
    Ok((run, questions))
}

fn load_owned(store: &Store, run_id: &str, user_id: &str) -> Result<PracticeRun, PracticeError> {
    let run = store
        .get_practice_run(run_id)?
        .ok_or_else(|| PracticeError::RunNotFound(run_id.to_string()))?;
    if run.user_id != user_id {
        return Err(PracticeError::NotOwner);
    }
    Ok(run)
}

/// 补齐倒计时；到期则以 `TimeUp` 交卷。返回交卷报告（若发生）。
fn settle_clock(
    store: &Store,
    run: &mut PracticeRun,
    now: DateTime<Utc>,
) -> Result<Option<FinalizeReport>, PracticeError> {
    match run.catch_up(now) {
        Tick::Expired => Ok(Some(finalize_run(store, run, FinalizeTrigger::TimeUp, now)?)),
        Tick::Running { .. } | Tick::Idle => Ok(None),
    }
}

/// 读取会话当前状态（会推进倒计时）。
pub async fn load_run(
    store: &Store,
    locks: &RunLocks,
    run_id: &str,
    user_id: &str,
    now: DateTime<Utc>,
) -> Result<EventOutcome, PracticeError> {
    let _guard = locks.acquire(run_id).await;
    let mut run = load_owned(store, run_id, user_id)?;
    let report = settle_clock(store, &mut run, now)?;
    store.save_practice_run(&run)?;
    Ok(EventOutcome { run, report })
}

/// 应用一次用户事件。倒计时已到期时直接交卷并返回结果，不再应用该事件。
pub async fn apply_event(
    store: &Store,
    locks: &RunLocks,
    run_id: &str,
    user_id: &str,
    event: RunEvent,
    now: DateTime<Utc>,
) -> Result<EventOutcome, PracticeError> {
    let _guard = locks.acquire(run_id).await;
    let mut run = load_owned(store, run_id, user_id)?;

    if let Some(report) = settle_clock(store, &mut run, now)? {
        store.save_practice_run(&run)?;
        return Ok(EventOutcome {
            run,
            report: Some(report),
        });
    }

    let report = match event {
        RunEvent::Select(letter) => {
            run.select_answer(letter)?;
            None
        }
        RunEvent::Advance => match run.advance()? {
            Advance::Moved { .. } => None,
            Advance::Finish => Some(finalize_run(
                store,
                &mut run,
                FinalizeTrigger::LastQuestion,
                now,
            )?),
        },
        RunEvent::Retreat => {
            run.retreat()?;
            None
        }
        RunEvent::Submit => Some(finalize_run(
            store,
            &mut run,
            FinalizeTrigger::Submitted,
            now,
        )?),
    };

    store.save_practice_run(&run)?;
    Ok(EventOutcome { run, report })
}

/// 收藏标记的持久化。单独抽出来便于在测试里注入写入失败。
pub trait FavoriteWriter {
    fn write_favorite(&self, user_id: &str, question_id: &str, favorite: bool)
        -> Result<(), StoreError>;
}

impl FavoriteWriter for Store {
    fn write_favorite(
        &self,
        user_id: &str,
        question_id: &str,
        favorite: bool,
    ) -> Result<(), StoreError> {
        if favorite {
            self.add_favorite(user_id, question_id)
        } else {
            self.remove_favorite(user_id, question_id).map(|_| ())
        }
    }
}

/// 两阶段收藏：先切换本地状态，再持久化；持久化失败则做一次反向切换。
pub fn apply_favorite_toggle<W: FavoriteWriter>(
    writer: &W,
    run: &mut PracticeRun,
    question_id: &str,
) -> Result<FavoriteOutcome, PracticeError> {
    let applied = run.toggle_favorite(question_id)?;
    let persisted = match writer.write_favorite(&run.user_id, question_id, applied) {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(
                session_id = %run.id,
                question_id = %question_id,
                error = %e,
                "Favorite persistence failed, reverting"
            );
            run.revert_favorite(question_id, applied);
            false
        }
    };
    Ok(FavoriteOutcome {
        question_id: question_id.to_string(),
        favorite: run.is_favorite(question_id),
        persisted,
    })
}

#[derive(Debug, Clone)]
pub enum FavoriteToggle {
    Applied {
        run: PracticeRun,
        outcome: FavoriteOutcome,
    },
    /// 倒计时在本次请求时到期：已交卷，收藏未切换
    Finalized(EventOutcome),
}

pub async fn toggle_favorite(
    store: &Store,
    locks: &RunLocks,
    run_id: &str,
    user_id: &str,
    question_id: &str,
    now: DateTime<Utc>,
) -> Result<FavoriteToggle, PracticeError> {
    let _guard = locks.acquire(run_id).await;
    let mut run = load_owned(store, run_id, user_id)?;
    if let Some(report) = settle_clock(store, &mut run, now)? {
        store.save_practice_run(&run)?;
        return Ok(FavoriteToggle::Finalized(EventOutcome {
            run,
            report: Some(report),
        }));
    }

    let outcome = apply_favorite_toggle(store, &mut run, question_id)?;
    store.save_practice_run(&run)?;
    Ok(FavoriteToggle::Applied { run, outcome })
}

/// 为所有倒计时已归零的会话交卷，返回本次交卷的数量。
/// 单个会话读取或写回失败只记日志，不影响后续会话。
pub async fn expire_overdue_runs(
    store: &Store,
    locks: &RunLocks,
    now: DateTime<Utc>,
) -> Result<u32, PracticeError> {
    let mut expired = 0u32;
    for run_id in store.in_progress_run_ids()? {
        let _guard = locks.acquire(&run_id).await;
        let mut run = match store.get_practice_run(&run_id) {
            Ok(Some(run)) => run,
            Ok(None) => continue,
            Err(e) => {
                tracing::warn!(session_id = %run_id, error = %e, "Failed to load practice run");
                continue;
            }
        };
        let settled = settle_clock(store, &mut run, now).and_then(|report| {
            if report.is_some() {
                store.save_practice_run(&run)?;
            }
            Ok(report)
        });
        match settled {
            Ok(Some(_)) => expired += 1,
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(session_id = %run_id, error = %e, "Failed to expire practice run");
            }
        }
    }
    Ok(expired)
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use tempfile::tempdir;

    use super::*;
    use crate::practice::RunStatus;

    fn seeded_store(path: &std::path::Path, n: usize) -> Store {
        let store = Store::open(path.to_str().unwrap()).unwrap();
        for i in 0..n {
            let q = Question::new(
                &format!("Question {i}"),
                vec!["a".into(), "b".into(), "c".into(), "d".into()],
                OptionLetter::A,
                if i % 2 == 0 { "climate" } else { "governance" },
                2,
            );
            store.upsert_question(&q).unwrap();
        }
        store
    }

    fn config(budget: u32) -> PracticeConfig {
        PracticeConfig {
            time_budget_secs: budget,
            default_size: 3,
            max_size: 5,
        }
    }

    #[test]
    fn start_clamps_size_and_rejects_empty_modes() {
        let dir = tempdir().unwrap();
        let store = seeded_store(&dir.path().join("svc-db"), 8);

        let (run, questions) = start_run(
            &store,
            &config(60),
            "u1",
            PracticeMode::Random,
            Some(50),
            None,
            Utc::now(),
        )
        .unwrap();
        assert_eq!(run.len(), 5);
        assert_eq!(questions.len(), 5);

        let err = start_run(
            &store,
            &config(60),
            "u1",
            PracticeMode::WrongAnswers,
            None,
            None,
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, PracticeError::NoContent));

        let err = start_run(
            &store,
            &config(60),
            "u1",
            PracticeMode::Category,
            None,
            None,
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, PracticeError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn other_users_cannot_touch_a_run() {
        let dir = tempdir().unwrap();
        let store = seeded_store(&dir.path().join("svc-db2"), 2);
        let locks = RunLocks::new();
        let (run, _) = start_run(
            &store,
            &config(60),
            "u1",
            PracticeMode::Random,
            None,
            None,
            Utc::now(),
        )
        .unwrap();

        let err = apply_event(&store, &locks, &run.id, "u2", RunEvent::Submit, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, PracticeError::NotOwner));
    }

    #[tokio::test]
    async fn expired_run_is_finalized_on_next_event() {
        let dir = tempdir().unwrap();
        let store = seeded_store(&dir.path().join("svc-db3"), 2);
        let locks = RunLocks::new();
        let start = Utc::now();
        let (run, _) = start_run(
            &store,
            &config(30),
            "u1",
            PracticeMode::Random,
            None,
            None,
            start,
        )
        .unwrap();

        apply_event(
            &store,
            &locks,
            &run.id,
            "u1",
            RunEvent::Select(OptionLetter::A),
            start + Duration::seconds(5),
        )
        .await
        .unwrap();

        let outcome = apply_event(
            &store,
            &locks,
            &run.id,
            "u1",
            RunEvent::Advance,
            start + Duration::minutes(5),
        )
        .await
        .unwrap();
        assert_eq!(outcome.run.status, RunStatus::Finalized);
        assert_eq!(outcome.run.trigger, Some(FinalizeTrigger::TimeUp));
        let summary = outcome.report.unwrap().summary;
        assert_eq!(summary.total_answered, 1);
        assert_eq!(summary.duration_secs, 30);
    }

    #[tokio::test]
    async fn worker_sweep_expires_idle_runs() {
        let dir = tempdir().unwrap();
        let store = seeded_store(&dir.path().join("svc-db4"), 2);
        let locks = RunLocks::new();
        let start = Utc::now();
        let (idle, _) = start_run(
            &store,
            &config(10),
            "u1",
            PracticeMode::Random,
            None,
            None,
            start,
        )
        .unwrap();
        start_run(
            &store,
            &config(600),
            "u2",
            PracticeMode::Random,
            None,
            None,
            start,
        )
        .unwrap();

        let expired = expire_overdue_runs(&store, &locks, start + Duration::seconds(60))
            .await
            .unwrap();
        assert_eq!(expired, 1);
        let stored = store.get_practice_run(&idle.id).unwrap().unwrap();
        assert_eq!(stored.status, RunStatus::Finalized);
        assert!(store.get_practice_session("u1", &idle.id).unwrap().is_some());
    }

    #[tokio::test]
    async fn favorite_toggle_persists_immediately() {
        let dir = tempdir().unwrap();
        let store = seeded_store(&dir.path().join("svc-db5"), 2);
        let locks = RunLocks::new();
        let (run, _) = start_run(
            &store,
            &config(60),
            "u1",
            PracticeMode::Random,
            None,
            None,
            Utc::now(),
        )
        .unwrap();
        let qid = run.questions[0].question_id.clone();

        let outcome = applied(
            toggle_favorite(&store, &locks, &run.id, "u1", &qid, Utc::now())
                .await
                .unwrap(),
        );
        assert!(outcome.favorite && outcome.persisted);
        assert!(store.is_favorite("u1", &qid).unwrap());

        let outcome = applied(
            toggle_favorite(&store, &locks, &run.id, "u1", &qid, Utc::now())
                .await
                .unwrap(),
        );
        assert!(!outcome.favorite);
        assert!(!store.is_favorite("u1", &qid).unwrap());
    }

    fn applied(toggle: FavoriteToggle) -> FavoriteOutcome {
        match toggle {
            FavoriteToggle::Applied { outcome, .. } => outcome,
            FavoriteToggle::Finalized(_) => panic!("run was finalized instead of toggling"),
        }
    }

    /// 所有收藏写入都失败的存储。
    struct BrokenFavorites {
        calls: std::cell::Cell<u32>,
    }

    impl FavoriteWriter for BrokenFavorites {
        fn write_favorite(&self, _: &str, _: &str, _: bool) -> Result<(), StoreError> {
            self.calls.set(self.calls.get() + 1);
            Err(StoreError::Validation("favorites tree unavailable".into()))
        }
    }

    #[test]
    fn failed_favorite_write_rolls_back_both_directions() {
        let questions = vec![
            RunQuestion {
                question_id: "q1".into(),
                correct_answer: OptionLetter::A,
            },
            RunQuestion {
                question_id: "q2".into(),
                correct_answer: OptionLetter::B,
            },
        ];
        let mut run = PracticeRun::start(
            "u1",
            PracticeMode::Random,
            questions,
            ["q2".to_string()].into_iter().collect(),
            60,
            Utc::now(),
        )
        .unwrap();
        let writer = BrokenFavorites {
            calls: std::cell::Cell::new(0),
        };

        // 未收藏 -> 收藏 失败
        let outcome = apply_favorite_toggle(&writer, &mut run, "q1").unwrap();
        assert!(!outcome.persisted);
        assert!(!outcome.favorite);
        assert!(!run.is_favorite("q1"));

        // 已收藏 -> 取消 失败
        let outcome = apply_favorite_toggle(&writer, &mut run, "q2").unwrap();
        assert!(!outcome.persisted);
        assert!(outcome.favorite);
        assert!(run.is_favorite("q2"));

        assert_eq!(writer.calls.get(), 2);
        assert_eq!(run.status, RunStatus::InProgress);
    }

    #[tokio::test]
    async fn favorite_after_expiry_returns_finalized_run() {
        let dir = tempdir().unwrap();
        let store = seeded_store(&dir.path().join("svc-db6"), 2);
        let locks = RunLocks::new();
        let start = Utc::now();
        let (run, _) = start_run(
            &store,
            &config(30),
            "u1",
            PracticeMode::Random,
            None,
            None,
            start,
        )
        .unwrap();
        let qid = run.questions[0].question_id.clone();

        let toggle = toggle_favorite(
            &store,
            &locks,
            &run.id,
            "u1",
            &qid,
            start + Duration::minutes(2),
        )
        .await
        .unwrap();
        let FavoriteToggle::Finalized(outcome) = toggle else {
            panic!("expected the expired run to be finalized");
        };
        assert_eq!(outcome.run.status, RunStatus::Finalized);
        assert_eq!(outcome.run.trigger, Some(FinalizeTrigger::TimeUp));
        assert!(outcome.report.is_some());
        assert!(!store.is_favorite("u1", &qid).unwrap());
    }

    #[tokio::test]
    async fn sweep_skips_unreadable_runs() {
        let dir = tempdir().unwrap();
        let store = seeded_store(&dir.path().join("svc-db7"), 2);
        let locks = RunLocks::new();
        let start = Utc::now();
        let (idle, _) = start_run(
            &store,
            &config(10),
            "u1",
            PracticeMode::Random,
            None,
            None,
            start,
        )
        .unwrap();

        // 索引指向一条已损坏的会话
        store
            .practice_runs
            .insert("active:broken", b"".as_slice())
            .unwrap();
        store
            .practice_runs
            .insert("broken", b"{not json".as_slice())
            .unwrap();

        let expired = expire_overdue_runs(&store, &locks, start + Duration::seconds(60))
            .await
            .unwrap();
        assert_eq!(expired, 1);
        let stored = store.get_practice_run(&idle.id).unwrap().unwrap();
        assert_eq!(stored.status, RunStatus::Finalized);
    }
}
