use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::scoring::PracticeSummary;
use super::{FinalizeTrigger, OptionLetter, PracticeError, PracticeMode, RunStatus};

/// 开始练习时固定下来的题目快照：之后题库修改不影响本次会话。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunQuestion {
    pub question_id: String,
    pub correct_answer: OptionLetter,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PracticeRun {
    pub id: String,
    pub user_id: String,
    pub mode: PracticeMode,
    pub questions: Vec<RunQuestion>,
    pub position: usize,
    /// 已提交的作答，每题至多一条，后写覆盖先写
    pub answers: BTreeMap<String, OptionLetter>,
    /// 当前题目已选但尚未提交的答案
    pub draft: Option<OptionLetter>,
    pub favorites: BTreeSet<String>,
    pub time_budget_secs: u32,
    pub remaining_secs: u32,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub last_tick_at: DateTime<Utc>,
    pub finalized_at: Option<DateTime<Utc>>,
    pub trigger: Option<FinalizeTrigger>,
    pub summary: Option<PracticeSummary>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    Moved { position: usize },
    /// 已在最后一题，调用方应进入交卷流程
    Finish,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    Running { remaining_secs: u32 },
    Expired,
    Idle,
}

impl PracticeRun {
    pub fn start(
        user_id: &str,
        mode: PracticeMode,
        questions: Vec<RunQuestion>,
        favorites: BTreeSet<String>,
        time_budget_secs: u32,
        now: DateTime<Utc>,
    ) -> Result<Self, PracticeError> {
        if questions.is_empty() {
            return Err(PracticeError::NoContent);
        }

        let favorites = favorites
            .into_iter()
            .filter(|qid| questions.iter().any(|q| &q.question_id == qid))
            .collect();

        Ok(Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            mode,
            questions,
            position: 0,
            answers: BTreeMap::new(),
            draft: None,
            favorites,
            time_budget_secs,
            remaining_secs: time_budget_secs,
            status: RunStatus::InProgress,
            started_at: now,
            last_tick_at: now,
            finalized_at: None,
            trigger: None,
            summary: None,
        })
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    pub fn current(&self) -> &RunQuestion {
        &self.questions[self.position]
    }

    pub fn is_last(&self) -> bool {
        self.position + 1 >= self.questions.len()
    }

    pub fn contains(&self, question_id: &str) -> bool {
        self.questions.iter().any(|q| q.question_id == question_id)
    }

    pub fn is_favorite(&self, question_id: &str) -> bool {
        self.favorites.contains(question_id)
    }

    pub fn question_ids(&self) -> Vec<String> {
        self.questions.iter().map(|q| q.question_id.clone()).collect()
    }

    fn ensure_in_progress(&self) -> Result<(), PracticeError> {
        if self.status != RunStatus::InProgress {
            return Err(PracticeError::NotInProgress(self.status));
        }
        Ok(())
    }

    fn commit_draft(&mut self) {
        if let Some(letter) = self.draft {
            let question_id = self.current().question_id.clone();
            self.answers.insert(question_id, letter);
        }
    }

    fn load_draft(&mut self) {
        self.draft = self.answers.get(&self.current().question_id).copied();
    }

    pub fn select_answer(&mut self, letter: OptionLetter) -> Result<(), PracticeError> {
        self.ensure_in_progress()?;
        self.draft = Some(letter);
        Ok(())
    }

    pub fn advance(&mut self) -> Result<Advance, PracticeError> {
        self.ensure_in_progress()?;
        self.commit_draft();
        if self.is_last() {
            return Ok(Advance::Finish);
        }
        self.position += 1;
        self.load_draft();
        Ok(Advance::Moved {
            position: self.position,
        })
    }

    /// 回到上一题。当前题未提交的草稿会被丢弃，只恢复已提交的答案。
    pub fn retreat(&mut self) -> Result<usize, PracticeError> {
        self.ensure_in_progress()?;
        if self.position == 0 {
            return Ok(0);
        }
        self.position -= 1;
        self.load_draft();
        Ok(self.position)
    }

    /// 乐观切换收藏，返回切换后的状态。持久化失败时调用 [`Self::revert_favorite`]。
    pub fn toggle_favorite(&mut self, question_id: &str) -> Result<bool, PracticeError> {
        self.ensure_in_progress()?;
        if !self.contains(question_id) {
            return Err(PracticeError::UnknownQuestion(question_id.to_string()));
        }
        if self.favorites.remove(question_id) {
            Ok(false)
        } else {
            self.favorites.insert(question_id.to_string());
            Ok(true)
        }
    }

    /// `toggle_favorite` 的逆操作；`applied` 为当时切换后的状态。
    pub fn revert_favorite(&mut self, question_id: &str, applied: bool) {
        if applied {
            self.favorites.remove(question_id);
        } else {
            self.favorites.insert(question_id.to_string());
        }
    }

    pub fn tick(&mut self) -> Tick {
        if self.status != RunStatus::InProgress {
            return Tick::Idle;
        }
        if self.remaining_secs == 0 {
            return Tick::Expired;
        }
        self.remaining_secs -= 1;
        self.last_tick_at += Duration::seconds(1);
        if self.remaining_secs == 0 {
            Tick::Expired
        } else {
            Tick::Running {
                remaining_secs: self.remaining_secs,
            }
        }
    }

    /// 补齐自上次 tick 以来经过的整秒数。
    pub fn catch_up(&mut self, now: DateTime<Utc>) -> Tick {
        if self.status != RunStatus::InProgress {
            return Tick::Idle;
        }
        let elapsed = (now - self.last_tick_at).num_seconds().max(0);
        let mut outcome = if self.remaining_secs == 0 {
            Tick::Expired
        } else {
            Tick::Running {
                remaining_secs: self.remaining_secs,
            }
        };
        for _ in 0..elapsed {
            outcome = self.tick();
            if outcome == Tick::Expired {
                break;
            }
        }
        outcome
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.last_tick_at + Duration::seconds(i64::from(self.remaining_secs))
    }

    /// 进入交卷：先把当前题草稿并入作答，再切到 `Finalizing`。
    /// 超时交卷的完成时间取倒计时归零的时刻。
    pub fn begin_finalize(
        &mut self,
        trigger: FinalizeTrigger,
        now: DateTime<Utc>,
    ) -> Result<(), PracticeError> {
        self.ensure_in_progress()?;
        self.commit_draft();
        self.draft = None;
        self.status = RunStatus::Finalizing;
        self.trigger = Some(trigger);
        self.finalized_at = Some(match trigger {
            FinalizeTrigger::TimeUp => self.last_tick_at,
            FinalizeTrigger::Submitted | FinalizeTrigger::LastQuestion => now,
        });
        Ok(())
    }

    pub fn complete(&mut self, summary: PracticeSummary) {
        self.status = RunStatus::Finalized;
        self.summary = Some(summary);
    }

    /// 实际耗时（墙钟），而不是倒计时剩余量。
    pub fn duration_secs(&self) -> i64 {
        let end = self.finalized_at.unwrap_or(self.last_tick_at);
        (end - self.started_at).num_seconds().max(0)
    }
}
