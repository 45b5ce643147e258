use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::practice::scoring::{Graded, PracticeSummary};
use crate::practice::{FinalizeTrigger, OptionLetter, PracticeMode, PracticeRun};
use crate::store::keys;
use crate::store::{Store, StoreError};

/// 一次练习的完成记录，交卷时写入一次。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PracticeSessionRecord {
    pub id: String,
    pub user_id: String,
    pub mode: PracticeMode,
    pub trigger: Option<FinalizeTrigger>,
    pub total_questions: u32,
    pub total_answered: u32,
    pub correct_count: u32,
    pub accuracy: u32,
    pub score: u32,
    pub duration_secs: i64,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl PracticeSessionRecord {
    pub fn from_run(run: &PracticeRun, summary: &PracticeSummary) -> Self {
        Self {
            id: run.id.clone(),
            user_id: run.user_id.clone(),
            mode: run.mode,
            trigger: run.trigger,
            total_questions: summary.total_questions,
            total_answered: summary.total_answered,
            correct_count: summary.correct_count,
            accuracy: summary.accuracy,
            score: summary.score,
            duration_secs: summary.duration_secs,
            started_at: run.started_at,
            completed_at: run.finalized_at.unwrap_or(run.last_tick_at),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerRecord {
    pub session_id: String,
    pub user_id: String,
    pub question_id: String,
    pub selected: OptionLetter,
    pub is_correct: bool,
    pub answered_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PracticeTotals {
    pub sessions: u64,
    pub questions: u64,
    pub answered: u64,
    pub correct: u64,
    pub total_score: u64,
    pub best_score: u32,
}

impl PracticeTotals {
    fn add(&mut self, record: &PracticeSessionRecord) {
        self.sessions += 1;
        self.questions += u64::from(record.total_questions);
        self.answered += u64::from(record.total_answered);
        self.correct += u64::from(record.correct_count);
        self.total_score += u64::from(record.score);
        self.best_score = self.best_score.max(record.score);
    }

    /// 以总题数为分母的累计正确率
    pub fn accuracy(&self) -> u32 {
        if self.questions == 0 {
            return 0;
        }
        (self.correct as f64 / self.questions as f64 * 100.0).round() as u32
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub user_id: String,
    pub username: String,
    pub best_score: u32,
    pub total_score: u64,
    pub sessions: u64,
    pub accuracy: u32,
}

impl Store {
    pub fn save_practice_session(&self, record: &PracticeSessionRecord) -> Result<(), StoreError> {
        let key = keys::practice_session_key(
            &record.user_id,
            record.completed_at.timestamp_millis(),
            &record.id,
        )?;
        self.practice_sessions
            .insert(key.as_bytes(), Self::serialize(record)?)?;
        Ok(())
    }

    /// 按完成时间倒序分页
    pub fn list_practice_sessions(
        &self,
        user_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<(Vec<PracticeSessionRecord>, u64), StoreError> {
        let prefix = keys::practice_session_prefix(user_id)?;
        let mut page = Vec::new();
        let mut total = 0u64;
        for item in self.practice_sessions.scan_prefix(prefix.as_bytes()) {
            let (_, value) = item?;
            if (total as usize) >= offset && page.len() < limit {
                page.push(Self::deserialize(&value)?);
            }
            total += 1;
        }
        Ok((page, total))
    }

    pub fn get_practice_session(
        &self,
        user_id: &str,
        session_id: &str,
    ) -> Result<Option<PracticeSessionRecord>, StoreError> {
        let prefix = keys::practice_session_prefix(user_id)?;
        let suffix = format!(":{session_id}");
        for item in self.practice_sessions.scan_prefix(prefix.as_bytes()) {
            let (key, value) = item?;
            if key.ends_with(suffix.as_bytes()) {
                return Ok(Some(Self::deserialize(&value)?));
            }
        }
        Ok(None)
    }

    pub fn practice_totals(&self, user_id: &str) -> Result<PracticeTotals, StoreError> {
        let prefix = keys::practice_session_prefix(user_id)?;
        let mut totals = PracticeTotals::default();
        for item in self.practice_sessions.scan_prefix(prefix.as_bytes()) {
            let (_, value) = item?;
            totals.add(&Self::deserialize(&value)?);
        }
        Ok(totals)
    }

    pub fn count_practice_sessions(&self) -> Result<u64, StoreError> {
        Ok(self.practice_sessions.len() as u64)
    }

    /// 按最高分、总分依次排序；同分时用户 id 保证顺序稳定。
    pub fn leaderboard(&self, limit: usize) -> Result<Vec<LeaderboardEntry>, StoreError> {
        let mut per_user: HashMap<String, PracticeTotals> = HashMap::new();
        for item in self.practice_sessions.iter() {
            let (_, value) = item?;
            let record: PracticeSessionRecord = Self::deserialize(&value)?;
            per_user
                .entry(record.user_id.clone())
                .or_default()
                .add(&record);
        }

        let mut ranked: Vec<(String, PracticeTotals)> = per_user.into_iter().collect();
        ranked.sort_by(|(a_id, a), (b_id, b)| {
            b.best_score
                .cmp(&a.best_score)
                .then(b.total_score.cmp(&a.total_score))
                .then(a_id.cmp(b_id))
        });
        ranked.truncate(limit);

        let ids: Vec<String> = ranked.iter().map(|(id, _)| id.clone()).collect();
        let names = self.usernames(&ids)?;

        Ok(ranked
            .into_iter()
            .enumerate()
            .map(|(i, (user_id, totals))| LeaderboardEntry {
                rank: i + 1,
                username: names.get(&user_id).cloned().unwrap_or_default(),
                user_id,
                best_score: totals.best_score,
                total_score: totals.total_score,
                sessions: totals.sessions,
                accuracy: totals.accuracy(),
            })
            .collect())
    }

    /// 一次交卷的逐题作答记录，整批写入。
    pub fn save_answer_records(
        &self,
        session_id: &str,
        user_id: &str,
        graded: &[Graded],
        answered_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut batch = sled::Batch::default();
        for g in graded {
            let record = AnswerRecord {
                session_id: session_id.to_string(),
                user_id: user_id.to_string(),
                question_id: g.question_id.clone(),
                selected: g.selected,
                is_correct: g.is_correct,
                answered_at,
            };
            let key = keys::answer_record_key(session_id, &g.question_id)?;
            batch.insert(key.as_bytes(), Self::serialize(&record)?);
        }
        self.answer_records.apply_batch(batch)?;
        Ok(())
    }

    pub fn list_answer_records(&self, session_id: &str) -> Result<Vec<AnswerRecord>, StoreError> {
        let prefix = keys::answer_record_prefix(session_id)?;
        let mut out = Vec::new();
        for item in self.answer_records.scan_prefix(prefix.as_bytes()) {
            let (_, value) = item?;
            out.push(Self::deserialize(&value)?);
        }
        Ok(out)
    }
}
