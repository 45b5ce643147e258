use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::keys;
use crate::store::{Store, StoreError};

/// 错题本：每个 (用户, 题目) 一条。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WrongAnswerCounter {
    pub user_id: String,
    pub question_id: String,
    pub wrong_count: u32,
    pub mastered: bool,
    pub last_wrong_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WrongAnswerCounter {
    pub fn first_miss(user_id: &str, question_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.to_string(),
            question_id: question_id.to_string(),
            wrong_count: 1,
            mastered: false,
            last_wrong_at: now,
            updated_at: now,
        }
    }
}

impl Store {
    pub fn get_wrong_answer(
        &self,
        user_id: &str,
        question_id: &str,
    ) -> Result<Option<WrongAnswerCounter>, StoreError> {
        let key = keys::wrong_answer_key(user_id, question_id)?;
        match self.wrong_answers.get(key.as_bytes())? {
            Some(raw) => Ok(Some(Self::deserialize(&raw)?)),
            None => Ok(None),
        }
    }

    pub fn put_wrong_answer(&self, counter: &WrongAnswerCounter) -> Result<(), StoreError> {
        let key = keys::wrong_answer_key(&counter.user_id, &counter.question_id)?;
        self.wrong_answers
            .insert(key.as_bytes(), Self::serialize(counter)?)?;
        Ok(())
    }

    /// 默认只返回未掌握的错题，按最近答错时间倒序。
    pub fn list_wrong_answers(
        &self,
        user_id: &str,
        include_mastered: bool,
    ) -> Result<Vec<WrongAnswerCounter>, StoreError> {
        let prefix = keys::wrong_answer_prefix(user_id)?;
        let mut out: Vec<WrongAnswerCounter> = Vec::new();
        for item in self.wrong_answers.scan_prefix(prefix.as_bytes()) {
            let (_, value) = item?;
            let counter: WrongAnswerCounter = Self::deserialize(&value)?;
            if include_mastered || !counter.mastered {
                out.push(counter);
            }
        }
        out.sort_by(|a, b| b.last_wrong_at.cmp(&a.last_wrong_at));
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn mastered_counters_are_hidden_by_default() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path().join("wrong-db").to_str().unwrap()).unwrap();
        let now = Utc::now();

        let open = WrongAnswerCounter::first_miss("u1", "q1", now);
        let mut done = WrongAnswerCounter::first_miss("u1", "q2", now - Duration::hours(1));
        done.mastered = true;
        store.put_wrong_answer(&open).unwrap();
        store.put_wrong_answer(&done).unwrap();
        store
            .put_wrong_answer(&WrongAnswerCounter::first_miss("u2", "q1", now))
            .unwrap();

        assert_eq!(store.list_wrong_answers("u1", false).unwrap(), vec![open.clone()]);
        let all = store.list_wrong_answers("u1", true).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].question_id, "q1");
    }
}
