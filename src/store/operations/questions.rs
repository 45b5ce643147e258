use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::constants::{MAX_DIFFICULTY, MAX_OPTIONS, MIN_DIFFICULTY};
use crate::practice::OptionLetter;
use crate::store::keys;
use crate::store::{Store, StoreError};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: String,
    pub prompt: String,
    pub options: Vec<String>,
    pub correct_answer: OptionLetter,
    #[serde(default)]
    pub explanation: Option<String>,
    #[serde(default)]
    pub explanation_source: Option<ExplanationSource>,
    #[serde(default)]
    pub key_points: Vec<String>,
    pub category: String,
    pub difficulty: u8,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExplanationSource {
    Human,
    Ai,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryCount {
    pub category: String,
    pub count: u64,
}

impl Question {
    pub fn new(
        prompt: &str,
        options: Vec<String>,
        correct_answer: OptionLetter,
        category: &str,
        difficulty: u8,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            prompt: prompt.to_string(),
            options,
            correct_answer,
            explanation: None,
            explanation_source: None,
            key_points: Vec::new(),
            category: category.to_string(),
            difficulty,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn validate(&self) -> Result<(), StoreError> {
        if self.prompt.trim().is_empty() {
            return Err(StoreError::Validation("question prompt is empty".into()));
        }
        if self.options.is_empty() || self.options.len() > MAX_OPTIONS {
            return Err(StoreError::Validation(format!(
                "question must have 1 to {MAX_OPTIONS} options"
            )));
        }
        if self.options.iter().any(|o| o.trim().is_empty()) {
            return Err(StoreError::Validation("option text is empty".into()));
        }
        if self.correct_answer.index() >= self.options.len() {
            return Err(StoreError::Validation(format!(
                "correct answer {} has no matching option",
                self.correct_answer.as_str()
            )));
        }
        if !(MIN_DIFFICULTY..=MAX_DIFFICULTY).contains(&self.difficulty) {
            return Err(StoreError::Validation(format!(
                "difficulty must be between {MIN_DIFFICULTY} and {MAX_DIFFICULTY}"
            )));
        }
        if self.category.trim().is_empty() {
            return Err(StoreError::Validation("category is empty".into()));
        }
        Ok(())
    }

    pub fn needs_explanation(&self) -> bool {
        self.explanation
            .as_deref()
            .map_or(true, |text| text.trim().is_empty())
    }
}

impl Store {
    pub fn upsert_question(&self, question: &Question) -> Result<(), StoreError> {
        question.validate()?;
        let key = keys::question_key(&question.id)?;
        self.questions
            .insert(key.as_bytes(), Self::serialize(question)?)?;
        Ok(())
    }

    pub fn get_question(&self, question_id: &str) -> Result<Option<Question>, StoreError> {
        let key = keys::question_key(question_id)?;
        match self.questions.get(key.as_bytes())? {
            Some(raw) => Ok(Some(Self::deserialize(&raw)?)),
            None => Ok(None),
        }
    }

    pub fn delete_question(&self, question_id: &str) -> Result<bool, StoreError> {
        let key = keys::question_key(question_id)?;
        Ok(self.questions.remove(key.as_bytes())?.is_some())
    }

    /// 按给定顺序批量读取，跳过不存在的题目（可能已被管理员删除）。
    pub fn get_questions_batch(&self, question_ids: &[String]) -> Result<Vec<Question>, StoreError> {
        let mut out = Vec::with_capacity(question_ids.len());
        for qid in question_ids {
            if let Some(question) = self.get_question(qid)? {
                out.push(question);
            }
        }
        Ok(out)
    }

    pub fn list_questions(
        &self,
        category: Option<&str>,
        limit: usize,
        offset: usize,
    ) -> Result<(Vec<Question>, u64), StoreError> {
        let mut matched = Vec::new();
        for item in self.questions.iter() {
            let (_, value) = item?;
            let question: Question = Self::deserialize(&value)?;
            if category.map_or(true, |c| question.category == c) {
                matched.push(question);
            }
        }
        matched.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        let total = matched.len() as u64;
        Ok((matched.into_iter().skip(offset).take(limit).collect(), total))
    }

    pub fn count_questions(&self) -> Result<usize, StoreError> {
        let mut count = 0usize;
        for item in self.questions.iter() {
            let _ = item?;
            count += 1;
        }
        Ok(count)
    }

    pub fn list_categories(&self) -> Result<Vec<CategoryCount>, StoreError> {
        let mut counts: BTreeMap<String, u64> = BTreeMap::new();
        for item in self.questions.iter() {
            let (_, value) = item?;
            let question: Question = Self::deserialize(&value)?;
            *counts.entry(question.category).or_default() += 1;
        }
        Ok(counts
            .into_iter()
            .map(|(category, count)| CategoryCount { category, count })
            .collect())
    }

    /// 随机抽取至多 `count` 道题，可按分类过滤。
    pub fn random_questions(
        &self,
        count: usize,
        category: Option<&str>,
    ) -> Result<Vec<Question>, StoreError> {
        let (mut pool, _) = self.list_questions(category, usize::MAX, 0)?;
        pool.shuffle(&mut rand::thread_rng());
        pool.truncate(count);
        Ok(pool)
    }

    pub fn questions_missing_explanation(&self, limit: usize) -> Result<Vec<Question>, StoreError> {
        let mut out = Vec::new();
        for item in self.questions.iter() {
            let (_, value) = item?;
            let question: Question = Self::deserialize(&value)?;
            if question.needs_explanation() {
                out.push(question);
                if out.len() >= limit {
                    break;
                }
            }
        }
        Ok(out)
    }

    pub fn set_question_explanation(
        &self,
        question_id: &str,
        explanation: &str,
        key_points: &[String],
        source: ExplanationSource,
    ) -> Result<(), StoreError> {
        let mut question = self
            .get_question(question_id)?
            .ok_or_else(|| StoreError::NotFound {
                entity: "question".to_string(),
                key: question_id.to_string(),
            })?;
        question.explanation = Some(explanation.to_string());
        question.key_points = key_points.to_vec();
        question.explanation_source = Some(source);
        question.updated_at = Utc::now();
        self.upsert_question(&question)
    }

    pub fn question_map(&self, question_ids: &[String]) -> Result<HashMap<String, Question>, StoreError> {
        Ok(self
            .get_questions_batch(question_ids)?
            .into_iter()
            .map(|q| (q.id.clone(), q))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    fn sample(category: &str) -> Question {
        Question::new(
            "Scope 3 emissions cover which activities?",
            vec![
                "Direct combustion".into(),
                "Purchased electricity".into(),
                "Value chain activities".into(),
                "Fugitive leaks".into(),
            ],
            OptionLetter::C,
            category,
            3,
        )
    }

    #[test]
    fn validation_rejects_answer_without_option() {
        let mut q = sample("ghg");
        q.options.truncate(2);
        assert!(matches!(q.validate(), Err(StoreError::Validation(_))));
    }

    #[test]
    fn validation_rejects_out_of_range_difficulty() {
        let mut q = sample("ghg");
        q.difficulty = 0;
        assert!(q.validate().is_err());
        q.difficulty = 6;
        assert!(q.validate().is_err());
    }

    #[test]
    fn batch_read_preserves_order_and_skips_missing() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path().join("q-db").to_str().unwrap()).unwrap();
        let a = sample("ghg");
        let b = sample("esg");
        store.upsert_question(&a).unwrap();
        store.upsert_question(&b).unwrap();

        let got = store
            .get_questions_batch(&[b.id.clone(), "missing".to_string(), a.id.clone()])
            .unwrap();
        assert_eq!(got.len(), 2);
        assert_eq!(got[0].id, b.id);
        assert_eq!(got[1].id, a.id);
    }

    #[test]
    fn random_questions_respects_count_and_category() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path().join("q-db2").to_str().unwrap()).unwrap();
        for _ in 0..5 {
            store.upsert_question(&sample("ghg")).unwrap();
        }
        store.upsert_question(&sample("esg")).unwrap();

        let picked = store.random_questions(3, Some("ghg")).unwrap();
        assert_eq!(picked.len(), 3);
        assert!(picked.iter().all(|q| q.category == "ghg"));

        let all_esg = store.random_questions(10, Some("esg")).unwrap();
        assert_eq!(all_esg.len(), 1);
    }

    #[test]
    fn categories_are_counted() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path().join("q-db3").to_str().unwrap()).unwrap();
        store.upsert_question(&sample("ghg")).unwrap();
        store.upsert_question(&sample("ghg")).unwrap();
        store.upsert_question(&sample("esg")).unwrap();

        let cats = store.list_categories().unwrap();
        assert_eq!(cats.len(), 2);
        assert_eq!(cats[0].category, "esg");
        assert_eq!(cats[1].count, 2);
    }

    #[test]
    fn missing_explanations_are_listed_until_filled() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path().join("q-db4").to_str().unwrap()).unwrap();
        let q = sample("ghg");
        store.upsert_question(&q).unwrap();
        assert_eq!(store.questions_missing_explanation(10).unwrap().len(), 1);

        store
            .set_question_explanation(&q.id, "Value chain.", &[], ExplanationSource::Ai)
            .unwrap();
        assert!(store.questions_missing_explanation(10).unwrap().is_empty());
        let stored = store.get_question(&q.id).unwrap().unwrap();
        assert_eq!(stored.explanation_source, Some(ExplanationSource::Ai));
    }
}
