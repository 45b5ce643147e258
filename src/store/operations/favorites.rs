use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::keys;
use crate::store::{Store, StoreError};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FavoriteMark {
    pub user_id: String,
    pub question_id: String,
    pub created_at: DateTime<Utc>,
}

impl Store {
    /// 重复收藏不是错误，保留最早的收藏时间。
    pub fn add_favorite(&self, user_id: &str, question_id: &str) -> Result<(), StoreError> {
        let key = keys::favorite_key(user_id, question_id)?;
        let mark = FavoriteMark {
            user_id: user_id.to_string(),
            question_id: question_id.to_string(),
            created_at: Utc::now(),
        };
        let _ = self.favorites.compare_and_swap(
            key.as_bytes(),
            None::<&[u8]>,
            Some(Self::serialize(&mark)?),
        )?;
        Ok(())
    }

    pub fn remove_favorite(&self, user_id: &str, question_id: &str) -> Result<bool, StoreError> {
        let key = keys::favorite_key(user_id, question_id)?;
        Ok(self.favorites.remove(key.as_bytes())?.is_some())
    }

    pub fn add_favorites(&self, user_id: &str, question_ids: &[String]) -> Result<(), StoreError> {
        for question_id in question_ids {
            self.add_favorite(user_id, question_id)?;
        }
        Ok(())
    }

    pub fn is_favorite(&self, user_id: &str, question_id: &str) -> Result<bool, StoreError> {
        let key = keys::favorite_key(user_id, question_id)?;
        Ok(self.favorites.contains_key(key.as_bytes())?)
    }

    pub fn list_favorites(&self, user_id: &str) -> Result<Vec<FavoriteMark>, StoreError> {
        let prefix = keys::favorite_prefix(user_id)?;
        let mut out: Vec<FavoriteMark> = Vec::new();
        for item in self.favorites.scan_prefix(prefix.as_bytes()) {
            let (_, value) = item?;
            out.push(Self::deserialize(&value)?);
        }
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(out)
    }

    pub fn favorite_ids(&self, user_id: &str) -> Result<BTreeSet<String>, StoreError> {
        Ok(self
            .list_favorites(user_id)?
            .into_iter()
            .map(|mark| mark.question_id)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn bulk_upsert_is_idempotent() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path().join("fav-db").to_str().unwrap()).unwrap();

        let ids = vec!["q1".to_string(), "q2".to_string()];
        store.add_favorites("u1", &ids).unwrap();
        store.add_favorites("u1", &ids).unwrap();
        store.add_favorite("u1", "q1").unwrap();

        assert_eq!(store.list_favorites("u1").unwrap().len(), 2);
        assert!(store.favorite_ids("u2").unwrap().is_empty());
    }

    #[test]
    fn remove_reports_presence() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path().join("fav-db2").to_str().unwrap()).unwrap();

        store.add_favorite("u1", "q1").unwrap();
        assert!(store.is_favorite("u1", "q1").unwrap());
        assert!(store.remove_favorite("u1", "q1").unwrap());
        assert!(!store.remove_favorite("u1", "q1").unwrap());
    }
}
