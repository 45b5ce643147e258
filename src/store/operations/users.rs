use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::keys;
use crate::store::{Store, StoreError};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(email: &str, username: &str, password_hash: String) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            email: email.trim().to_string(),
            username: username.trim().to_string(),
            password_hash,
            created_at: now,
            updated_at: now,
        }
    }
}

fn is_index_key(key: &[u8]) -> bool {
    key.starts_with(b"email:")
}

impl Store {
    pub fn create_user(&self, user: &User) -> Result<(), StoreError> {
        let email_key = keys::user_email_index_key(&user.email);

        // 邮箱索引用 CAS 占位，两个并发注册只有一个能成功
        let claimed = self.users.compare_and_swap(
            email_key.as_bytes(),
            None::<&[u8]>,
            Some(user.id.as_bytes().to_vec()),
        )?;
        if claimed.is_err() {
            return Err(StoreError::Conflict {
                entity: "user_email".to_string(),
                key: user.email.clone(),
            });
        }

        let user_key = keys::user_key(&user.id)?;
        if let Err(e) = self.users.insert(user_key.as_bytes(), Self::serialize(user)?) {
            let _ = self.users.remove(email_key.as_bytes());
            return Err(StoreError::Sled(e));
        }
        Ok(())
    }

    pub fn get_user_by_id(&self, user_id: &str) -> Result<Option<User>, StoreError> {
        let key = keys::user_key(user_id)?;
        match self.users.get(key.as_bytes())? {
            Some(raw) => Ok(Some(Self::deserialize(&raw)?)),
            None => Ok(None),
        }
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let index_key = keys::user_email_index_key(email);
        let Some(raw_id) = self.users.get(index_key.as_bytes())? else {
            return Ok(None);
        };
        match std::str::from_utf8(&raw_id) {
            Ok(user_id) => self.get_user_by_id(user_id),
            Err(e) => {
                tracing::warn!(error = %e, "Invalid UTF-8 in user email index");
                Ok(None)
            }
        }
    }

    pub fn count_users(&self) -> Result<u64, StoreError> {
        let mut count = 0u64;
        for item in self.users.iter() {
            let (key, _) = item?;
            if !is_index_key(&key) {
                count += 1;
            }
        }
        Ok(count)
    }

    /// 排行榜等场景只需要展示名；已删除的用户不出现在结果中。
    pub fn usernames(&self, user_ids: &[String]) -> Result<HashMap<String, String>, StoreError> {
        let mut names = HashMap::with_capacity(user_ids.len());
        for user_id in user_ids {
            if let Some(user) = self.get_user_by_id(user_id)? {
                names.insert(user.id, user.username);
            }
        }
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn create_and_lookup_by_email() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path().join("users-db").to_str().unwrap()).unwrap();

        let user = User::new("Learner@Example.com", "learner", "hash".into());
        store.create_user(&user).unwrap();

        let got = store
            .get_user_by_email("learner@example.com")
            .unwrap()
            .unwrap();
        assert_eq!(got.id, user.id);
        assert_eq!(store.count_users().unwrap(), 1);
    }

    #[test]
    fn duplicate_email_conflicts() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path().join("users-db2").to_str().unwrap()).unwrap();

        store
            .create_user(&User::new("dup@example.com", "a", "h".into()))
            .unwrap();
        let err = store
            .create_user(&User::new("DUP@example.com", "b", "h".into()))
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));
    }

    #[test]
    fn usernames_skip_unknown_ids() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path().join("users-db3").to_str().unwrap()).unwrap();
        let user = User::new("a@example.com", "alice", "h".into());
        store.create_user(&user).unwrap();

        let names = store
            .usernames(&[user.id.clone(), "ghost".to_string()])
            .unwrap();
        assert_eq!(names.len(), 1);
        assert_eq!(names.get(&user.id).map(String::as_str), Some("alice"));
    }
}
