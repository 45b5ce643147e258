use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::keys;
use crate::store::{Store, StoreError};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Admin {
    pub id: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

impl Admin {
    pub fn new(email: &str, password_hash: String) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            email: email.trim().to_string(),
            password_hash,
            created_at: Utc::now(),
        }
    }
}

impl Store {
    pub fn create_admin(&self, admin: &Admin) -> Result<(), StoreError> {
        let email_key = keys::admin_email_index_key(&admin.email);
        let claimed = self.admins.compare_and_swap(
            email_key.as_bytes(),
            None::<&[u8]>,
            Some(admin.id.as_bytes().to_vec()),
        )?;
        if claimed.is_err() {
            return Err(StoreError::Conflict {
                entity: "admin_email".to_string(),
                key: admin.email.clone(),
            });
        }

        let key = keys::admin_key(&admin.id)?;
        if let Err(e) = self.admins.insert(key.as_bytes(), Self::serialize(admin)?) {
            let _ = self.admins.remove(email_key.as_bytes());
            return Err(StoreError::Sled(e));
        }
        Ok(())
    }

    pub fn get_admin_by_id(&self, admin_id: &str) -> Result<Option<Admin>, StoreError> {
        let key = keys::admin_key(admin_id)?;
        match self.admins.get(key.as_bytes())? {
            Some(raw) => Ok(Some(Self::deserialize(&raw)?)),
            None => Ok(None),
        }
    }

    pub fn get_admin_by_email(&self, email: &str) -> Result<Option<Admin>, StoreError> {
        let index_key = keys::admin_email_index_key(email);
        let Some(raw_id) = self.admins.get(index_key.as_bytes())? else {
            return Ok(None);
        };
        match std::str::from_utf8(&raw_id) {
            Ok(admin_id) => self.get_admin_by_id(admin_id),
            Err(e) => {
                tracing::warn!(error = %e, "Invalid UTF-8 in admin email index");
                Ok(None)
            }
        }
    }

    /// 是否已完成首个管理员的初始化
    pub fn any_admin_exists(&self) -> Result<bool, StoreError> {
        for item in self.admins.iter() {
            let (key, _) = item?;
            if !key.starts_with(b"email:") {
                return Ok(true);
            }
        }
        Ok(false)
    }
}
