use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sled::transaction::{ConflictableTransactionError, TransactionError};

use crate::store::keys;
use crate::store::{Store, StoreError};

/// 登录会话。token 本身不落库，只存 SHA-256 摘要。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthSession {
    pub token_hash: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl AuthSession {
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

fn tx_error(error: TransactionError<()>) -> StoreError {
    match error {
        TransactionError::Abort(()) => {
            StoreError::Sled(sled::Error::Unsupported("transaction aborted".into()))
        }
        TransactionError::Storage(e) => StoreError::Sled(e),
    }
}

fn put(tree: &sled::Tree, session: &AuthSession) -> Result<(), StoreError> {
    let key = keys::session_key(&session.token_hash)?.into_bytes();
    let index = keys::session_user_index_key(&session.user_id, &session.token_hash)?.into_bytes();
    let value = Store::serialize(session)?;

    tree.transaction(move |tx| {
        tx.insert(key.as_slice(), value.as_slice())?;
        tx.insert(index.as_slice(), &[] as &[u8])?;
        Ok::<(), ConflictableTransactionError<()>>(())
    })
    .map_err(tx_error)
}

fn get_live(tree: &sled::Tree, token_hash: &str) -> Result<Option<AuthSession>, StoreError> {
    let key = keys::session_key(token_hash)?;
    let Some(raw) = tree.get(key.as_bytes())? else {
        return Ok(None);
    };
    let session: AuthSession = Store::deserialize(&raw)?;
    Ok(session.is_live(Utc::now()).then_some(session))
}

fn remove(tree: &sled::Tree, token_hash: &str) -> Result<bool, StoreError> {
    let key = keys::session_key(token_hash)?;
    let Some(raw) = tree.get(key.as_bytes())? else {
        return Ok(false);
    };
    let index = Store::deserialize::<AuthSession>(&raw)
        .ok()
        .and_then(|s| keys::session_user_index_key(&s.user_id, token_hash).ok())
        .map(String::into_bytes);
    let key = key.into_bytes();

    tree.transaction(move |tx| {
        if let Some(index) = &index {
            tx.remove(index.as_slice())?;
        }
        tx.remove(key.as_slice())?;
        Ok::<(), ConflictableTransactionError<()>>(())
    })
    .map_err(tx_error)?;
    Ok(true)
}

/// 清理过期会话，单次最多处理 `limit` 条。
fn sweep(tree: &sled::Tree, now: DateTime<Utc>, limit: usize) -> Result<u32, StoreError> {
    let mut expired = Vec::new();
    for item in tree.iter() {
        let (key, value) = item?;
        if key.starts_with(b"user:") {
            continue;
        }
        let session: AuthSession = Store::deserialize(&value)?;
        if !session.is_live(now) {
            expired.push(session.token_hash);
            if expired.len() >= limit {
                break;
            }
        }
    }

    let mut removed = 0u32;
    for token_hash in expired {
        if remove(tree, &token_hash)? {
            removed += 1;
        }
    }
    Ok(removed)
}

const SWEEP_BATCH: usize = 1000;

impl Store {
    pub fn create_session(&self, session: &AuthSession) -> Result<(), StoreError> {
        put(&self.sessions, session)
    }

    pub fn get_session(&self, token_hash: &str) -> Result<Option<AuthSession>, StoreError> {
        get_live(&self.sessions, token_hash)
    }

    pub fn delete_session(&self, token_hash: &str) -> Result<bool, StoreError> {
        remove(&self.sessions, token_hash)
    }

    /// 同一用户的会话超过上限时，从最早创建的开始淘汰。
    pub fn trim_user_sessions(&self, user_id: &str, max_sessions: usize) -> Result<(), StoreError> {
        let prefix = keys::session_user_index_prefix(user_id)?;
        let mut live: Vec<(String, DateTime<Utc>)> = Vec::new();

        for item in self.sessions.scan_prefix(prefix.as_bytes()) {
            let (key, _) = item?;
            let Some(token_hash) = key
                .strip_prefix(prefix.as_bytes())
                .and_then(|rest| std::str::from_utf8(rest).ok())
            else {
                continue;
            };
            let session_key = keys::session_key(token_hash)?;
            if let Some(raw) = self.sessions.get(session_key.as_bytes())? {
                let session: AuthSession = Self::deserialize(&raw)?;
                live.push((session.token_hash, session.created_at));
            }
        }

        if live.len() <= max_sessions {
            return Ok(());
        }
        live.sort_by_key(|(_, created_at)| *created_at);
        let excess = live.len() - max_sessions;
        for (token_hash, _) in live.into_iter().take(excess) {
            self.delete_session(&token_hash)?;
        }
        Ok(())
    }

    pub fn create_admin_session(&self, session: &AuthSession) -> Result<(), StoreError> {
        put(&self.admin_sessions, session)
    }

    pub fn get_admin_session(&self, token_hash: &str) -> Result<Option<AuthSession>, StoreError> {
        get_live(&self.admin_sessions, token_hash)
    }

    pub fn delete_admin_session(&self, token_hash: &str) -> Result<bool, StoreError> {
        remove(&self.admin_sessions, token_hash)
    }

    /// 清理用户与管理员两棵树中的过期会话，返回删除总数。
    pub fn cleanup_expired_sessions(&self) -> Result<u32, StoreError> {
        let now = Utc::now();
        let users = sweep(&self.sessions, now, SWEEP_BATCH)?;
        let admins = sweep(&self.admin_sessions, now, SWEEP_BATCH)?;
        Ok(users + admins)
    }
}
