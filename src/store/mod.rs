pub mod keys;
pub mod migrate;
pub mod operations;
pub mod trees;

use serde::de::DeserializeOwned;
use serde::Serialize;
use sled::Db;
use thiserror::Error;

#[derive(Debug)]
pub struct Store {
    db: Db,
    pub users: sled::Tree,
    pub sessions: sled::Tree,
    pub admins: sled::Tree,
    pub admin_sessions: sled::Tree,
    pub config_versions: sled::Tree,
    pub questions: sled::Tree,
    pub practice_runs: sled::Tree,
    pub practice_sessions: sled::Tree,
    pub answer_records: sled::Tree,
    pub wrong_answers: sled::Tree,
    pub favorites: sled::Tree,
    pub explanation_jobs: sled::Tree,
    pub operator_alerts: sled::Tree,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("not found: entity={entity}, key={key}")]
    NotFound { entity: String, key: String },
    #[error("conflict: entity={entity}, key={key}")]
    Conflict { entity: String, key: String },
    #[error("validation error: {0}")]
    Validation(String),
    #[error("migration error at version {version}: {message}")]
    Migration { version: u32, message: String },
}

impl Store {
    pub fn open(sled_path: &str) -> Result<Self, StoreError> {
        let db = sled::open(sled_path)?;
        let users = db.open_tree(trees::USERS)?;
        let sessions = db.open_tree(trees::SESSIONS)?;
        let admins = db.open_tree(trees::ADMINS)?;
        let admin_sessions = db.open_tree(trees::ADMIN_SESSIONS)?;
        let config_versions = db.open_tree(trees::CONFIG_VERSIONS)?;
        let questions = db.open_tree(trees::QUESTIONS)?;
        let practice_runs = db.open_tree(trees::PRACTICE_RUNS)?;
        let practice_sessions = db.open_tree(trees::PRACTICE_SESSIONS)?;
        let answer_records = db.open_tree(trees::ANSWER_RECORDS)?;
        let wrong_answers = db.open_tree(trees::WRONG_ANSWERS)?;
        let favorites = db.open_tree(trees::FAVORITES)?;
        let explanation_jobs = db.open_tree(trees::EXPLANATION_JOBS)?;
        let operator_alerts = db.open_tree(trees::OPERATOR_ALERTS)?;

        Ok(Self {
            db,
            users,
            sessions,
            admins,
            admin_sessions,
            config_versions,
            questions,
            practice_runs,
            practice_sessions,
            answer_records,
            wrong_answers,
            favorites,
            explanation_jobs,
            operator_alerts,
        })
    }

    pub fn run_migrations(&self) -> Result<(), StoreError> {
        migrate::run(self)
    }

    pub fn flush(&self) -> Result<(), StoreError> {
        self.db.flush()?;
        Ok(())
    }

    pub(crate) fn serialize<T: Serialize>(value: &T) -> Result<Vec<u8>, StoreError> {
        Ok(serde_json::to_vec(value)?)
    }

    pub(crate) fn deserialize<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, StoreError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// 将 sled 事务错误折叠回 `StoreError`。
pub(crate) fn map_tx_error(
    error: sled::transaction::TransactionError<StoreError>,
) -> StoreError {
    match error {
        sled::transaction::TransactionError::Abort(store_error) => store_error,
        sled::transaction::TransactionError::Storage(storage_error) => {
            StoreError::Sled(storage_error)
        }
    }
}
