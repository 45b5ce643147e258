use crate::practice::{PracticeRun, RunStatus};
use crate::store::keys;
use crate::store::operations::questions::{ExplanationSource, Question};
use crate::store::{Store, StoreError};

const VERSION_KEY: &str = "_meta:version";

type MigrationFn = fn(&Store) -> Result<(), StoreError>;

fn migrations() -> Vec<(&'static str, MigrationFn)> {
    vec![
        ("001_initial", m001_initial),
        ("002_explanation_source", m002_explanation_source),
        ("003_active_run_index", m003_active_run_index),
    ]
}

/// 执行所有未应用的数据库迁移。
///
/// - 每个迁移函数必须幂等：迁移可能在 func() 成功但 set_version() 之前中断，
///   重启后会重新执行。
/// - 版本号在每个迁移成功后立即持久化。
/// - 仅向前：set_version 拒绝降级。
pub fn run(store: &Store) -> Result<(), StoreError> {
    let current = get_current_version(store)?;
    let all = migrations();

    for (index, (name, func)) in all.iter().enumerate() {
        let version = (index + 1) as u32;
        if version > current {
            tracing::info!(version, name, "Running migration");
            func(store)?;
            set_version(store, version)?;
            tracing::info!(version, name, "Migration complete");
        } else {
            tracing::debug!(version, name, "Migration already applied, skipping");
        }
    }

    Ok(())
}

pub fn get_current_version(store: &Store) -> Result<u32, StoreError> {
    match store.config_versions.get(VERSION_KEY.as_bytes())? {
        Some(raw) => {
            let bytes: [u8; 4] = raw.as_ref().try_into().map_err(|_| StoreError::Migration {
                version: 0,
                message: format!("corrupt version marker ({} bytes)", raw.len()),
            })?;
            Ok(u32::from_be_bytes(bytes))
        }
        None => Ok(0),
    }
}

pub fn set_version(store: &Store, version: u32) -> Result<(), StoreError> {
    let current = get_current_version(store)?;
    if version < current {
        return Err(StoreError::Migration {
            version,
            message: format!("Refuse to downgrade from {} to {}", current, version),
        });
    }

    store
        .config_versions
        .insert(VERSION_KEY.as_bytes(), &version.to_be_bytes())?;
    Ok(())
}

fn m001_initial(_store: &Store) -> Result<(), StoreError> {
    Ok(())
}

/// 早期导入的题目只有解析文本没有来源标记，统一视为人工编写。
fn m002_explanation_source(store: &Store) -> Result<(), StoreError> {
    for item in store.questions.iter() {
        let (key, value) = item?;
        let mut question: Question = Store::deserialize(&value)?;
        if question.explanation.is_some() && question.explanation_source.is_none() {
            question.explanation_source = Some(ExplanationSource::Human);
            store
                .questions
                .insert(key, Store::serialize(&question)?)?;
        }
    }
    Ok(())
}

/// 为已有的作答中会话补建索引；重写一遍即可由 `save_practice_run` 维护索引。
fn m003_active_run_index(store: &Store) -> Result<(), StoreError> {
    let mut runs = Vec::new();
    for item in store.practice_runs.iter() {
        let (key, value) = item?;
        if key.starts_with(keys::PRACTICE_RUN_ACTIVE_PREFIX.as_bytes()) {
            continue;
        }
        match Store::deserialize::<PracticeRun>(&value) {
            Ok(run) if run.status == RunStatus::InProgress => runs.push(run),
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "Skipping unreadable practice run during migration"),
        }
    }
    for run in &runs {
        store.save_practice_run(run)?;
    }
    Ok(())
}
