use crate::store::StoreError;

const SEP: char = ':';

/// 复合 key 的各段不能包含分隔符，否则前缀扫描会串到别的用户/题目。
fn segment(value: &str) -> Result<&str, StoreError> {
    if value.is_empty() {
        return Err(StoreError::Validation("key segment must not be empty".into()));
    }
    if value.contains(SEP) {
        return Err(StoreError::Validation(format!(
            "key segment must not contain '{SEP}': {value}"
        )));
    }
    Ok(value)
}

fn reverse_ts(timestamp_ms: i64) -> u64 {
    u64::MAX - timestamp_ms.max(0) as u64
}

pub fn user_key(user_id: &str) -> Result<String, StoreError> {
    Ok(segment(user_id)?.to_string())
}

pub fn user_email_index_key(email: &str) -> String {
    format!("email:{}", email.to_lowercase())
}

pub fn session_key(token_hash: &str) -> Result<String, StoreError> {
    Ok(segment(token_hash)?.to_string())
}

pub fn session_user_index_key(user_id: &str, token_hash: &str) -> Result<String, StoreError> {
    Ok(format!("user:{}:{}", segment(user_id)?, segment(token_hash)?))
}

pub fn session_user_index_prefix(user_id: &str) -> Result<String, StoreError> {
    Ok(format!("user:{}:", segment(user_id)?))
}

pub fn admin_key(admin_id: &str) -> Result<String, StoreError> {
    Ok(segment(admin_id)?.to_string())
}

pub fn admin_email_index_key(email: &str) -> String {
    format!("email:{}", email.to_lowercase())
}

pub fn question_key(question_id: &str) -> Result<String, StoreError> {
    Ok(segment(question_id)?.to_string())
}

pub fn practice_run_key(run_id: &str) -> Result<String, StoreError> {
    Ok(segment(run_id)?.to_string())
}

/// 作答中会话的索引与会话本体同树，前缀不会与 run id 冲突（id 不含分隔符）。
pub const PRACTICE_RUN_ACTIVE_PREFIX: &str = "active:";

pub fn practice_run_active_key(run_id: &str) -> Result<String, StoreError> {
    Ok(format!("{PRACTICE_RUN_ACTIVE_PREFIX}{}", segment(run_id)?))
}

/// `{user_id}:{reverse_ts:020}:{session_id}`，同一用户的练习记录按完成时间倒序排列。
pub fn practice_session_key(
    user_id: &str,
    completed_at_ms: i64,
    session_id: &str,
) -> Result<String, StoreError> {
    Ok(format!(
        "{}:{:020}:{}",
        segment(user_id)?,
        reverse_ts(completed_at_ms),
        segment(session_id)?
    ))
}

pub fn practice_session_prefix(user_id: &str) -> Result<String, StoreError> {
    Ok(format!("{}:", segment(user_id)?))
}

pub fn answer_record_key(session_id: &str, question_id: &str) -> Result<String, StoreError> {
    Ok(format!("{}:{}", segment(session_id)?, segment(question_id)?))
}

pub fn answer_record_prefix(session_id: &str) -> Result<String, StoreError> {
    Ok(format!("{}:", segment(session_id)?))
}

pub fn wrong_answer_key(user_id: &str, question_id: &str) -> Result<String, StoreError> {
    Ok(format!("{}:{}", segment(user_id)?, segment(question_id)?))
}

pub fn wrong_answer_prefix(user_id: &str) -> Result<String, StoreError> {
    Ok(format!("{}:", segment(user_id)?))
}

pub fn favorite_key(user_id: &str, question_id: &str) -> Result<String, StoreError> {
    Ok(format!("{}:{}", segment(user_id)?, segment(question_id)?))
}

pub fn favorite_prefix(user_id: &str) -> Result<String, StoreError> {
    Ok(format!("{}:", segment(user_id)?))
}

pub fn explanation_job_key(job_id: &str) -> Result<String, StoreError> {
    Ok(segment(job_id)?.to_string())
}

pub fn operator_alert_key(created_at_ms: i64, alert_id: &str) -> Result<String, StoreError> {
    Ok(format!("{:020}:{}", reverse_ts(created_at_ms), segment(alert_id)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn practice_session_key_orders_by_time_desc() {
        let k_new = practice_session_key("u1", 2000, "s2").unwrap();
        let k_old = practice_session_key("u1", 1000, "s1").unwrap();
        assert!(k_new < k_old);
    }

    #[test]
    fn email_index_is_normalized() {
        assert_eq!(user_email_index_key("A@Ex.com"), "email:a@ex.com");
    }

    #[test]
    fn separator_in_segment_is_rejected() {
        assert!(matches!(
            favorite_key("u:1", "q1"),
            Err(StoreError::Validation(_))
        ));
        assert!(wrong_answer_key("u1", "").is_err());
    }
}
