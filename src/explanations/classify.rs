use serde::{Deserialize, Serialize};

use crate::services::llm_provider::LlmError;

/// AI 调用失败的分类，仅用于运营报表。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    InvalidCredential,
    QuotaExceeded,
    RateLimited,
    SafetyFiltered,
    Unparseable,
    Unknown,
}

const CREDENTIAL: &[&str] = &[
    "api key",
    "api_key",
    "unauthenticated",
    "permission_denied",
    "status=401",
    "status=403",
];
const QUOTA: &[&str] = &["quota", "resource_exhausted", "billing"];
const RATE: &[&str] = &["status=429", "rate limit", "too many requests"];
const SAFETY: &[&str] = &["safety", "blocked"];
const UNPARSEABLE: &[&str] = &["parse", "json", "empty response", "decode"];

/// 按错误消息归类。配额检查在限流之前：配额耗尽同样以 429 返回。
pub fn classify_message(message: &str) -> FailureKind {
    let lower = message.to_lowercase();
    let hit = |needles: &[&str]| needles.iter().any(|n| lower.contains(n));

    if hit(CREDENTIAL) {
        FailureKind::InvalidCredential
    } else if hit(QUOTA) {
        FailureKind::QuotaExceeded
    } else if hit(RATE) {
        FailureKind::RateLimited
    } else if hit(SAFETY) {
        FailureKind::SafetyFiltered
    } else if hit(UNPARSEABLE) {
        FailureKind::Unparseable
    } else {
        FailureKind::Unknown
    }
}

pub fn classify(error: &LlmError) -> FailureKind {
    classify_message(&error.to_string())
}
