use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::keys;
use crate::store::{Store, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    ExplanationFailures,
}

/// 面向运营人员的告警，按创建时间倒序存放。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperatorAlert {
    pub id: String,
    pub kind: AlertKind,
    pub message: String,
    pub failed: u32,
    pub total: u32,
    pub job_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl OperatorAlert {
    pub fn explanation_failures(job_id: Option<&str>, failed: u32, total: u32) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind: AlertKind::ExplanationFailures,
            message: format!("AI explanation batch failed for {failed} of {total} questions"),
            failed,
            total,
            job_id: job_id.map(str::to_string),
            created_at: Utc::now(),
        }
    }
}

impl Store {
    pub fn create_alert(&self, alert: &OperatorAlert) -> Result<(), StoreError> {
        let key = keys::operator_alert_key(alert.created_at.timestamp_millis(), &alert.id)?;
        self.operator_alerts
            .insert(key.as_bytes(), Self::serialize(alert)?)?;
        Ok(())
    }

    pub fn list_alerts(&self, limit: usize) -> Result<Vec<OperatorAlert>, StoreError> {
        let mut out = Vec::new();
        for item in self.operator_alerts.iter().take(limit) {
            let (_, value) = item?;
            out.push(Self::deserialize(&value)?);
        }
        Ok(out)
    }
}
