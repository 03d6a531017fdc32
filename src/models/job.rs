//! Queue job models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::time::Duration;

use super::context::AlertContext;
use crate::events::EventCode;

/// Payload of an alert job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertJob {
    pub event_code: EventCode,
    pub alert_code: String,
    pub context: AlertContext,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_app_user_id: Option<String>,
}

impl AlertJob {
    pub fn new(event_code: EventCode, context: AlertContext) -> Self {
        Self {
            event_code,
            alert_code: event_code.alert_code().to_string(),
            context,
            in_app_user_id: None,
        }
    }

    pub fn with_in_app_user(mut self, user_id: Option<String>) -> Self {
        self.in_app_user_id = user_id;
        self
    }
}

/// Lifecycle state of a stored job; succeeded jobs are deleted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Failed,
}

/// Job counts per status, reported by the readiness probe
#[derive(Debug, Clone, Default, PartialEq, Serialize, FromRow)]
pub struct QueueBacklog {
    pub pending: i64,
    pub running: i64,
    pub failed: i64,
}

/// Job row as claimed from the queue
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct QueuedJob {
    pub id: i64,
    pub job_key: Option<String>,
    pub payload: serde_json::Value,
    pub status: JobStatus,
    /// Attempts started so far, including the current one once claimed
    pub attempts: i32,
    pub max_attempts: i32,
    pub backoff_base_ms: i64,
    pub next_run_at: DateTime<Utc>,
    pub locked_until: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl QueuedJob {
    pub fn decode(&self) -> Result<AlertJob, serde_json::Error> {
        serde_json::from_value(self.payload.clone())
    }
}

/// Retry settings and dedup key attached at enqueue time
#[derive(Debug, Clone, PartialEq)]
pub struct EnqueueOptions {
    pub job_key: Option<String>,
    /// Total attempts, first one included
    pub max_attempts: u32,
    pub backoff_base: Duration,
}

impl EnqueueOptions {
    /// `retries` additional attempts after the first one
    pub fn with_retries(retries: u32, backoff_base: Duration) -> Self {
        Self {
            job_key: None,
            max_attempts: retries.saturating_add(1),
            backoff_base,
        }
    }

    pub fn keyed(mut self, key: impl Into<String>) -> Self {
        self.job_key = Some(key.into());
        self
    }
}

impl Default for EnqueueOptions {
    fn default() -> Self {
        Self::with_retries(2, Duration::from_secs(1))
    }
}
