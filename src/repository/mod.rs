//! Storage seams used by the alert engine.
//!
//! The engine only talks to these traits. [`PgStore`] implements all of them
//! on top of the shared pool; tests substitute in-memory versions.

pub(crate) mod postgres;

use async_trait::async_trait;

use crate::error::AppResult;
use crate::models::{
    AlertRecipient, AlertRule, ChannelKind, NewNotification, Notification, NotificationChannel,
    UserContact, UserNotificationPreference,
};

pub use postgres::PgStore;

/// Alert rule definitions and their static recipients
#[async_trait]
pub trait AlertRuleRepository: Send + Sync {
    async fn find_by_code(&self, code: &str) -> AppResult<Option<AlertRule>>;

    async fn find_by_id(&self, id: i32) -> AppResult<Option<AlertRule>>;

    async fn recipients(&self, rule_id: i32) -> AppResult<Vec<AlertRecipient>>;
}

/// Resolution of user references and their preferences
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn contact(&self, user_id: &str) -> AppResult<Option<UserContact>>;

    /// Stored preferences, `None` when the user never saved any
    async fn preferences(&self, user_id: &str) -> AppResult<Option<UserNotificationPreference>>;
}

/// Per-kind channel settings and health counters
#[async_trait]
pub trait ChannelSettingsRepository: Send + Sync {
    async fn settings(&self, kind: ChannelKind) -> AppResult<Option<NotificationChannel>>;

    async fn record_outcome(
        &self,
        kind: ChannelKind,
        delivered: bool,
        error: Option<&str>,
    ) -> AppResult<()>;
}

/// Append-only delivery records
#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn record_delivery(&self, notification: NewNotification) -> AppResult<Notification>;

    /// Marks an in-app notification read for its owner; false when no such row
    async fn mark_read(&self, notification_id: i64, user_id: &str) -> AppResult<bool>;
}
