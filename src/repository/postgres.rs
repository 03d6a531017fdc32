use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;

use super::{AlertRuleRepository, ChannelSettingsRepository, NotificationStore, UserDirectory};
use crate::error::AppResult;
use crate::models::{
    AlertRecipient, AlertRule, ChannelKind, NewNotification, Notification, NotificationChannel,
    UserContact, UserNotificationPreference,
};

pub(crate) const RULE_COLUMNS: &str =
    "id, code, label, description, channels, condition, is_active, created_at, updated_at";

pub(crate) const RECIPIENT_COLUMNS: &str =
    "id, alert_rule_id, recipient_type, value, channel, created_at";

pub(crate) const NOTIFICATION_COLUMNS: &str = "id, alert_rule_id, alert_code, alert_label, \
     user_id, channel, recipient, subject, body, sent, sent_at, error, is_read, read_at, \
     market_id, created_at";

pub(crate) const CHANNEL_COLUMNS: &str = "channel, is_enabled, config, failure_count, \
     last_failure_at, last_failure_message, last_success_at, updated_at";

pub(crate) const PREFERENCE_COLUMNS: &str = "user_id, email_enabled, sms_enabled, push_enabled, \
     in_app_enabled, subscribed_alerts, quiet_hours_start, quiet_hours_end, digest_frequency, \
     updated_at";

/// Postgres-backed implementation of every engine storage trait
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl AlertRuleRepository for PgStore {
    async fn find_by_code(&self, code: &str) -> AppResult<Option<AlertRule>> {
        let query = format!("SELECT {RULE_COLUMNS} FROM alert_rules WHERE code = $1");
        let rule = sqlx::query_as::<_, AlertRule>(&query)
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;

        Ok(rule)
    }

    async fn find_by_id(&self, id: i32) -> AppResult<Option<AlertRule>> {
        let query = format!("SELECT {RULE_COLUMNS} FROM alert_rules WHERE id = $1");
        let rule = sqlx::query_as::<_, AlertRule>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(rule)
    }

    async fn recipients(&self, rule_id: i32) -> AppResult<Vec<AlertRecipient>> {
        let query = format!(
            "SELECT {RECIPIENT_COLUMNS} FROM alert_recipients WHERE alert_rule_id = $1 ORDER BY id"
        );
        let recipients = sqlx::query_as::<_, AlertRecipient>(&query)
            .bind(rule_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(recipients)
    }
}

#[async_trait]
impl UserDirectory for PgStore {
    async fn contact(&self, user_id: &str) -> AppResult<Option<UserContact>> {
        // Host user ids may be integers or text
        let contact = sqlx::query_as::<_, UserContact>(
            "SELECT id::text AS id, email, phone FROM users WHERE id::text = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(contact)
    }

    async fn preferences(&self, user_id: &str) -> AppResult<Option<UserNotificationPreference>> {
        let query =
            format!("SELECT {PREFERENCE_COLUMNS} FROM notification_preferences WHERE user_id = $1");
        let prefs = sqlx::query_as::<_, UserNotificationPreference>(&query)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(prefs)
    }
}

#[async_trait]
impl ChannelSettingsRepository for PgStore {
    async fn settings(&self, kind: ChannelKind) -> AppResult<Option<NotificationChannel>> {
        let query = format!("SELECT {CHANNEL_COLUMNS} FROM notification_channels WHERE channel = $1");
        let channel = sqlx::query_as::<_, NotificationChannel>(&query)
            .bind(kind.as_str())
            .fetch_optional(&self.pool)
            .await?;

        Ok(channel)
    }

    async fn record_outcome(
        &self,
        kind: ChannelKind,
        delivered: bool,
        error: Option<&str>,
    ) -> AppResult<()> {
        if delivered {
            sqlx::query(
                r#"
                UPDATE notification_channels
                SET last_success_at = NOW(), failure_count = 0
                WHERE channel = $1
                "#,
            )
            .bind(kind.as_str())
            .execute(&self.pool)
            .await?;
        } else {
            sqlx::query(
                r#"
                UPDATE notification_channels
                SET last_failure_at = NOW(),
                    last_failure_message = $2,
                    failure_count = failure_count + 1
                WHERE channel = $1
                "#,
            )
            .bind(kind.as_str())
            .bind(error)
            .execute(&self.pool)
            .await?;
        }

        Ok(())
    }
}

#[async_trait]
impl NotificationStore for PgStore {
    async fn record_delivery(&self, notification: NewNotification) -> AppResult<Notification> {
        let query = format!(
            r#"
            INSERT INTO notifications (
                alert_rule_id, alert_code, alert_label, user_id, channel, recipient,
                subject, body, sent, sent_at, error, market_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING {NOTIFICATION_COLUMNS}
            "#
        );
        let sent_at = notification.sent_at(Utc::now());

        let row = sqlx::query_as::<_, Notification>(&query)
            .bind(notification.alert_rule_id)
            .bind(&notification.alert_code)
            .bind(&notification.alert_label)
            .bind(&notification.user_id)
            .bind(notification.channel.as_str())
            .bind(&notification.recipient)
            .bind(&notification.subject)
            .bind(&notification.body)
            .bind(notification.sent)
            .bind(sent_at)
            .bind(&notification.error)
            .bind(notification.market_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(row)
    }

    async fn mark_read(&self, notification_id: i64, user_id: &str) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE notifications
            SET is_read = TRUE, read_at = COALESCE(read_at, NOW())
            WHERE id = $1 AND user_id = $2 AND channel = 'in_app'
            "#,
        )
        .bind(notification_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
