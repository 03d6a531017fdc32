use sqlx::types::Json;
use sqlx::PgPool;

use crate::error::{AppError, AppResult};
use crate::models::{UpsertPreferences, UserNotificationPreference};
use crate::repository::postgres::PREFERENCE_COLUMNS;

pub struct PreferenceService;

impl PreferenceService {
    /// Stored preferences of a user, or the defaults when none were saved
    pub async fn get(pool: &PgPool, user_id: &str) -> AppResult<UserNotificationPreference> {
        let query =
            format!("SELECT {PREFERENCE_COLUMNS} FROM notification_preferences WHERE user_id = $1");
        let prefs = sqlx::query_as::<_, UserNotificationPreference>(&query)
            .bind(user_id)
            .fetch_optional(pool)
            .await?;

        Ok(prefs.unwrap_or_else(|| UserNotificationPreference::defaults(user_id)))
    }

    /// Replaces a user's preferences
    pub async fn upsert(
        pool: &PgPool,
        user_id: &str,
        input: UpsertPreferences,
    ) -> AppResult<UserNotificationPreference> {
        if user_id.trim().is_empty() {
            return Err(AppError::Validation("User id must not be empty".to_string()));
        }
        if input.quiet_hours_start.is_some() != input.quiet_hours_end.is_some() {
            return Err(AppError::Validation(
                "Quiet hours need both a start and an end".to_string(),
            ));
        }

        let query = format!(
            r#"
            INSERT INTO notification_preferences (
                user_id, email_enabled, sms_enabled, push_enabled, in_app_enabled,
                subscribed_alerts, quiet_hours_start, quiet_hours_end, digest_frequency
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (user_id) DO UPDATE
            SET email_enabled = EXCLUDED.email_enabled,
                sms_enabled = EXCLUDED.sms_enabled,
                push_enabled = EXCLUDED.push_enabled,
                in_app_enabled = EXCLUDED.in_app_enabled,
                subscribed_alerts = EXCLUDED.subscribed_alerts,
                quiet_hours_start = EXCLUDED.quiet_hours_start,
                quiet_hours_end = EXCLUDED.quiet_hours_end,
                digest_frequency = EXCLUDED.digest_frequency,
                updated_at = NOW()
            RETURNING {PREFERENCE_COLUMNS}
            "#
        );
        let prefs = sqlx::query_as::<_, UserNotificationPreference>(&query)
            .bind(user_id)
            .bind(input.email_enabled)
            .bind(input.sms_enabled)
            .bind(input.push_enabled)
            .bind(input.in_app_enabled)
            .bind(Json(&input.subscribed_alerts))
            .bind(input.quiet_hours_start)
            .bind(input.quiet_hours_end)
            .bind(input.digest_frequency)
            .fetch_one(pool)
            .await?;

        Ok(prefs)
    }
}
