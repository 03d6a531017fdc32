use sqlx::PgPool;

use crate::error::{AppError, AppResult};
use crate::models::{ChannelKind, NotificationChannel, UpdateNotificationChannel};
use crate::repository::postgres::CHANNEL_COLUMNS;
use crate::services::notification::create_sender;

pub struct ChannelService;

impl ChannelService {
    /// Lists the settings and health of every channel kind
    pub async fn list(pool: &PgPool) -> AppResult<Vec<NotificationChannel>> {
        let query = format!("SELECT {CHANNEL_COLUMNS} FROM notification_channels ORDER BY channel");
        let channels = sqlx::query_as::<_, NotificationChannel>(&query)
            .fetch_all(pool)
            .await?;

        Ok(channels)
    }

    pub async fn get(pool: &PgPool, kind: ChannelKind) -> AppResult<NotificationChannel> {
        let query = format!("SELECT {CHANNEL_COLUMNS} FROM notification_channels WHERE channel = $1");
        sqlx::query_as::<_, NotificationChannel>(&query)
            .bind(kind.as_str())
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Channel {} not found", kind)))
    }

    /// Updates a channel, validating the new config with the channel's sender
    ///
    /// Missing rows are created so every kind can be configured.
    pub async fn update(
        pool: &PgPool,
        kind: ChannelKind,
        input: UpdateNotificationChannel,
    ) -> AppResult<NotificationChannel> {
        if let Some(ref config) = input.config {
            create_sender(kind).validate_config(config)?;
        }

        let query = format!(
            r#"
            INSERT INTO notification_channels (channel, is_enabled, config)
            VALUES ($1, COALESCE($2, TRUE), COALESCE($3, '{{}}'::jsonb))
            ON CONFLICT (channel) DO UPDATE
            SET is_enabled = COALESCE($2, notification_channels.is_enabled),
                config = COALESCE($3, notification_channels.config),
                updated_at = NOW()
            RETURNING {CHANNEL_COLUMNS}
            "#
        );
        let channel = sqlx::query_as::<_, NotificationChannel>(&query)
            .bind(kind.as_str())
            .bind(input.is_enabled)
            .bind(&input.config)
            .fetch_one(pool)
            .await?;

        log::info!(
            "Channel {} updated (enabled: {})",
            channel.channel,
            channel.is_enabled
        );
        Ok(channel)
    }
}
