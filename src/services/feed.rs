//! In-app notification feed of a user.

use sqlx::PgPool;

use crate::error::{AppError, AppResult};
use crate::models::{FeedQuery, MarkedRead, Notification, UnreadCount};
use crate::repository::postgres::NOTIFICATION_COLUMNS;
use crate::repository::{NotificationStore, PgStore};

pub struct NotificationFeedService;

impl NotificationFeedService {
    /// Newest in-app notifications of a user
    pub async fn list(pool: &PgPool, user_id: &str, query: &FeedQuery) -> AppResult<Vec<Notification>> {
        let sql = format!(
            r#"
            SELECT {NOTIFICATION_COLUMNS}
            FROM notifications
            WHERE channel = 'in_app'
              AND user_id = $1
              AND ($2 = FALSE OR is_read = FALSE)
            ORDER BY created_at DESC, id DESC
            LIMIT $3
            "#
        );
        let notifications = sqlx::query_as::<_, Notification>(&sql)
            .bind(user_id)
            .bind(query.unread_only)
            .bind(query.effective_limit())
            .fetch_all(pool)
            .await?;

        Ok(notifications)
    }

    pub async fn unread_count(pool: &PgPool, user_id: &str) -> AppResult<UnreadCount> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM notifications
            WHERE channel = 'in_app' AND user_id = $1 AND is_read = FALSE
            "#,
        )
        .bind(user_id)
        .fetch_one(pool)
        .await?;

        Ok(UnreadCount { count })
    }

    /// Marks one notification read; only its owner may do so
    pub async fn mark_read(pool: &PgPool, notification_id: i64, user_id: &str) -> AppResult<()> {
        let store = PgStore::new(pool.clone());
        if !store.mark_read(notification_id, user_id).await? {
            return Err(AppError::NotFound(format!(
                "Notification {} not found",
                notification_id
            )));
        }

        Ok(())
    }

    pub async fn mark_all_read(pool: &PgPool, user_id: &str) -> AppResult<MarkedRead> {
        let result = sqlx::query(
            r#"
            UPDATE notifications
            SET is_read = TRUE, read_at = NOW()
            WHERE channel = 'in_app' AND user_id = $1 AND is_read = FALSE
            "#,
        )
        .bind(user_id)
        .execute(pool)
        .await?;

        Ok(MarkedRead {
            updated: result.rows_affected(),
        })
    }
}
