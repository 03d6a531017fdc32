//! Delivery records and the in-app notification feed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::alert::ChannelKind;

/// One delivery attempt to one recipient on one channel
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Notification {
    pub id: i64,
    pub alert_rule_id: Option<i32>,
    pub alert_code: String,
    pub alert_label: String,
    pub user_id: Option<String>,
    pub channel: ChannelKind,
    pub recipient: String,
    pub subject: String,
    pub body: String,
    pub sent: bool,
    pub sent_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
    pub is_read: bool,
    pub read_at: Option<DateTime<Utc>>,
    pub market_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

/// Delivery record about to be written
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub alert_rule_id: Option<i32>,
    pub alert_code: String,
    pub alert_label: String,
    pub user_id: Option<String>,
    pub channel: ChannelKind,
    pub recipient: String,
    pub subject: String,
    pub body: String,
    pub sent: bool,
    pub error: Option<String>,
    pub market_id: Option<i64>,
}

impl NewNotification {
    /// `sent_at` value for this record
    pub fn sent_at(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.sent.then_some(now)
    }
}

/// Query parameters for a user's notification feed
#[derive(Debug, Deserialize)]
pub struct FeedQuery {
    #[serde(default)]
    pub unread_only: bool,
    #[serde(default)]
    pub limit: Option<i64>,
}

impl FeedQuery {
    pub const DEFAULT_LIMIT: i64 = 50;
    pub const MAX_LIMIT: i64 = 200;

    pub fn effective_limit(&self) -> i64 {
        self.limit
            .unwrap_or(Self::DEFAULT_LIMIT)
            .clamp(1, Self::MAX_LIMIT)
    }
}

#[derive(Debug, Serialize)]
pub struct UnreadCount {
    pub count: i64,
}

#[derive(Debug, Serialize)]
pub struct MarkedRead {
    pub updated: u64,
}
