//! Per-user notification preferences.

use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;

use super::alert::ChannelKind;

/// How often non-urgent notifications are grouped
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DigestFrequency {
    #[default]
    Immediate,
    Daily,
    Weekly,
}

/// Stored preference record
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct UserNotificationPreference {
    pub user_id: String,
    pub email_enabled: bool,
    pub sms_enabled: bool,
    pub push_enabled: bool,
    pub in_app_enabled: bool,
    /// Alert codes the user wants; empty means all
    pub subscribed_alerts: Json<Vec<String>>,
    pub quiet_hours_start: Option<NaiveTime>,
    pub quiet_hours_end: Option<NaiveTime>,
    pub digest_frequency: DigestFrequency,
    pub updated_at: Option<DateTime<Utc>>,
}

impl UserNotificationPreference {
    /// Preferences applied when the user never saved any
    pub fn defaults(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            email_enabled: true,
            sms_enabled: true,
            push_enabled: false,
            in_app_enabled: true,
            subscribed_alerts: Json(Vec::new()),
            quiet_hours_start: None,
            quiet_hours_end: None,
            digest_frequency: DigestFrequency::Immediate,
            updated_at: None,
        }
    }

    pub fn channel_enabled(&self, kind: ChannelKind) -> bool {
        match kind {
            ChannelKind::Email => self.email_enabled,
            ChannelKind::Sms => self.sms_enabled,
            ChannelKind::Push => self.push_enabled,
            ChannelKind::InApp => self.in_app_enabled,
            ChannelKind::Webhook => true,
        }
    }

    pub fn is_subscribed(&self, alert_code: &str) -> bool {
        self.subscribed_alerts.0.is_empty()
            || self.subscribed_alerts.0.iter().any(|c| c == alert_code)
    }

    /// Whether `time` falls in the quiet window; the window may wrap midnight
    pub fn in_quiet_hours(&self, time: NaiveTime) -> bool {
        match (self.quiet_hours_start, self.quiet_hours_end) {
            (Some(start), Some(end)) if start < end => time >= start && time < end,
            (Some(start), Some(end)) if start > end => time >= start || time < end,
            _ => false,
        }
    }

    /// Whether a delivery of `alert_code` on `kind` may go out at `time`
    ///
    /// Quiet hours hold back the interrupting channels (email, SMS, push);
    /// the in-app feed is always written when enabled.
    pub fn allows(&self, kind: ChannelKind, alert_code: &str, time: NaiveTime) -> bool {
        if !self.channel_enabled(kind) || !self.is_subscribed(alert_code) {
            return false;
        }
        match kind {
            ChannelKind::Email | ChannelKind::Sms | ChannelKind::Push => !self.in_quiet_hours(time),
            ChannelKind::InApp | ChannelKind::Webhook => true,
        }
    }
}

fn default_true() -> bool {
    true
}

/// DTO for replacing a user's preferences; omitted fields take default values
#[derive(Debug, Deserialize)]
pub struct UpsertPreferences {
    #[serde(default = "default_true")]
    pub email_enabled: bool,
    #[serde(default = "default_true")]
    pub sms_enabled: bool,
    #[serde(default)]
    pub push_enabled: bool,
    #[serde(default = "default_true")]
    pub in_app_enabled: bool,
    #[serde(default)]
    pub subscribed_alerts: Vec<String>,
    #[serde(default)]
    pub quiet_hours_start: Option<NaiveTime>,
    #[serde(default)]
    pub quiet_hours_end: Option<NaiveTime>,
    #[serde(default)]
    pub digest_frequency: DigestFrequency,
}
