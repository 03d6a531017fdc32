//! Channel settings: one row per channel kind, read at send time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::HashMap;

use super::alert::ChannelKind;

/// Stored settings and health of a delivery channel
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct NotificationChannel {
    pub channel: ChannelKind,
    pub is_enabled: bool,
    pub config: serde_json::Value,
    pub failure_count: i32,
    pub last_failure_at: Option<DateTime<Utc>>,
    pub last_failure_message: Option<String>,
    pub last_success_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

/// DTO for updating a channel
#[derive(Debug, Deserialize)]
pub struct UpdateNotificationChannel {
    pub is_enabled: Option<bool>,
    pub config: Option<serde_json::Value>,
}

// =============================================================================
// Channel Configuration Types
// =============================================================================

/// Email channel configuration; unset fields fall back to SMTP_* variables
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmailConfig {
    #[serde(default)]
    pub smtp_host: Option<String>,
    #[serde(default)]
    pub smtp_port: Option<u16>,
    #[serde(default)]
    pub smtp_username: Option<String>,
    #[serde(default)]
    pub smtp_password: Option<String>,
    #[serde(default)]
    pub from_address: Option<String>,
}

/// SMS gateway configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SmsConfig {
    #[serde(default)]
    pub gateway_url: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub sender: Option<String>,
}

/// Push gateway configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PushConfig {
    #[serde(default)]
    pub gateway_url: Option<String>,
    #[serde(default)]
    pub server_key: Option<String>,
}

/// Webhook configuration; `url` is used when a recipient carries no URL
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WebhookConfig {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub secret: Option<String>,
    #[serde(default)]
    pub headers: Option<HashMap<String, String>>,
}
