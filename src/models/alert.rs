//! Alert rule models.
//!
//! Rules are keyed by a trigger code, carry the ordered set of channels they
//! deliver on, a structured condition payload and their static recipients.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use std::collections::HashMap;

use super::condition::AlertCondition;

// =============================================================================
// Channel Kind Enum
// =============================================================================

/// Delivery channel kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    Email,
    Sms,
    Push,
    Webhook,
    InApp,
}

impl ChannelKind {
    pub const ALL: [ChannelKind; 5] = [
        ChannelKind::Email,
        ChannelKind::Sms,
        ChannelKind::Push,
        ChannelKind::Webhook,
        ChannelKind::InApp,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelKind::Email => "email",
            ChannelKind::Sms => "sms",
            ChannelKind::Push => "push",
            ChannelKind::Webhook => "webhook",
            ChannelKind::InApp => "in_app",
        }
    }
}

impl std::fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ChannelKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ChannelKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("Unknown channel '{}'", s))
    }
}

// =============================================================================
// Recipient Type Enum
// =============================================================================

/// How a static recipient value is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RecipientType {
    /// Reference to a user id, resolved through the user directory
    User,
    /// Raw email address
    Email,
    /// Raw phone number
    Phone,
}

impl std::fmt::Display for RecipientType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecipientType::User => write!(f, "user"),
            RecipientType::Email => write!(f, "email"),
            RecipientType::Phone => write!(f, "phone"),
        }
    }
}

// =============================================================================
// Alert Rule Model
// =============================================================================

/// Alert rule definition
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct AlertRule {
    pub id: i32,
    pub code: String,
    pub label: String,
    pub description: Option<String>,
    pub channels: Json<Vec<ChannelKind>>,
    pub condition: serde_json::Value,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AlertRule {
    pub fn has_channel(&self, kind: ChannelKind) -> bool {
        self.channels.0.contains(&kind)
    }

    /// Parses the stored condition payload
    pub fn parsed_condition(&self) -> AlertCondition {
        AlertCondition::parse(&self.condition)
    }

    /// Converts to response with recipients
    pub fn to_response(&self, recipients: Vec<AlertRecipient>) -> AlertRuleResponse {
        AlertRuleResponse {
            id: self.id,
            code: self.code.clone(),
            label: self.label.clone(),
            description: self.description.clone(),
            channels: self.channels.0.clone(),
            condition: self.condition.clone(),
            is_active: self.is_active,
            recipients,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Static fan-out target of a rule
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct AlertRecipient {
    pub id: i32,
    pub alert_rule_id: i32,
    pub recipient_type: RecipientType,
    pub value: String,
    pub channel: ChannelKind,
    pub created_at: DateTime<Utc>,
}

/// Recipient as submitted when creating or updating a rule
#[derive(Debug, Clone, Deserialize)]
pub struct RecipientInput {
    pub recipient_type: RecipientType,
    pub value: String,
    pub channel: ChannelKind,
}

/// DTO for creating an alert rule
#[derive(Debug, Deserialize)]
pub struct CreateAlertRule {
    pub code: String,
    pub label: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub channels: Vec<ChannelKind>,
    #[serde(default = "default_condition")]
    pub condition: serde_json::Value,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub recipients: Vec<RecipientInput>,
}

fn default_condition() -> serde_json::Value {
    serde_json::json!({})
}

fn default_true() -> bool {
    true
}

/// DTO for updating an alert rule
///
/// `recipients`, when present, replaces the whole recipient list.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateAlertRule {
    pub label: Option<String>,
    pub description: Option<String>,
    pub channels: Option<Vec<ChannelKind>>,
    pub condition: Option<serde_json::Value>,
    pub is_active: Option<bool>,
    pub recipients: Option<Vec<RecipientInput>>,
}

/// Response for an alert rule including its recipients
#[derive(Debug, Serialize)]
pub struct AlertRuleResponse {
    pub id: i32,
    pub code: String,
    pub label: String,
    pub description: Option<String>,
    pub channels: Vec<ChannelKind>,
    pub condition: serde_json::Value,
    pub is_active: bool,
    pub recipients: Vec<AlertRecipient>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Test Send Payload
// =============================================================================

/// Ad-hoc destination attached to a test send
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtraRecipient {
    pub channel: ChannelKind,
    pub value: String,
}

/// Admin-triggered test send of a rule
///
/// `{{name}}` placeholders in `subject` and `body` are replaced from
/// `variables`. Missing subject or body fall back to the rule template.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TestAlertPayload {
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub variables: HashMap<String, String>,
    #[serde(default)]
    pub recipients: Vec<ExtraRecipient>,
}
