//! Alert rule administration: rule CRUD with recipients and delivery history.

use sqlx::{PgPool, Postgres, Transaction};

use crate::error::{AppError, AppResult};
use crate::models::{
    AlertRecipient, AlertRule, ChannelKind, CreateAlertRule, Notification, RecipientInput,
    RecipientType, UpdateAlertRule,
};
use crate::repository::postgres::{NOTIFICATION_COLUMNS, RECIPIENT_COLUMNS, RULE_COLUMNS};

/// Result of a delete request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleRemoval {
    Deleted,
    /// Rule has delivery history and was deactivated instead
    Deactivated,
}

pub struct AlertService;

impl AlertService {
    // =========================================================================
    // Validation
    // =========================================================================

    /// Trigger codes are upper-case identifiers such as `TRESORERIE_FAIBLE`
    pub fn validate_code(code: &str) -> AppResult<()> {
        let valid = !code.is_empty()
            && code.len() <= 100
            && code
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_');

        if !valid {
            return Err(AppError::Validation(format!(
                "Invalid alert code '{}': use upper-case letters, digits and underscores",
                code
            )));
        }
        Ok(())
    }

    /// Checks channels and that every recipient targets one of them
    pub fn validate_definition(
        channels: &[ChannelKind],
        recipients: &[RecipientInput],
    ) -> AppResult<()> {
        for (i, channel) in channels.iter().enumerate() {
            if channels[..i].contains(channel) {
                return Err(AppError::Validation(format!(
                    "Channel {} listed twice",
                    channel
                )));
            }
        }

        for recipient in recipients {
            let value = recipient.value.trim();
            if value.is_empty() {
                return Err(AppError::Validation(
                    "Recipient value must not be empty".to_string(),
                ));
            }

            if !channels.contains(&recipient.channel) {
                return Err(AppError::Validation(format!(
                    "Recipient {} uses channel {} which is not enabled on the rule",
                    value, recipient.channel
                )));
            }

            match (recipient.recipient_type, recipient.channel) {
                (RecipientType::User, ChannelKind::Webhook) => {
                    return Err(AppError::Validation(
                        "Webhook recipients must be URLs, not users".to_string(),
                    ))
                }
                (RecipientType::Email, ChannelKind::Email) if !value.contains('@') => {
                    return Err(AppError::Validation(format!(
                        "Invalid email address: {}",
                        value
                    )))
                }
                (RecipientType::Email, ChannelKind::Sms) | (RecipientType::Phone, ChannelKind::Email) => {
                    return Err(AppError::Validation(format!(
                        "Recipient type {} cannot be used with channel {}",
                        recipient.recipient_type, recipient.channel
                    )))
                }
                _ => {}
            }
        }

        Ok(())
    }

    // =========================================================================
    // Alert Rule CRUD
    // =========================================================================

    /// Lists every alert rule
    pub async fn list_rules(pool: &PgPool) -> AppResult<Vec<AlertRule>> {
        let query = format!("SELECT {RULE_COLUMNS} FROM alert_rules ORDER BY code");
        let rules = sqlx::query_as::<_, AlertRule>(&query)
            .fetch_all(pool)
            .await?;

        Ok(rules)
    }

    /// Gets an alert rule by ID
    pub async fn get_rule(pool: &PgPool, id: i32) -> AppResult<AlertRule> {
        let query = format!("SELECT {RULE_COLUMNS} FROM alert_rules WHERE id = $1");
        sqlx::query_as::<_, AlertRule>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Alert rule {} not found", id)))
    }

    /// Gets the static recipients of a rule
    pub async fn get_recipients(pool: &PgPool, rule_id: i32) -> AppResult<Vec<AlertRecipient>> {
        let query = format!(
            "SELECT {RECIPIENT_COLUMNS} FROM alert_recipients WHERE alert_rule_id = $1 ORDER BY id"
        );
        let recipients = sqlx::query_as::<_, AlertRecipient>(&query)
            .bind(rule_id)
            .fetch_all(pool)
            .await?;

        Ok(recipients)
    }

    /// Creates an alert rule with its recipients
    pub async fn create_rule(pool: &PgPool, input: CreateAlertRule) -> AppResult<AlertRule> {
        Self::validate_code(&input.code)?;
        if input.label.trim().is_empty() {
            return Err(AppError::Validation("Label must not be empty".to_string()));
        }
        Self::validate_definition(&input.channels, &input.recipients)?;

        let mut tx = pool.begin().await?;

        let query = format!(
            r#"
            INSERT INTO alert_rules (code, label, description, channels, condition, is_active)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {RULE_COLUMNS}
            "#
        );
        let rule = sqlx::query_as::<_, AlertRule>(&query)
            .bind(&input.code)
            .bind(input.label.trim())
            .bind(&input.description)
            .bind(sqlx::types::Json(&input.channels))
            .bind(&input.condition)
            .bind(input.is_active)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| {
                if let sqlx::Error::Database(ref db_err) = e {
                    if db_err.constraint() == Some("alert_rules_code_key") {
                        return AppError::Conflict(format!(
                            "Alert rule '{}' already exists",
                            input.code
                        ));
                    }
                }
                AppError::Database(e)
            })?;

        Self::insert_recipients(&mut tx, rule.id, &input.recipients).await?;

        tx.commit().await?;

        log::info!("Created alert rule {} ({})", rule.code, rule.id);
        Ok(rule)
    }

    /// Updates an alert rule; provided recipients replace the existing ones
    pub async fn update_rule(pool: &PgPool, id: i32, input: UpdateAlertRule) -> AppResult<AlertRule> {
        if matches!(input.label.as_deref(), Some(label) if label.trim().is_empty()) {
            return Err(AppError::Validation("Label must not be empty".to_string()));
        }

        let existing = Self::get_rule(pool, id).await?;
        let channels = input
            .channels
            .clone()
            .unwrap_or_else(|| existing.channels.0.clone());
        if let Some(ref recipients) = input.recipients {
            Self::validate_definition(&channels, recipients)?;
        } else {
            Self::validate_definition(&channels, &[])?;
        }

        let mut tx = pool.begin().await?;

        let query = format!(
            r#"
            UPDATE alert_rules
            SET label = COALESCE($2, label),
                description = COALESCE($3, description),
                channels = COALESCE($4, channels),
                condition = COALESCE($5, condition),
                is_active = COALESCE($6, is_active),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {RULE_COLUMNS}
            "#
        );
        let rule = sqlx::query_as::<_, AlertRule>(&query)
            .bind(id)
            .bind(input.label.as_deref().map(str::trim))
            .bind(&input.description)
            .bind(input.channels.as_ref().map(sqlx::types::Json))
            .bind(&input.condition)
            .bind(input.is_active)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Alert rule {} not found", id)))?;

        if let Some(ref recipients) = input.recipients {
            sqlx::query("DELETE FROM alert_recipients WHERE alert_rule_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;

            Self::insert_recipients(&mut tx, id, recipients).await?;
        }

        tx.commit().await?;

        Ok(rule)
    }

    async fn insert_recipients(
        tx: &mut Transaction<'_, Postgres>,
        rule_id: i32,
        recipients: &[RecipientInput],
    ) -> AppResult<()> {
        for recipient in recipients {
            sqlx::query(
                r#"
                INSERT INTO alert_recipients (alert_rule_id, recipient_type, value, channel)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(rule_id)
            .bind(recipient.recipient_type.to_string())
            .bind(recipient.value.trim())
            .bind(recipient.channel.as_str())
            .execute(&mut **tx)
            .await?;
        }

        Ok(())
    }

    /// Deletes an alert rule, or deactivates it when notifications reference it
    pub async fn delete_rule(pool: &PgPool, id: i32) -> AppResult<RuleRemoval> {
        let mut tx = pool.begin().await?;

        let referenced: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM notifications WHERE alert_rule_id = $1)",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        let (result, removal) = if referenced {
            let result = sqlx::query(
                "UPDATE alert_rules SET is_active = FALSE, updated_at = NOW() WHERE id = $1",
            )
            .bind(id)
            .execute(&mut *tx)
            .await?;
            (result, RuleRemoval::Deactivated)
        } else {
            let result = sqlx::query("DELETE FROM alert_rules WHERE id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            (result, RuleRemoval::Deleted)
        };

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Alert rule {} not found", id)));
        }

        tx.commit().await?;

        log::info!("Alert rule {} {:?}", id, removal);
        Ok(removal)
    }

    // =========================================================================
    // Delivery History
    // =========================================================================

    /// Lists delivery records of a rule, newest first
    pub async fn list_history(pool: &PgPool, rule_id: i32, limit: i64) -> AppResult<Vec<Notification>> {
        let query = format!(
            r#"
            SELECT {NOTIFICATION_COLUMNS}
            FROM notifications
            WHERE alert_rule_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2
            "#
        );
        let history = sqlx::query_as::<_, Notification>(&query)
            .bind(rule_id)
            .bind(limit)
            .fetch_all(pool)
            .await?;

        Ok(history)
    }
}
