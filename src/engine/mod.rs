//! Alert rule engine.
//!
//! Loads the active rule for a trigger code, evaluates its condition, fans
//! out to recipients and records one notification row per delivery attempt.
//! Sends run concurrently; a failing or slow channel never affects its
//! siblings.

pub mod templates;

use chrono::{Local, NaiveTime, Utc};
use futures_util::future::join_all;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use crate::error::{AppError, AppResult};
use crate::models::{
    AlertContext, AlertJob, AlertRecipient, AlertRule, ChannelKind, ExtraRecipient,
    NewNotification, Notification, NotificationChannel, RecipientType, TestAlertPayload,
    UserNotificationPreference,
};
use crate::repository::{
    AlertRuleRepository, ChannelSettingsRepository, NotificationStore, UserDirectory,
};
use crate::services::notification::{DeliveryResult, SenderRegistry};
use templates::RenderedMessage;

pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(30);

// =============================================================================
// Outcomes
// =============================================================================

/// Why a trigger did nothing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    RuleNotFound,
    RuleInactive,
}

/// Summary of one firing
#[derive(Debug, Clone, PartialEq)]
pub struct FireReport {
    pub rule_id: i32,
    pub rule_code: String,
    pub rule_label: String,
    pub notification_ids: Vec<i64>,
    pub delivered: usize,
}

impl FireReport {
    pub fn attempted(&self) -> usize {
        self.notification_ids.len()
    }

    pub fn failed(&self) -> usize {
        self.attempted() - self.delivered
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FireOutcome {
    Skipped(SkipReason),
    ConditionNotMet,
    Fired(FireReport),
}

impl FireOutcome {
    pub fn report(&self) -> Option<&FireReport> {
        match self {
            FireOutcome::Fired(report) => Some(report),
            _ => None,
        }
    }
}

// =============================================================================
// Delivery Planning
// =============================================================================

/// Where subject and body come from
enum MessageSource {
    Template,
    /// Test send: `{{name}}` templates with their own variables
    Custom {
        subject: Option<String>,
        body: Option<String>,
        variables: BTreeMap<String, String>,
    },
}

impl MessageSource {
    fn render(&self, rule: &AlertRule, ctx: &AlertContext, channel: ChannelKind) -> RenderedMessage {
        match self {
            MessageSource::Template => templates::render(&rule.code, &rule.label, channel, ctx),
            MessageSource::Custom {
                subject,
                body,
                variables,
            } => {
                let base = templates::render(&rule.code, &rule.label, ChannelKind::InApp, ctx);
                let message = RenderedMessage {
                    subject: subject
                        .as_deref()
                        .map(|s| templates::substitute(s, variables))
                        .unwrap_or(base.subject),
                    body: body
                        .as_deref()
                        .map(|b| templates::substitute(b, variables))
                        .unwrap_or(base.body),
                };
                templates::shape_for_channel(channel, message)
            }
        }
    }
}

/// One delivery to attempt
#[derive(Debug)]
struct PlannedDelivery {
    channel: ChannelKind,
    destination: String,
    user_id: Option<String>,
    /// Set when the destination could not be resolved; recorded as a failure
    problem: Option<String>,
}

impl PlannedDelivery {
    fn to(channel: ChannelKind, destination: impl Into<String>, user_id: Option<String>) -> Self {
        Self {
            channel,
            destination: destination.into(),
            user_id,
            problem: None,
        }
    }

    fn unresolved(channel: ChannelKind, user_id: &str, problem: String) -> Self {
        Self {
            channel,
            destination: user_id.to_string(),
            user_id: Some(user_id.to_string()),
            problem: Some(problem),
        }
    }
}

// =============================================================================
// Alert Engine
// =============================================================================

pub struct AlertEngine {
    rules: Arc<dyn AlertRuleRepository>,
    users: Arc<dyn UserDirectory>,
    channels: Arc<dyn ChannelSettingsRepository>,
    notifications: Arc<dyn NotificationStore>,
    senders: SenderRegistry,
    send_timeout: Duration,
}

impl AlertEngine {
    /// Builds an engine over a store implementing every storage seam
    pub fn new<S>(store: Arc<S>, senders: SenderRegistry) -> Self
    where
        S: AlertRuleRepository
            + UserDirectory
            + ChannelSettingsRepository
            + NotificationStore
            + 'static,
    {
        Self {
            rules: store.clone(),
            users: store.clone(),
            channels: store.clone(),
            notifications: store,
            senders,
            send_timeout: DEFAULT_SEND_TIMEOUT,
        }
    }

    pub fn with_send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = timeout;
        self
    }

    async fn active_rule(&self, code: &str) -> AppResult<Result<AlertRule, SkipReason>> {
        Ok(match self.rules.find_by_code(code).await? {
            None => Err(SkipReason::RuleNotFound),
            Some(rule) if !rule.is_active => Err(SkipReason::RuleInactive),
            Some(rule) => Ok(rule),
        })
    }

    /// Fires the active rule for `code` without evaluating its condition
    ///
    /// A missing or inactive rule is a silent no-op.
    pub async fn trigger_by_code(&self, code: &str, ctx: &AlertContext) -> AppResult<FireOutcome> {
        let rule = match self.active_rule(code).await? {
            Ok(rule) => rule,
            Err(reason) => {
                log::debug!("Alert {} not fired: {:?}", code, reason);
                return Ok(FireOutcome::Skipped(reason));
            }
        };

        let report = self.fire(&rule, ctx, &MessageSource::Template, &[]).await?;
        Ok(FireOutcome::Fired(report))
    }

    /// Evaluates the condition of the active rule for `code`
    ///
    /// Returns false when no active rule exists.
    pub async fn evaluate_rules(&self, code: &str, ctx: &AlertContext) -> AppResult<bool> {
        Ok(match self.active_rule(code).await? {
            Ok(rule) => rule.parsed_condition().evaluate(ctx, Utc::now().date_naive()),
            Err(_) => false,
        })
    }

    /// Evaluates, then fires when the condition holds
    pub async fn process(&self, code: &str, ctx: &AlertContext) -> AppResult<FireOutcome> {
        let rule = match self.active_rule(code).await? {
            Ok(rule) => rule,
            Err(reason) => {
                log::debug!("Alert {} not processed: {:?}", code, reason);
                return Ok(FireOutcome::Skipped(reason));
            }
        };

        if !rule.parsed_condition().evaluate(ctx, Utc::now().date_naive()) {
            log::debug!("Alert {} condition not met", code);
            return Ok(FireOutcome::ConditionNotMet);
        }

        let report = self.fire(&rule, ctx, &MessageSource::Template, &[]).await?;
        Ok(FireOutcome::Fired(report))
    }

    /// Admin test send of a rule; configuration problems surface as errors
    pub async fn trigger_alert(
        &self,
        rule_id: i32,
        payload: TestAlertPayload,
    ) -> AppResult<FireReport> {
        let rule = self
            .rules
            .find_by_id(rule_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Alert rule {} not found", rule_id)))?;

        if !rule.is_active {
            return Err(AppError::Validation(format!(
                "Alert rule {} is inactive",
                rule.code
            )));
        }

        let static_count = self
            .rules
            .recipients(rule.id)
            .await?
            .iter()
            .filter(|r| rule.has_channel(r.channel))
            .count();

        if static_count == 0 && payload.recipients.is_empty() {
            return Err(AppError::Validation(format!(
                "Alert rule {} has no recipients",
                rule.code
            )));
        }

        let ctx = AlertContext {
            extra: payload.variables.into_iter().collect(),
            ..Default::default()
        };
        let source = MessageSource::Custom {
            subject: payload.subject,
            body: payload.body,
            variables: templates::context_variables(&ctx),
        };

        self.fire(&rule, &ctx, &source, &payload.recipients).await
    }

    /// Runs a dispatched or queued job: evaluate, fire, then write the
    /// requested in-app notification when the rule actually fired
    pub async fn run_job(&self, job: &AlertJob) -> AppResult<FireOutcome> {
        let outcome = self.process(&job.alert_code, &job.context).await?;

        if let (Some(report), Some(user_id)) = (outcome.report(), job.in_app_user_id.as_deref()) {
            self.notify_in_app(report, &job.context, user_id).await?;
        }

        Ok(outcome)
    }

    /// Writes the in-app notification that accompanies a firing for `user_id`
    pub async fn notify_in_app(
        &self,
        report: &FireReport,
        ctx: &AlertContext,
        user_id: &str,
    ) -> AppResult<Notification> {
        let message = templates::render(
            &report.rule_code,
            &report.rule_label,
            ChannelKind::InApp,
            ctx,
        );

        self.notifications
            .record_delivery(NewNotification {
                alert_rule_id: Some(report.rule_id),
                alert_code: report.rule_code.clone(),
                alert_label: report.rule_label.clone(),
                user_id: Some(user_id.to_string()),
                channel: ChannelKind::InApp,
                recipient: user_id.to_string(),
                subject: message.subject,
                body: message.body,
                sent: true,
                error: None,
                market_id: ctx.entity_id,
            })
            .await
    }

    // =========================================================================
    // Firing
    // =========================================================================

    async fn fire(
        &self,
        rule: &AlertRule,
        ctx: &AlertContext,
        source: &MessageSource,
        extras: &[ExtraRecipient],
    ) -> AppResult<FireReport> {
        let recipients = self.rules.recipients(rule.id).await?;
        let local_time = Local::now().time();

        let mut planned = Vec::with_capacity(recipients.len() + extras.len());
        for recipient in &recipients {
            if !rule.has_channel(recipient.channel) {
                log::debug!(
                    "Skipping {} recipient of {}: channel not enabled on rule",
                    recipient.channel,
                    rule.code
                );
                continue;
            }
            if let Some(delivery) = self.plan(rule, recipient, local_time).await? {
                planned.push(delivery);
            }
        }

        // Ad-hoc test recipients bypass the rule's channel list
        planned.extend(
            extras
                .iter()
                .map(|extra| PlannedDelivery::to(extra.channel, extra.value.clone(), None)),
        );

        let mut settings: HashMap<ChannelKind, Option<NotificationChannel>> = HashMap::new();
        for delivery in &planned {
            if !settings.contains_key(&delivery.channel) {
                let channel = self.channels.settings(delivery.channel).await?;
                settings.insert(delivery.channel, channel);
            }
        }

        let attempts = planned.into_iter().map(|delivery| {
            let channel_settings = settings.get(&delivery.channel).and_then(Option::as_ref);
            self.attempt(rule, ctx, source, delivery, channel_settings)
        });

        let mut report = FireReport {
            rule_id: rule.id,
            rule_code: rule.code.clone(),
            rule_label: rule.label.clone(),
            notification_ids: Vec::new(),
            delivered: 0,
        };

        let mut first_error = None;
        for result in join_all(attempts).await {
            match result {
                Ok(notification) => {
                    if notification.sent {
                        report.delivered += 1;
                    }
                    report.notification_ids.push(notification.id);
                }
                Err(e) => {
                    log::error!("Failed to record delivery for {}: {}", rule.code, e);
                    first_error.get_or_insert(e);
                }
            }
        }

        if let Some(e) = first_error {
            return Err(e);
        }

        log::info!(
            "Alert {} fired: {} attempted, {} delivered, {} failed",
            rule.code,
            report.attempted(),
            report.delivered,
            report.failed()
        );

        Ok(report)
    }

    /// Resolves a static recipient; `None` when the user opted out
    async fn plan(
        &self,
        rule: &AlertRule,
        recipient: &AlertRecipient,
        local_time: NaiveTime,
    ) -> AppResult<Option<PlannedDelivery>> {
        let channel = recipient.channel;
        let value = recipient.value.as_str();

        if recipient.recipient_type != RecipientType::User {
            return Ok(Some(PlannedDelivery::to(channel, value, None)));
        }

        let prefs = self
            .users
            .preferences(value)
            .await?
            .unwrap_or_else(|| UserNotificationPreference::defaults(value));

        if !prefs.allows(channel, &rule.code, local_time) {
            log::debug!(
                "User {} opted out of {} on {}",
                value,
                rule.code,
                channel
            );
            return Ok(None);
        }

        let delivery = match channel {
            ChannelKind::InApp | ChannelKind::Push => {
                PlannedDelivery::to(channel, value, Some(value.to_string()))
            }
            ChannelKind::Email | ChannelKind::Sms => {
                let contact = self.users.contact(value).await?;
                let address = contact.and_then(|c| match channel {
                    ChannelKind::Email => c.email,
                    _ => c.phone,
                });
                match address {
                    Some(address) if !address.trim().is_empty() => {
                        PlannedDelivery::to(channel, address, Some(value.to_string()))
                    }
                    _ => PlannedDelivery::unresolved(
                        channel,
                        value,
                        format!("User {} has no {} destination", value, channel),
                    ),
                }
            }
            ChannelKind::Webhook => PlannedDelivery::unresolved(
                channel,
                value,
                "Webhook channel cannot target a user".to_string(),
            ),
        };

        Ok(Some(delivery))
    }

    /// Sends one delivery and records its row
    async fn attempt(
        &self,
        rule: &AlertRule,
        ctx: &AlertContext,
        source: &MessageSource,
        delivery: PlannedDelivery,
        settings: Option<&NotificationChannel>,
    ) -> AppResult<Notification> {
        let message = source.render(rule, ctx, delivery.channel);

        let result = match delivery.problem {
            Some(problem) => DeliveryResult::failed(problem, None),
            None => {
                let (result, transport_called) = self
                    .send(delivery.channel, settings, &delivery.destination, &message)
                    .await;
                if transport_called {
                    self.record_channel_outcome(delivery.channel, &result).await;
                }
                result
            }
        };

        if let Some(ref error) = result.error {
            log::warn!(
                "Alert {} to {} via {} failed: {}",
                rule.code,
                delivery.destination,
                delivery.channel,
                error
            );
        }

        self.notifications
            .record_delivery(NewNotification {
                alert_rule_id: Some(rule.id),
                alert_code: rule.code.clone(),
                alert_label: rule.label.clone(),
                user_id: delivery.user_id,
                channel: delivery.channel,
                recipient: delivery.destination,
                subject: message.subject,
                body: message.body,
                sent: result.delivered,
                error: result.error,
                market_id: ctx.entity_id,
            })
            .await
    }

    /// Returns the outcome and whether the transport was actually invoked
    async fn send(
        &self,
        kind: ChannelKind,
        settings: Option<&NotificationChannel>,
        destination: &str,
        message: &RenderedMessage,
    ) -> (DeliveryResult, bool) {
        if let Some(channel) = settings {
            if !channel.is_enabled {
                return (
                    DeliveryResult::failed(format!("Channel {} is disabled", kind), None),
                    false,
                );
            }
        }

        let Some(sender) = self.senders.get(kind) else {
            return (
                DeliveryResult::failed(format!("No sender registered for channel {}", kind), None),
                false,
            );
        };

        let config = settings
            .map(|s| s.config.clone())
            .unwrap_or(serde_json::Value::Null);

        let send = sender.send(&config, destination, &message.subject, &message.body);
        match tokio::time::timeout(self.send_timeout, send).await {
            Ok(result) => (result, true),
            Err(_) => (
                DeliveryResult::failed(
                    format!("Send timed out after {}s", self.send_timeout.as_secs_f64()),
                    None,
                ),
                true,
            ),
        }
    }

    async fn record_channel_outcome(&self, kind: ChannelKind, result: &DeliveryResult) {
        if let Err(e) = self
            .channels
            .record_outcome(kind, result.delivered, result.error.as_deref())
            .await
        {
            log::warn!("Failed to update health of channel {}: {}", kind, e);
        }
    }
}
