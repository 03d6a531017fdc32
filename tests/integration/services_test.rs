//! Integration tests for the administration services

use chrono::NaiveTime;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;

use treso_alerts::engine::AlertEngine;
use treso_alerts::error::AppError;
use treso_alerts::models::{
    AlertContext, ChannelKind, CreateAlertRule, DigestFrequency, FeedQuery, RecipientInput,
    RecipientType, UpdateAlertRule, UpdateNotificationChannel, UpsertPreferences,
};
use treso_alerts::repository::PgStore;
use treso_alerts::services::{
    AlertService, ChannelService, NotificationFeedService, PreferenceService, RuleRemoval,
    SenderRegistry,
};

use crate::common::TestDb;

fn new_rule(code: &str) -> CreateAlertRule {
    CreateAlertRule {
        code: code.to_string(),
        label: "Retard de paiement".to_string(),
        description: Some("Paiement en retard".to_string()),
        channels: vec![ChannelKind::Email, ChannelKind::InApp],
        condition: json!({"type": "threshold", "field": "amount", "op": "gt", "value": 100}),
        is_active: true,
        recipients: vec![RecipientInput {
            recipient_type: RecipientType::Email,
            value: "ops@treso.bj".to_string(),
            channel: ChannelKind::Email,
        }],
    }
}

fn feed(unread_only: bool) -> FeedQuery {
    FeedQuery {
        unread_only,
        limit: None,
    }
}

// =============================================================================
// Alert Rules
// =============================================================================

#[tokio::test]
async fn test_rule_crud_with_recipients() {
    let db = TestDb::new().await;

    let rule = AlertService::create_rule(&db.pool, new_rule("PAIEMENT_RETARD"))
        .await
        .unwrap();
    assert_eq!(rule.channels.0, vec![ChannelKind::Email, ChannelKind::InApp]);
    assert_eq!(
        AlertService::get_recipients(&db.pool, rule.id).await.unwrap().len(),
        1
    );

    let updated = AlertService::update_rule(
        &db.pool,
        rule.id,
        UpdateAlertRule {
            label: Some("Paiement en retard".to_string()),
            recipients: Some(vec![
                RecipientInput {
                    recipient_type: RecipientType::User,
                    value: "4".to_string(),
                    channel: ChannelKind::InApp,
                },
                RecipientInput {
                    recipient_type: RecipientType::Email,
                    value: "dg@treso.bj".to_string(),
                    channel: ChannelKind::Email,
                },
            ]),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    assert_eq!(updated.label, "Paiement en retard");
    assert_eq!(updated.description.as_deref(), Some("Paiement en retard"));
    let recipients = AlertService::get_recipients(&db.pool, rule.id).await.unwrap();
    assert_eq!(recipients.len(), 2);
    assert!(recipients.iter().all(|r| r.value != "ops@treso.bj"));

    // Seeded rules plus the new one
    assert_eq!(AlertService::list_rules(&db.pool).await.unwrap().len(), 6);
}

#[tokio::test]
async fn test_duplicate_code_is_conflict() {
    let db = TestDb::new().await;

    let result = AlertService::create_rule(&db.pool, new_rule("MARCHE_CREE")).await;

    assert!(matches!(result, Err(AppError::Conflict(_))));
}

#[tokio::test]
async fn test_recipient_on_disabled_rule_channel_is_rejected() {
    let db = TestDb::new().await;
    let mut input = new_rule("SMS_SEUL");
    input.recipients.push(RecipientInput {
        recipient_type: RecipientType::Phone,
        value: "+22997000000".to_string(),
        channel: ChannelKind::Sms,
    });

    let result = AlertService::create_rule(&db.pool, input).await;

    assert!(matches!(result, Err(AppError::Validation(_))));
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM alert_rules WHERE code = 'SMS_SEUL'")
        .fetch_one(&db.pool)
        .await
        .unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
async fn test_rule_with_history_is_deactivated_not_deleted() {
    let db = TestDb::new().await;
    let engine = AlertEngine::new(Arc::new(PgStore::new(db.pool.clone())), SenderRegistry::default());

    let unused = AlertService::create_rule(&db.pool, new_rule("SANS_HISTORIQUE"))
        .await
        .unwrap();
    let used = AlertService::create_rule(&db.pool, new_rule("AVEC_HISTORIQUE"))
        .await
        .unwrap();

    // No email sender registered: the attempt is recorded as a failure
    engine
        .trigger_by_code("AVEC_HISTORIQUE", &AlertContext::default())
        .await
        .unwrap();

    assert_eq!(
        AlertService::delete_rule(&db.pool, unused.id).await.unwrap(),
        RuleRemoval::Deleted
    );
    assert_eq!(
        AlertService::delete_rule(&db.pool, used.id).await.unwrap(),
        RuleRemoval::Deactivated
    );

    assert!(matches!(
        AlertService::get_rule(&db.pool, unused.id).await,
        Err(AppError::NotFound(_))
    ));
    assert!(!AlertService::get_rule(&db.pool, used.id).await.unwrap().is_active);

    let history = AlertService::list_history(&db.pool, used.id, 10).await.unwrap();
    assert_eq!(history.len(), 1);
    assert!(!history[0].sent);
    assert_eq!(history[0].alert_code, "AVEC_HISTORIQUE");

    assert!(matches!(
        AlertService::delete_rule(&db.pool, 9999).await,
        Err(AppError::NotFound(_))
    ));
}

// =============================================================================
// Channels
// =============================================================================

#[tokio::test]
async fn test_channel_update_validates_config() {
    let db = TestDb::new().await;

    let disabled = ChannelService::update(
        &db.pool,
        ChannelKind::Sms,
        UpdateNotificationChannel {
            is_enabled: Some(false),
            config: None,
        },
    )
    .await
    .unwrap();
    assert!(!disabled.is_enabled);

    let webhook = ChannelService::update(
        &db.pool,
        ChannelKind::Webhook,
        UpdateNotificationChannel {
            is_enabled: None,
            config: Some(json!({"url": "https://erp.treso.bj/hooks", "secret": "s3cret"})),
        },
    )
    .await
    .unwrap();
    assert!(webhook.is_enabled);
    assert_eq!(webhook.config["url"], "https://erp.treso.bj/hooks");

    let invalid = ChannelService::update(
        &db.pool,
        ChannelKind::Webhook,
        UpdateNotificationChannel {
            is_enabled: None,
            config: Some(json!({"url": "ftp://erp.treso.bj"})),
        },
    )
    .await;
    assert!(matches!(invalid, Err(AppError::Validation(_))));

    assert_eq!(ChannelService::list(&db.pool).await.unwrap().len(), 5);
}

// =============================================================================
// Feed
// =============================================================================

#[tokio::test]
async fn test_in_app_feed() {
    let db = TestDb::new().await;
    let engine = AlertEngine::new(Arc::new(PgStore::new(db.pool.clone())), SenderRegistry::default());

    let report = engine
        .trigger_by_code("MARCHE_CREE", &AlertContext::for_market(1, "M-1", "Marché 1"))
        .await
        .unwrap()
        .report()
        .cloned()
        .unwrap();
    let ctx = AlertContext::for_market(1, "M-1", "Marché 1");
    let first = engine.notify_in_app(&report, &ctx, "12").await.unwrap();
    engine.notify_in_app(&report, &ctx, "12").await.unwrap();
    engine.notify_in_app(&report, &ctx, "99").await.unwrap();

    let list = NotificationFeedService::list(&db.pool, "12", &feed(false)).await.unwrap();
    assert_eq!(list.len(), 2);
    assert!(list[0].id > list[1].id);

    NotificationFeedService::mark_read(&db.pool, first.id, "12").await.unwrap();
    assert_eq!(
        NotificationFeedService::unread_count(&db.pool, "12").await.unwrap().count,
        1
    );
    assert_eq!(
        NotificationFeedService::list(&db.pool, "12", &feed(true)).await.unwrap().len(),
        1
    );

    let other_user = NotificationFeedService::mark_read(&db.pool, first.id, "99").await;
    assert!(matches!(other_user, Err(AppError::NotFound(_))));

    let marked = NotificationFeedService::mark_all_read(&db.pool, "12").await.unwrap();
    assert_eq!(marked.updated, 1);
    assert_eq!(
        NotificationFeedService::unread_count(&db.pool, "12").await.unwrap().count,
        0
    );
    assert_eq!(
        NotificationFeedService::unread_count(&db.pool, "99").await.unwrap().count,
        1
    );
}

// =============================================================================
// Preferences
// =============================================================================

#[tokio::test]
async fn test_preferences_default_then_upsert() {
    let db = TestDb::new().await;

    let defaults = PreferenceService::get(&db.pool, "21").await.unwrap();
    assert!(defaults.email_enabled);
    assert!(defaults.sms_enabled);
    assert!(!defaults.push_enabled);
    assert!(defaults.in_app_enabled);
    assert!(defaults.updated_at.is_none());

    let saved = PreferenceService::upsert(
        &db.pool,
        "21",
        UpsertPreferences {
            email_enabled: false,
            sms_enabled: true,
            push_enabled: true,
            in_app_enabled: true,
            subscribed_alerts: vec!["TRESORERIE_FAIBLE".to_string()],
            quiet_hours_start: NaiveTime::from_hms_opt(22, 0, 0),
            quiet_hours_end: NaiveTime::from_hms_opt(7, 0, 0),
            digest_frequency: DigestFrequency::Daily,
        },
    )
    .await
    .unwrap();

    assert!(!saved.email_enabled);
    assert_eq!(saved.subscribed_alerts.0, vec!["TRESORERIE_FAIBLE".to_string()]);
    assert_eq!(saved.digest_frequency, DigestFrequency::Daily);
    assert_eq!(PreferenceService::get(&db.pool, "21").await.unwrap(), saved);

    let half_window = PreferenceService::upsert(
        &db.pool,
        "21",
        UpsertPreferences {
            email_enabled: true,
            sms_enabled: true,
            push_enabled: false,
            in_app_enabled: true,
            subscribed_alerts: Vec::new(),
            quiet_hours_start: NaiveTime::from_hms_opt(22, 0, 0),
            quiet_hours_end: None,
            digest_frequency: DigestFrequency::Immediate,
        },
    )
    .await;
    assert!(matches!(half_window, Err(AppError::Validation(_))));
}
