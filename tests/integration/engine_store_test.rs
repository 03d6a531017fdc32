//! Integration tests for the engine over the Postgres store

use pretty_assertions::assert_eq;
use std::sync::Arc;

use treso_alerts::config::WorkerConfig;
use treso_alerts::dispatcher::{DispatchOptions, DispatchOutcome, EventDispatcher};
use treso_alerts::engine::AlertEngine;
use treso_alerts::events::EventCode;
use treso_alerts::models::{
    AlertContext, ChannelKind, CreateAlertRule, NewNotification, NotificationChannel,
    RecipientInput, RecipientType,
};
use treso_alerts::queue::{JobQueue, PgJobQueue};
use treso_alerts::repository::{NotificationStore, PgStore};
use treso_alerts::services::{AlertService, ChannelService, SenderRegistry};
use treso_alerts::worker::QueueWorker;

use crate::common::fakes::RecordingSender;
use crate::common::{insert_user, TestDb};

fn senders(email: Arc<RecordingSender>) -> SenderRegistry {
    SenderRegistry::default()
        .with_sender(email)
        .with_sender(RecordingSender::new(ChannelKind::InApp))
        .with_sender(RecordingSender::new(ChannelKind::Sms))
}

async fn channel(db: &TestDb, kind: ChannelKind) -> NotificationChannel {
    ChannelService::get(&db.pool, kind).await.unwrap()
}

#[tokio::test]
async fn test_fire_records_rows_and_channel_health() {
    let db = TestDb::new().await;
    let user = insert_user(&db.pool, Some("tresorier@treso.bj"), None).await;

    AlertService::create_rule(
        &db.pool,
        CreateAlertRule {
            code: "ALERTE_TEST".to_string(),
            label: "Alerte test".to_string(),
            description: None,
            channels: vec![ChannelKind::Email],
            condition: serde_json::json!({}),
            is_active: true,
            recipients: vec![
                RecipientInput {
                    recipient_type: RecipientType::User,
                    value: user.clone(),
                    channel: ChannelKind::Email,
                },
                RecipientInput {
                    recipient_type: RecipientType::Email,
                    value: "down@treso.bj".to_string(),
                    channel: ChannelKind::Email,
                },
            ],
        },
    )
    .await
    .unwrap();

    let email = RecordingSender::failing_for(ChannelKind::Email, &["down@treso.bj"]);
    let engine = AlertEngine::new(Arc::new(PgStore::new(db.pool.clone())), senders(email.clone()));

    let ctx = AlertContext::for_market(77, "M-77", "Centre de santé");
    let report = engine
        .process("ALERTE_TEST", &ctx)
        .await
        .unwrap()
        .report()
        .cloned()
        .expect("rule should fire");

    assert_eq!(report.attempted(), 2);
    assert_eq!(report.delivered, 1);

    let mut calls = email.calls();
    calls.sort();
    assert_eq!(calls, vec!["down@treso.bj", "tresorier@treso.bj"]);

    let rows: Vec<(String, bool, Option<String>, Option<i64>)> = sqlx::query_as(
        "SELECT recipient, sent, user_id, market_id FROM notifications ORDER BY recipient",
    )
    .fetch_all(&db.pool)
    .await
    .unwrap();
    assert_eq!(
        rows,
        vec![
            ("down@treso.bj".to_string(), false, None, Some(77)),
            ("tresorier@treso.bj".to_string(), true, Some(user), Some(77)),
        ]
    );

    let health = channel(&db, ChannelKind::Email).await;
    assert!(health.last_success_at.is_some());
    assert!(health.last_failure_at.is_some());
}

#[tokio::test]
async fn test_mark_read_is_scoped_to_owner() {
    let db = TestDb::new().await;
    let engine = AlertEngine::new(
        Arc::new(PgStore::new(db.pool.clone())),
        senders(RecordingSender::new(ChannelKind::Email)),
    );
    let store = PgStore::new(db.pool.clone());

    // Seeded MARCHE_CREE rule has no recipients; only the in-app row is written
    let report = engine
        .trigger_by_code("MARCHE_CREE", &AlertContext::for_market(1, "M-1", "Marché 1"))
        .await
        .unwrap()
        .report()
        .cloned()
        .unwrap();
    let row = engine
        .notify_in_app(&report, &AlertContext::for_market(1, "M-1", "Marché 1"), "5")
        .await
        .unwrap();

    assert!(!store.mark_read(row.id, "6").await.unwrap());
    assert!(store.mark_read(row.id, "5").await.unwrap());

    let (is_read, read_at): (bool, Option<chrono::DateTime<chrono::Utc>>) =
        sqlx::query_as("SELECT is_read, read_at FROM notifications WHERE id = $1")
            .bind(row.id)
            .fetch_one(&db.pool)
            .await
            .unwrap();
    assert!(is_read);
    assert!(read_at.is_some());
}

#[tokio::test]
async fn test_mark_read_ignores_delivery_rows() {
    let db = TestDb::new().await;
    let store = PgStore::new(db.pool.clone());

    let email_row = store
        .record_delivery(NewNotification {
            alert_rule_id: None,
            alert_code: "PAIEMENT_RECU".to_string(),
            alert_label: "Paiement reçu".to_string(),
            user_id: Some("5".to_string()),
            channel: ChannelKind::Email,
            recipient: "tresorier@treso.bj".to_string(),
            subject: "Paiement reçu".to_string(),
            body: "250 000 XOF".to_string(),
            sent: true,
            error: None,
            market_id: Some(1),
        })
        .await
        .unwrap();

    assert!(!store.mark_read(email_row.id, "5").await.unwrap());

    let is_read: bool = sqlx::query_scalar("SELECT is_read FROM notifications WHERE id = $1")
        .bind(email_row.id)
        .fetch_one(&db.pool)
        .await
        .unwrap();
    assert!(!is_read);
}

#[tokio::test]
async fn test_async_dispatch_through_postgres_queue() {
    let db = TestDb::new().await;
    let engine = Arc::new(AlertEngine::new(
        Arc::new(PgStore::new(db.pool.clone())),
        senders(RecordingSender::new(ChannelKind::Email)),
    ));
    let queue: Arc<dyn JobQueue> = Arc::new(PgJobQueue::new(db.pool.clone()));
    let config = WorkerConfig::default();
    let dispatcher = EventDispatcher::new(engine.clone(), queue.clone(), &config);

    let outcome = dispatcher
        .dispatch(
            EventCode::MarketCreated,
            AlertContext::for_market(9, "M-9", "Marché 9"),
            DispatchOptions::asynchronous().notify_user("31"),
        )
        .await;
    assert!(matches!(outcome, DispatchOutcome::Enqueued(Some(_))));

    let worker = QueueWorker::new(queue, engine, &config);
    assert_eq!(worker.run_until_idle().await, 1);

    let (channel, user_id, sent): (String, Option<String>, bool) =
        sqlx::query_as("SELECT channel, user_id, sent FROM notifications")
            .fetch_one(&db.pool)
            .await
            .unwrap();
    assert_eq!(channel, "in_app");
    assert_eq!(user_id.as_deref(), Some("31"));
    assert!(sent);

    let jobs: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM alert_jobs")
        .fetch_one(&db.pool)
        .await
        .unwrap();
    assert_eq!(jobs, 0);
}
