//! Integration tests for the Postgres market source and scanners

use chrono::{Duration as ChronoDuration, Utc};
use pretty_assertions::assert_eq;
use std::sync::Arc;

use treso_alerts::models::EnqueueOptions;
use treso_alerts::queue::PgJobQueue;
use treso_alerts::scanner::{DeadlineScanner, MarketSource, PeriodicScan, PgMarketSource, TreasuryScanner};

use crate::common::{MarketBuilder, TestDb};

#[tokio::test]
async fn test_treasury_positions_aggregate_in_one_query() {
    let db = TestDb::new().await;
    let id = MarketBuilder::new("M-1")
        .payment(2_000.0)
        .payment(3_000.0)
        .disbursement(6_200.0)
        .prefinancing(3_000.0, 1_000.0)
        .threshold(1_000.0)
        .insert(&db.pool)
        .await;
    MarketBuilder::new("M-2").insert(&db.pool).await;
    MarketBuilder::new("M-OFF").payment(1.0).inactive().insert(&db.pool).await;

    let positions = PgMarketSource::new(db.pool.clone())
        .treasury_positions()
        .await
        .unwrap();

    assert_eq!(positions.len(), 2);
    let first = &positions[0];
    assert_eq!(first.market_id, id);
    assert_eq!(first.balance(), 800.0);
    assert_eq!(first.treasury_threshold, Some(1_000.0));
    assert_eq!(first.currency.as_deref(), Some("XOF"));

    // Markets without movements aggregate to zero
    assert_eq!(positions[1].balance(), 0.0);
    assert_eq!(positions[1].treasury_threshold, None);
}

#[tokio::test]
async fn test_treasury_scanner_enqueues_low_markets() {
    let db = TestDb::new().await;
    MarketBuilder::new("BAS")
        .payment(5_000.0)
        .disbursement(6_200.0)
        .prefinancing(3_000.0, 1_000.0)
        .threshold(1_000.0)
        .insert(&db.pool)
        .await;
    MarketBuilder::new("SAIN")
        .payment(5_000.0)
        .disbursement(6_200.0)
        .prefinancing(3_000.0, 1_000.0)
        .threshold(500.0)
        .insert(&db.pool)
        .await;

    let scanner = TreasuryScanner::new(
        Arc::new(PgMarketSource::new(db.pool.clone())),
        Arc::new(PgJobQueue::new(db.pool.clone())),
        10_000.0,
        EnqueueOptions::default(),
    );

    let tick = Utc::now();
    assert_eq!(scanner.scan_once(tick).await.unwrap(), 1);
    // Same cycle again is deduplicated by job key
    assert_eq!(scanner.scan_once(tick).await.unwrap(), 0);

    let code: String = sqlx::query_scalar("SELECT payload->>'alert_code' FROM alert_jobs")
        .fetch_one(&db.pool)
        .await
        .unwrap();
    assert_eq!(code, "TRESORERIE_FAIBLE");
}

#[tokio::test]
async fn test_deadline_scanner_window() {
    let db = TestDb::new().await;
    let today = Utc::now().date_naive();
    MarketBuilder::new("J29")
        .ends_on(today + ChronoDuration::days(29))
        .insert(&db.pool)
        .await;
    MarketBuilder::new("J31")
        .ends_on(today + ChronoDuration::days(31))
        .insert(&db.pool)
        .await;
    MarketBuilder::new("SANS-DATE").insert(&db.pool).await;

    let source = PgMarketSource::new(db.pool.clone());
    let due = source
        .deadlines_between(today, today + ChronoDuration::days(30))
        .await
        .unwrap();
    assert_eq!(due.len(), 1);
    assert_eq!(due[0].code, "J29");

    let scanner = DeadlineScanner::new(
        Arc::new(source),
        Arc::new(PgJobQueue::new(db.pool.clone())),
        30,
        EnqueueOptions::default(),
    );
    assert_eq!(scanner.scan_once(Utc::now()).await.unwrap(), 1);
}
