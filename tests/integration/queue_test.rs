//! Integration tests for the Postgres job queue

use pretty_assertions::assert_eq;
use std::collections::HashSet;
use std::time::Duration;

use treso_alerts::events::EventCode;
use treso_alerts::models::{AlertContext, AlertJob, EnqueueOptions, JobStatus};
use treso_alerts::queue::{JobQueue, PgJobQueue};

use crate::common::TestDb;

const LEASE: Duration = Duration::from_secs(300);

fn job() -> AlertJob {
    AlertJob::new(
        EventCode::PaymentReceived,
        AlertContext::for_market(1, "M-1", "Marché 1").with_amount(100.0),
    )
}

#[tokio::test]
async fn test_enqueue_and_claim() {
    let db = TestDb::new().await;
    let queue = PgJobQueue::new(db.pool.clone());

    let id = queue
        .enqueue(&job(), &EnqueueOptions::default())
        .await
        .unwrap()
        .expect("job should be stored");

    let claimed = queue.claim(5, LEASE).await.unwrap();
    assert_eq!(claimed.len(), 1);
    assert_eq!(claimed[0].id, id);
    assert_eq!(claimed[0].status, JobStatus::Running);
    assert_eq!(claimed[0].attempts, 1);
    assert_eq!(claimed[0].max_attempts, 3);
    assert_eq!(claimed[0].decode().unwrap(), job());

    // Leased jobs are invisible to other consumers
    assert!(queue.claim(5, LEASE).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_job_key_deduplicates() {
    let db = TestDb::new().await;
    let queue = PgJobQueue::new(db.pool.clone());
    let options = EnqueueOptions::default().keyed("TRESORERIE_FAIBLE-4-1740816000");

    let first = queue.enqueue(&job(), &options).await.unwrap();
    let second = queue.enqueue(&job(), &options).await.unwrap();

    assert!(first.is_some());
    assert_eq!(second, None);

    // Jobs without a key never collide
    assert!(queue
        .enqueue(&job(), &EnqueueOptions::default())
        .await
        .unwrap()
        .is_some());
    assert!(queue
        .enqueue(&job(), &EnqueueOptions::default())
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn test_retry_makes_job_claimable_again() {
    let db = TestDb::new().await;
    let queue = PgJobQueue::new(db.pool.clone());
    queue.enqueue(&job(), &EnqueueOptions::default()).await.unwrap();

    let first = queue.claim(1, LEASE).await.unwrap().remove(0);
    queue
        .retry(first.id, Duration::ZERO, "smtp down")
        .await
        .unwrap();

    let second = queue.claim(1, LEASE).await.unwrap();
    assert_eq!(second.len(), 1);
    assert_eq!(second[0].attempts, 2);
    assert_eq!(second[0].last_error.as_deref(), Some("smtp down"));
}

#[tokio::test]
async fn test_delayed_retry_is_not_due_yet() {
    let db = TestDb::new().await;
    let queue = PgJobQueue::new(db.pool.clone());
    queue.enqueue(&job(), &EnqueueOptions::default()).await.unwrap();

    let claimed = queue.claim(1, LEASE).await.unwrap().remove(0);
    queue
        .retry(claimed.id, Duration::from_secs(60), "timeout")
        .await
        .unwrap();

    assert!(queue.claim(1, LEASE).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_expired_lease_is_reclaimed() {
    let db = TestDb::new().await;
    let queue = PgJobQueue::new(db.pool.clone());
    queue.enqueue(&job(), &EnqueueOptions::default()).await.unwrap();

    let first = queue.claim(1, Duration::ZERO).await.unwrap();
    assert_eq!(first.len(), 1);

    tokio::time::sleep(Duration::from_millis(20)).await;

    let again = queue.claim(1, LEASE).await.unwrap();
    assert_eq!(again.len(), 1);
    assert_eq!(again[0].id, first[0].id);
    assert_eq!(again[0].attempts, 2);
}

#[tokio::test]
async fn test_complete_and_fail() {
    let db = TestDb::new().await;
    let queue = PgJobQueue::new(db.pool.clone());
    queue.enqueue(&job(), &EnqueueOptions::default()).await.unwrap();
    queue.enqueue(&job(), &EnqueueOptions::default()).await.unwrap();

    let claimed = queue.claim(2, LEASE).await.unwrap();
    queue.complete(claimed[0].id).await.unwrap();
    queue.fail(claimed[1].id, "exhausted").await.unwrap();

    let failed = queue.list_failed(10).await.unwrap();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].id, claimed[1].id);
    assert_eq!(failed[0].last_error.as_deref(), Some("exhausted"));

    let backlog = queue.backlog().await.unwrap();
    assert_eq!(backlog.pending, 0);
    assert_eq!(backlog.running, 0);
    assert_eq!(backlog.failed, 1);
}

#[tokio::test]
async fn test_concurrent_claims_never_overlap() {
    let db = TestDb::new().await;
    let queue = PgJobQueue::new(db.pool.clone());
    for _ in 0..10 {
        queue.enqueue(&job(), &EnqueueOptions::default()).await.unwrap();
    }

    let (a, b) = tokio::join!(queue.claim(5, LEASE), queue.claim(5, LEASE));
    let a = a.unwrap();
    let b = b.unwrap();

    let ids: HashSet<i64> = a.iter().chain(b.iter()).map(|j| j.id).collect();
    assert_eq!(ids.len(), a.len() + b.len());
    assert!(queue.claim(10, LEASE).await.unwrap().len() + ids.len() == 10);
}

#[tokio::test]
async fn test_storage_status_reports_backlog_and_missing_queue() {
    let db = TestDb::new().await;
    let queue = PgJobQueue::new(db.pool.clone());
    queue.enqueue(&job(), &EnqueueOptions::default()).await.unwrap();

    let status = treso_alerts::db::storage_status(&db.pool).await;
    assert!(status.is_ready());
    assert_eq!(status.alert_jobs.map(|b| b.pending), Some(1));

    sqlx::query("DROP TABLE alert_jobs").execute(&db.pool).await.unwrap();

    let status = treso_alerts::db::storage_status(&db.pool).await;
    assert!(status.database);
    assert!(!status.is_ready());
    assert_eq!(status.queue_label(), "error");
}
