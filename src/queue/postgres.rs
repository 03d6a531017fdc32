use async_trait::async_trait;
use sqlx::PgPool;
use std::time::Duration;

use super::JobQueue;
use crate::error::{AppError, AppResult};
use crate::models::{AlertJob, EnqueueOptions, QueueBacklog, QueuedJob};

const JOB_COLUMNS: &str = "id, job_key, payload, status, attempts, max_attempts, \
     backoff_base_ms, next_run_at, locked_until, last_error, created_at";

/// Queue stored in the `alert_jobs` table
#[derive(Clone)]
pub struct PgJobQueue {
    pool: PgPool,
}

impl PgJobQueue {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Lists jobs parked as failed, newest first
    pub async fn list_failed(&self, limit: i64) -> AppResult<Vec<QueuedJob>> {
        let query = format!(
            "SELECT {JOB_COLUMNS} FROM alert_jobs WHERE status = 'failed' \
             ORDER BY updated_at DESC LIMIT $1"
        );
        let jobs = sqlx::query_as::<_, QueuedJob>(&query)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(jobs)
    }

    pub async fn backlog(&self) -> AppResult<QueueBacklog> {
        let backlog = sqlx::query_as::<_, QueueBacklog>(
            r#"
            SELECT COUNT(*) FILTER (WHERE status = 'pending') AS pending,
                   COUNT(*) FILTER (WHERE status = 'running') AS running,
                   COUNT(*) FILTER (WHERE status = 'failed') AS failed
            FROM alert_jobs
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(backlog)
    }
}

#[async_trait]
impl JobQueue for PgJobQueue {
    async fn enqueue(&self, job: &AlertJob, options: &EnqueueOptions) -> AppResult<Option<i64>> {
        let payload = serde_json::to_value(job)?;
        let max_attempts = i32::try_from(options.max_attempts)
            .map_err(|_| AppError::Validation("max_attempts out of range".to_string()))?;

        let id: Option<i64> = sqlx::query_scalar(
            r#"
            INSERT INTO alert_jobs (job_key, payload, max_attempts, backoff_base_ms)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (job_key) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(&options.job_key)
        .bind(&payload)
        .bind(max_attempts.max(1))
        .bind(options.backoff_base.as_millis() as i64)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::Queue(format!("Failed to enqueue {}: {}", job.alert_code, e)))?;

        Ok(id)
    }

    async fn claim(&self, limit: usize, lease: Duration) -> AppResult<Vec<QueuedJob>> {
        // Expired leases are claimable again (at-least-once)
        let query = format!(
            r#"
            WITH picked AS (
                SELECT id
                FROM alert_jobs
                WHERE (status = 'pending' AND next_run_at <= NOW())
                   OR (status = 'running' AND locked_until < NOW())
                ORDER BY next_run_at
                LIMIT $1
                FOR UPDATE SKIP LOCKED
            )
            UPDATE alert_jobs
            SET status = 'running',
                attempts = attempts + 1,
                locked_until = NOW() + make_interval(secs => $2),
                updated_at = NOW()
            WHERE id IN (SELECT id FROM picked)
            RETURNING {JOB_COLUMNS}
            "#
        );

        let jobs = sqlx::query_as::<_, QueuedJob>(&query)
            .bind(limit as i64)
            .bind(lease.as_secs_f64())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::Queue(format!("Failed to claim jobs: {}", e)))?;

        Ok(jobs)
    }

    async fn complete(&self, job_id: i64) -> AppResult<()> {
        sqlx::query("DELETE FROM alert_jobs WHERE id = $1")
            .bind(job_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn retry(&self, job_id: i64, delay: Duration, error: &str) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE alert_jobs
            SET status = 'pending',
                next_run_at = NOW() + make_interval(secs => $2),
                locked_until = NULL,
                last_error = $3,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(job_id)
        .bind(delay.as_secs_f64())
        .bind(error)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn fail(&self, job_id: i64, error: &str) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE alert_jobs
            SET status = 'failed', locked_until = NULL, last_error = $2, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(job_id)
        .bind(error)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
