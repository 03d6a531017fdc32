//! Durable, at-least-once alert job queue.
//!
//! Jobs are claimed under a lease; a job whose lease runs out (worker crash)
//! becomes claimable again. Retry count and backoff base travel with each job.

mod postgres;

use async_trait::async_trait;
use std::time::Duration;

use crate::error::AppResult;
use crate::models::{AlertJob, EnqueueOptions, QueuedJob};

pub use postgres::PgJobQueue;

/// Longest delay between two attempts of the same job
pub const MAX_BACKOFF: Duration = Duration::from_secs(3600);

#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Stores a job; returns `None` when a job with the same key already exists
    async fn enqueue(&self, job: &AlertJob, options: &EnqueueOptions) -> AppResult<Option<i64>>;

    /// Claims up to `limit` due jobs, hiding them from other consumers for `lease`
    async fn claim(&self, limit: usize, lease: Duration) -> AppResult<Vec<QueuedJob>>;

    /// Removes a job that succeeded
    async fn complete(&self, job_id: i64) -> AppResult<()>;

    /// Makes a job claimable again after `delay`
    async fn retry(&self, job_id: i64, delay: Duration, error: &str) -> AppResult<()>;

    /// Parks a job as failed; it is kept for inspection
    async fn fail(&self, job_id: i64, error: &str) -> AppResult<()>;
}

/// Delay before the attempt following attempt number `attempt` (1-based)
///
/// `base * 2^(attempt - 1)`, capped at [`MAX_BACKOFF`].
pub fn backoff_delay(attempt: u32, base: Duration) -> Duration {
    let exponent = attempt.saturating_sub(1).min(31);
    base.checked_mul(1u32 << exponent)
        .unwrap_or(MAX_BACKOFF)
        .min(MAX_BACKOFF)
}

/// Adds up to 10% random jitter
pub fn with_jitter(delay: Duration) -> Duration {
    let jitter = delay.as_secs_f64() * 0.1 * rand::random::<f64>();
    delay + Duration::from_secs_f64(jitter)
}

/// Retry decision after a failed attempt
///
/// Returns the delay before the next attempt, or `None` once
/// `attempts_made` reached `max_attempts`.
pub fn next_retry(attempts_made: u32, max_attempts: u32, base: Duration) -> Option<Duration> {
    if attempts_made >= max_attempts {
        None
    } else {
        Some(backoff_delay(attempts_made, base))
    }
}
