//! Queue worker.
//!
//! Claims due jobs from the queue and runs them with bounded concurrency.
//! Failed attempts are retried with exponential backoff until the job's
//! attempt budget is spent, then parked as failed. Handler errors and panics
//! are logged with the job id and never stop the loop.

use async_trait::async_trait;
use futures_util::future::join_all;
use futures_util::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::config::WorkerConfig;
use crate::engine::AlertEngine;
use crate::error::AppResult;
use crate::models::{AlertJob, QueuedJob};
use crate::queue::{next_retry, with_jitter, JobQueue};

/// Executes a decoded job
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn handle(&self, job: AlertJob) -> AppResult<()>;
}

#[async_trait]
impl JobHandler for AlertEngine {
    async fn handle(&self, job: AlertJob) -> AppResult<()> {
        let outcome = self.run_job(&job).await?;
        log::debug!("Job for {} finished: {:?}", job.alert_code, outcome);
        Ok(())
    }
}

pub struct QueueWorker {
    queue: Arc<dyn JobQueue>,
    handler: Arc<dyn JobHandler>,
    concurrency: usize,
    poll_interval: Duration,
    lease: Duration,
}

impl QueueWorker {
    pub fn new(queue: Arc<dyn JobQueue>, handler: Arc<dyn JobHandler>, config: &WorkerConfig) -> Self {
        Self {
            queue,
            handler,
            concurrency: config.concurrency.max(1),
            poll_interval: config.poll_interval,
            lease: config.lease,
        }
    }

    /// Runs until `cancel` fires, then waits for in-flight jobs
    pub async fn run(&self, cancel: CancellationToken) {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut in_flight = JoinSet::new();

        log::info!(
            "Queue worker started (concurrency: {}, poll interval: {}ms)",
            self.concurrency,
            self.poll_interval.as_millis()
        );

        while !cancel.is_cancelled() {
            while let Some(finished) = in_flight.try_join_next() {
                log_task_result(finished);
            }

            let available = semaphore.available_permits();
            let claimed = if available == 0 {
                Vec::new()
            } else {
                match self.queue.claim(available, self.lease).await {
                    Ok(jobs) => jobs,
                    Err(e) => {
                        log::error!("Failed to claim jobs: {}", e);
                        Vec::new()
                    }
                }
            };

            let idle = claimed.is_empty();
            for job in claimed {
                let permit = match semaphore.clone().acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => break,
                };
                let queue = self.queue.clone();
                let handler = self.handler.clone();

                in_flight.spawn(async move {
                    let _permit = permit;
                    process_job(queue.as_ref(), handler.as_ref(), job).await;
                });
            }

            if idle {
                tokio::select! {
                    _ = cancel.cancelled() => {}
                    _ = tokio::time::sleep(self.poll_interval) => {}
                }
            }
        }

        log::info!(
            "Queue worker stopping, waiting for {} in-flight job(s)",
            in_flight.len()
        );
        while let Some(finished) = in_flight.join_next().await {
            log_task_result(finished);
        }
        log::info!("Queue worker stopped");
    }

    /// Processes due jobs until the queue has none left; returns how many ran
    pub async fn run_until_idle(&self) -> usize {
        let mut processed = 0;

        loop {
            let jobs = match self.queue.claim(self.concurrency, self.lease).await {
                Ok(jobs) => jobs,
                Err(e) => {
                    log::error!("Failed to claim jobs: {}", e);
                    break;
                }
            };
            if jobs.is_empty() {
                break;
            }

            processed += jobs.len();
            join_all(
                jobs.into_iter()
                    .map(|job| process_job(self.queue.as_ref(), self.handler.as_ref(), job)),
            )
            .await;
        }

        processed
    }
}

fn log_task_result(result: Result<(), tokio::task::JoinError>) {
    if let Err(e) = result {
        log::error!("Queue worker task aborted: {}", e);
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Runs one claimed job and settles it in the queue
async fn process_job(queue: &dyn JobQueue, handler: &dyn JobHandler, job: QueuedJob) {
    let attempts = u32::try_from(job.attempts).unwrap_or(0);
    let max_attempts = u32::try_from(job.max_attempts).unwrap_or(1);

    // Re-claimed after its lease expired on the final attempt
    if attempts > max_attempts {
        log::error!("Job {} exceeded {} attempts", job.id, max_attempts);
        settle(queue.fail(job.id, "Lease expired on final attempt").await, job.id);
        return;
    }

    let payload = match job.decode() {
        Ok(payload) => payload,
        Err(e) => {
            log::error!("Job {} has an invalid payload: {}", job.id, e);
            settle(queue.fail(job.id, &format!("Invalid payload: {}", e)).await, job.id);
            return;
        }
    };
    let alert_code = payload.alert_code.clone();

    let error = match AssertUnwindSafe(handler.handle(payload)).catch_unwind().await {
        Ok(Ok(())) => None,
        Ok(Err(e)) => Some(e.to_string()),
        Err(panic) => Some(format!("Job panicked: {}", panic_message(panic.as_ref()))),
    };

    let Some(error) = error else {
        log::debug!("Job {} ({}) succeeded", job.id, alert_code);
        settle(queue.complete(job.id).await, job.id);
        return;
    };

    let base = Duration::from_millis(u64::try_from(job.backoff_base_ms).unwrap_or(0));
    match next_retry(attempts, max_attempts, base) {
        Some(delay) => {
            log::warn!(
                "Job {} ({}) attempt {}/{} failed, retrying in {}ms: {}",
                job.id,
                alert_code,
                attempts,
                max_attempts,
                delay.as_millis(),
                error
            );
            settle(queue.retry(job.id, with_jitter(delay), &error).await, job.id);
        }
        None => {
            log::error!(
                "Job {} ({}) failed after {} attempt(s): {}",
                job.id,
                alert_code,
                attempts,
                error
            );
            settle(queue.fail(job.id, &error).await, job.id);
        }
    }
}

fn settle(result: AppResult<()>, job_id: i64) {
    if let Err(e) = result {
        log::error!("Failed to update job {}: {}", job_id, e);
    }
}
