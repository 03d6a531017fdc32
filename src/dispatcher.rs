//! Event dispatcher: the one entry point business handlers call.
//!
//! Dispatching never fails. Synchronous dispatch runs the engine inline and
//! logs any error; asynchronous dispatch enqueues a job within a bounded
//! window and logs (then drops) anything that goes wrong.

use std::sync::Arc;
use std::time::Duration;

use crate::config::WorkerConfig;
use crate::engine::{AlertEngine, FireOutcome};
use crate::events::EventCode;
use crate::models::{AlertContext, AlertJob, EnqueueOptions};
use crate::queue::JobQueue;

/// Per-call dispatch options
#[derive(Debug, Clone)]
pub struct DispatchOptions {
    /// User who receives an in-app notification when the rule fires
    pub in_app_user_id: Option<String>,
    /// Run inline (default) instead of enqueueing
    pub sync: bool,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            in_app_user_id: None,
            sync: true,
        }
    }
}

impl DispatchOptions {
    pub fn asynchronous() -> Self {
        Self {
            sync: false,
            ..Default::default()
        }
    }

    pub fn notify_user(mut self, user_id: impl Into<String>) -> Self {
        self.in_app_user_id = Some(user_id.into());
        self
    }
}

/// What happened to a dispatched event
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    /// Ran inline
    Processed(FireOutcome),
    /// Stored in the queue; `None` when deduplicated by job key
    Enqueued(Option<i64>),
    /// Error logged and swallowed
    Dropped,
}

pub struct EventDispatcher {
    engine: Arc<AlertEngine>,
    queue: Arc<dyn JobQueue>,
    retry_attempts: u32,
    backoff_base: Duration,
    enqueue_timeout: Duration,
}

impl EventDispatcher {
    pub fn new(engine: Arc<AlertEngine>, queue: Arc<dyn JobQueue>, config: &WorkerConfig) -> Self {
        Self {
            engine,
            queue,
            retry_attempts: config.retry_attempts,
            backoff_base: config.backoff_base,
            enqueue_timeout: config.enqueue_timeout,
        }
    }

    pub async fn dispatch(
        &self,
        event: EventCode,
        context: AlertContext,
        options: DispatchOptions,
    ) -> DispatchOutcome {
        let job = AlertJob::new(event, context).with_in_app_user(options.in_app_user_id);

        if options.sync {
            self.run_inline(job).await
        } else {
            self.enqueue(job).await
        }
    }

    async fn run_inline(&self, job: AlertJob) -> DispatchOutcome {
        match self.engine.run_job(&job).await {
            Ok(outcome) => DispatchOutcome::Processed(outcome),
            Err(e) => {
                log::error!(
                    "Alert {} for event {} failed: {}",
                    job.alert_code,
                    job.event_code,
                    e
                );
                DispatchOutcome::Dropped
            }
        }
    }

    async fn enqueue(&self, job: AlertJob) -> DispatchOutcome {
        let options = EnqueueOptions::with_retries(self.retry_attempts, self.backoff_base);

        match tokio::time::timeout(self.enqueue_timeout, self.queue.enqueue(&job, &options)).await {
            Ok(Ok(id)) => {
                log::debug!("Enqueued alert {} as job {:?}", job.alert_code, id);
                DispatchOutcome::Enqueued(id)
            }
            Ok(Err(e)) => {
                log::error!(
                    "Failed to enqueue alert {} for event {}: {}",
                    job.alert_code,
                    job.event_code,
                    e
                );
                DispatchOutcome::Dropped
            }
            Err(_) => {
                log::error!(
                    "Enqueue of alert {} for event {} timed out after {}ms",
                    job.alert_code,
                    job.event_code,
                    self.enqueue_timeout.as_millis()
                );
                DispatchOutcome::Dropped
            }
        }
    }
}
