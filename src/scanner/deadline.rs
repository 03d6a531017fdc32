//! Deadline-approaching scanner.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::sync::Arc;

use super::{job_key, MarketSource, PeriodicScan};
use crate::error::AppResult;
use crate::events::EventCode;
use crate::models::{window_end, AlertContext, AlertJob, EnqueueOptions, MarketDeadline};
use crate::queue::JobQueue;

/// Last day covered by a scan; a horizon past the calendar covers everything
pub fn horizon_end(today: NaiveDate, horizon_days: i64) -> NaiveDate {
    window_end(today, horizon_days).unwrap_or(NaiveDate::MAX)
}

/// Markets ending within `[today, today + horizon_days]`
pub fn select_approaching(
    markets: &[MarketDeadline],
    today: NaiveDate,
    horizon_days: i64,
) -> Vec<&MarketDeadline> {
    let last_day = horizon_end(today, horizon_days);
    markets
        .iter()
        .filter(|m| m.end_date >= today && m.end_date <= last_day)
        .collect()
}

/// Context of one approaching deadline; carries the scan horizon so the
/// rule's date window matches what was scanned
pub fn deadline_context(
    market: &MarketDeadline,
    today: NaiveDate,
    horizon_days: i64,
) -> AlertContext {
    let days_remaining = (market.end_date - today).num_days();
    let ctx = AlertContext::for_market(market.market_id, market.code.clone(), market.label.clone())
        .with_due_date(market.end_date)
        .with_window_days(horizon_days)
        .with_extra("days_remaining", days_remaining.to_string());

    match market.currency {
        Some(ref currency) => ctx.with_currency(currency.clone()),
        None => ctx,
    }
}

pub struct DeadlineScanner {
    source: Arc<dyn MarketSource>,
    queue: Arc<dyn JobQueue>,
    horizon_days: i64,
    retry: EnqueueOptions,
}

impl DeadlineScanner {
    pub fn new(
        source: Arc<dyn MarketSource>,
        queue: Arc<dyn JobQueue>,
        horizon_days: i64,
        retry: EnqueueOptions,
    ) -> Self {
        Self {
            source,
            queue,
            horizon_days,
            retry,
        }
    }
}

#[async_trait]
impl PeriodicScan for DeadlineScanner {
    fn name(&self) -> &'static str {
        "Deadline"
    }

    async fn scan_once(&self, tick: DateTime<Utc>) -> AppResult<usize> {
        let today = tick.date_naive();
        let until = horizon_end(today, self.horizon_days);
        let markets = self.source.deadlines_between(today, until).await?;
        let event = EventCode::DeadlineApproaching;

        let mut enqueued = 0;
        for market in select_approaching(&markets, today, self.horizon_days) {
            let job = AlertJob::new(event, deadline_context(market, today, self.horizon_days));
            let options = self
                .retry
                .clone()
                .keyed(job_key(event.alert_code(), market.market_id, tick));

            match self.queue.enqueue(&job, &options).await {
                Ok(Some(_)) => enqueued += 1,
                Ok(None) => {}
                Err(e) => log::error!(
                    "Failed to enqueue {} for market {}: {}",
                    event.alert_code(),
                    market.market_id,
                    e
                ),
            }
        }

        Ok(enqueued)
    }
}
