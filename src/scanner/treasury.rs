//! Treasury threshold scanner.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

use super::{job_key, MarketSource, PeriodicScan};
use crate::error::AppResult;
use crate::events::EventCode;
use crate::models::{AlertContext, AlertJob, EnqueueOptions, MarketTreasury};
use crate::queue::JobQueue;

/// Market whose balance is under its threshold
#[derive(Debug, Clone, PartialEq)]
pub struct LowTreasury<'a> {
    pub market: &'a MarketTreasury,
    pub balance: f64,
    pub threshold: f64,
}

impl LowTreasury<'_> {
    pub fn context(&self) -> AlertContext {
        let ctx = AlertContext::for_market(
            self.market.market_id,
            self.market.code.clone(),
            self.market.label.clone(),
        )
        .with_balance(self.balance)
        .with_threshold(self.threshold);

        match self.market.currency {
            Some(ref currency) => ctx.with_currency(currency.clone()),
            None => ctx,
        }
    }
}

/// Markets with `balance < threshold`; markets without their own threshold use `default_threshold`
pub fn select_low_treasury(
    markets: &[MarketTreasury],
    default_threshold: f64,
) -> Vec<LowTreasury<'_>> {
    markets
        .iter()
        .filter_map(|market| {
            let balance = market.balance();
            let threshold = market.threshold_or(default_threshold);
            (balance < threshold).then_some(LowTreasury {
                market,
                balance,
                threshold,
            })
        })
        .collect()
}

pub struct TreasuryScanner {
    source: Arc<dyn MarketSource>,
    queue: Arc<dyn JobQueue>,
    default_threshold: f64,
    retry: EnqueueOptions,
}

impl TreasuryScanner {
    pub fn new(
        source: Arc<dyn MarketSource>,
        queue: Arc<dyn JobQueue>,
        default_threshold: f64,
        retry: EnqueueOptions,
    ) -> Self {
        Self {
            source,
            queue,
            default_threshold,
            retry,
        }
    }
}

#[async_trait]
impl PeriodicScan for TreasuryScanner {
    fn name(&self) -> &'static str {
        "Treasury"
    }

    async fn scan_once(&self, tick: DateTime<Utc>) -> AppResult<usize> {
        let markets = self.source.treasury_positions().await?;
        let low = select_low_treasury(&markets, self.default_threshold);
        let event = EventCode::TreasuryLow;

        let mut enqueued = 0;
        for entry in &low {
            let job = AlertJob::new(event, entry.context());
            let options = self
                .retry
                .clone()
                .keyed(job_key(event.alert_code(), entry.market.market_id, tick));

            match self.queue.enqueue(&job, &options).await {
                Ok(Some(_)) => enqueued += 1,
                Ok(None) => {}
                Err(e) => log::error!(
                    "Failed to enqueue {} for market {}: {}",
                    event.alert_code(),
                    entry.market.market_id,
                    e
                ),
            }
        }

        Ok(enqueued)
    }
}
