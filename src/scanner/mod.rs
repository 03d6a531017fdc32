//! Periodic scanners that synthesize alert jobs from stored market state.
//!
//! Scanners only enqueue; the queue worker does the rest. Each scanner runs
//! its own loop, one scan per interval tick, until cancelled. A failed scan is
//! logged and the next tick proceeds. Nothing is suppressed between cycles:
//! a market that stays in alert re-fires every cycle.

pub mod deadline;
pub mod treasury;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::error::AppResult;
use crate::models::{MarketDeadline, MarketTreasury};

pub use deadline::DeadlineScanner;
pub use treasury::TreasuryScanner;

/// Read access to market aggregates
#[async_trait]
pub trait MarketSource: Send + Sync {
    /// Treasury aggregates of every active market
    async fn treasury_positions(&self) -> AppResult<Vec<MarketTreasury>>;

    /// Active markets ending within `[from, to]`
    async fn deadlines_between(&self, from: NaiveDate, to: NaiveDate)
        -> AppResult<Vec<MarketDeadline>>;
}

/// One scan cycle
#[async_trait]
pub trait PeriodicScan: Send + Sync {
    fn name(&self) -> &'static str;

    /// Scans once for the cycle started at `tick`; returns enqueued job count
    async fn scan_once(&self, tick: DateTime<Utc>) -> AppResult<usize>;
}

/// Dedup key of a scanner job: one per rule, market and cycle
pub fn job_key(alert_code: &str, market_id: i64, tick: DateTime<Utc>) -> String {
    format!("{}-{}-{}", alert_code, market_id, tick.timestamp())
}

/// Runs `scanner` every `interval` until `cancel` is triggered
pub async fn run_periodic<S: PeriodicScan>(scanner: S, interval: Duration, cancel: CancellationToken) {
    log::info!(
        "{} scanner started (interval: {}s)",
        scanner.name(),
        interval.as_secs()
    );

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                log::info!("{} scanner stopping", scanner.name());
                break;
            }
            _ = ticker.tick() => {
                match scanner.scan_once(Utc::now()).await {
                    Ok(0) => log::debug!("{} scan: nothing to enqueue", scanner.name()),
                    Ok(count) => log::info!("{} scan: enqueued {} job(s)", scanner.name(), count),
                    Err(e) => log::error!("{} scan failed: {}", scanner.name(), e),
                }
            }
        }
    }
}

// =============================================================================
// Postgres Market Source
// =============================================================================

/// Reads `markets`, `market_payments` and `market_disbursements`
#[derive(Clone)]
pub struct PgMarketSource {
    pool: PgPool,
}

impl PgMarketSource {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MarketSource for PgMarketSource {
    async fn treasury_positions(&self) -> AppResult<Vec<MarketTreasury>> {
        let markets = sqlx::query_as::<_, MarketTreasury>(
            r#"
            SELECT m.id::int8 AS market_id,
                   m.code::text AS code,
                   m.label::text AS label,
                   m.currency::text AS currency,
                   COALESCE(p.total, 0)::float8 AS payments_received,
                   COALESCE(d.total, 0)::float8 AS disbursements,
                   COALESCE(m.prefinancing_ceiling, 0)::float8 AS prefinancing_ceiling,
                   COALESCE(m.prefinancing_used, 0)::float8 AS prefinancing_used,
                   m.treasury_threshold::float8 AS treasury_threshold
            FROM markets m
            LEFT JOIN (
                SELECT market_id, SUM(amount) AS total
                FROM market_payments
                GROUP BY market_id
            ) p ON p.market_id = m.id
            LEFT JOIN (
                SELECT market_id, SUM(amount) AS total
                FROM market_disbursements
                GROUP BY market_id
            ) d ON d.market_id = m.id
            WHERE m.is_active
            ORDER BY m.id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(markets)
    }

    async fn deadlines_between(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> AppResult<Vec<MarketDeadline>> {
        let markets = sqlx::query_as::<_, MarketDeadline>(
            r#"
            SELECT m.id::int8 AS market_id,
                   m.code::text AS code,
                   m.label::text AS label,
                   m.currency::text AS currency,
                   m.end_date AS end_date
            FROM markets m
            WHERE m.is_active AND m.end_date BETWEEN $1 AND $2
            ORDER BY m.end_date, m.id
            "#,
        )
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        Ok(markets)
    }
}
