//! Read-only projections over business tables owned by the host application.

use chrono::NaiveDate;
use serde::Serialize;
use sqlx::FromRow;

/// Treasury aggregates of one active market
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct MarketTreasury {
    pub market_id: i64,
    pub code: String,
    pub label: String,
    pub currency: Option<String>,
    pub payments_received: f64,
    pub disbursements: f64,
    pub prefinancing_ceiling: f64,
    pub prefinancing_used: f64,
    /// Market-specific alert threshold, if set
    pub treasury_threshold: Option<f64>,
}

impl MarketTreasury {
    /// Cash position: receipts minus outflows plus unused pre-financing headroom
    pub fn balance(&self) -> f64 {
        self.payments_received - self.disbursements
            + (self.prefinancing_ceiling - self.prefinancing_used)
    }

    pub fn threshold_or(&self, default: f64) -> f64 {
        self.treasury_threshold.unwrap_or(default)
    }
}

/// Active market with its contractual end date
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct MarketDeadline {
    pub market_id: i64,
    pub code: String,
    pub label: String,
    pub currency: Option<String>,
    pub end_date: NaiveDate,
}

/// Contact points of a user from the host directory
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct UserContact {
    pub id: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}
