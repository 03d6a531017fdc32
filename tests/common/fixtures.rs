//! Test data helpers for the host tables

#![allow(dead_code)]

use chrono::NaiveDate;
use sqlx::PgPool;

pub async fn insert_user(pool: &PgPool, email: Option<&str>, phone: Option<&str>) -> String {
    let id: i32 = sqlx::query_scalar("INSERT INTO users (email, phone) VALUES ($1, $2) RETURNING id")
        .bind(email)
        .bind(phone)
        .fetch_one(pool)
        .await
        .expect("Failed to insert user");
    id.to_string()
}

/// Builder for a row in `markets` with its payments and disbursements
pub struct MarketBuilder {
    code: String,
    ceiling: f64,
    used: f64,
    threshold: Option<f64>,
    end_date: Option<NaiveDate>,
    active: bool,
    payments: Vec<f64>,
    disbursements: Vec<f64>,
}

impl MarketBuilder {
    pub fn new(code: &str) -> Self {
        Self {
            code: code.to_string(),
            ceiling: 0.0,
            used: 0.0,
            threshold: None,
            end_date: None,
            active: true,
            payments: Vec::new(),
            disbursements: Vec::new(),
        }
    }

    pub fn prefinancing(mut self, ceiling: f64, used: f64) -> Self {
        self.ceiling = ceiling;
        self.used = used;
        self
    }

    pub fn threshold(mut self, threshold: f64) -> Self {
        self.threshold = Some(threshold);
        self
    }

    pub fn ends_on(mut self, date: NaiveDate) -> Self {
        self.end_date = Some(date);
        self
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    pub fn payment(mut self, amount: f64) -> Self {
        self.payments.push(amount);
        self
    }

    pub fn disbursement(mut self, amount: f64) -> Self {
        self.disbursements.push(amount);
        self
    }

    pub async fn insert(self, pool: &PgPool) -> i64 {
        let id: i32 = sqlx::query_scalar(
            r#"
            INSERT INTO markets (code, label, currency, prefinancing_ceiling, prefinancing_used,
                                 treasury_threshold, end_date, is_active)
            VALUES ($1, $2, 'XOF', $3::float8, $4::float8, $5::float8, $6, $7)
            RETURNING id
            "#,
        )
        .bind(&self.code)
        .bind(format!("Marché {}", self.code))
        .bind(self.ceiling)
        .bind(self.used)
        .bind(self.threshold)
        .bind(self.end_date)
        .bind(self.active)
        .fetch_one(pool)
        .await
        .expect("Failed to insert market");

        for amount in self.payments {
            sqlx::query("INSERT INTO market_payments (market_id, amount) VALUES ($1, $2::float8)")
                .bind(id)
                .bind(amount)
                .execute(pool)
                .await
                .expect("Failed to insert payment");
        }
        for amount in self.disbursements {
            sqlx::query(
                "INSERT INTO market_disbursements (market_id, amount) VALUES ($1, $2::float8)",
            )
            .bind(id)
            .bind(amount)
            .execute(pool)
            .await
            .expect("Failed to insert disbursement");
        }

        i64::from(id)
    }
}
