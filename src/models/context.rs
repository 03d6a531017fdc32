//! Ephemeral context carried from a business event to rule evaluation.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Typed bag of values describing what triggered an alert
///
/// Serialized as JSON inside queued jobs, so every field is optional.
/// Free-form values go in the `extra` object; unknown top-level keys are
/// ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlertContext {
    /// Business entity the alert is about (a market for every built-in event)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub balance: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    /// Look-ahead in days for date conditions that do not set their own
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_days: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

impl AlertContext {
    /// Context scoped to a market
    pub fn for_market(id: i64, code: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            entity_id: Some(id),
            entity_code: Some(code.into()),
            entity_label: Some(label.into()),
            ..Default::default()
        }
    }

    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = Some(currency.into());
        self
    }

    pub fn with_amount(mut self, amount: f64) -> Self {
        self.amount = Some(amount);
        self
    }

    pub fn with_balance(mut self, balance: f64) -> Self {
        self.balance = Some(balance);
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = Some(threshold);
        self
    }

    pub fn with_due_date(mut self, due_date: NaiveDate) -> Self {
        self.due_date = Some(due_date);
        self
    }

    pub fn with_window_days(mut self, days: i64) -> Self {
        self.window_days = Some(days);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Looks up a numeric field by name, falling back to a parsable `extra` entry
    pub fn numeric(&self, field: &str) -> Option<f64> {
        match field {
            "amount" => self.amount,
            "threshold" => self.threshold,
            "balance" => self.balance,
            "entity_id" => self.entity_id.map(|id| id as f64),
            other => self.extra.get(other).and_then(|v| v.trim().parse().ok()),
        }
    }

    /// Looks up a date field by name, falling back to an ISO date in `extra`
    pub fn date(&self, field: &str) -> Option<NaiveDate> {
        match field {
            "due_date" => self.due_date,
            other => self
                .extra
                .get(other)
                .and_then(|v| NaiveDate::parse_from_str(v.trim(), "%Y-%m-%d").ok()),
        }
    }

    /// Flattens the context into template variables
    pub fn variables(&self) -> BTreeMap<String, String> {
        let mut vars = self.extra.clone();
        let mut put = |key: &str, value: Option<String>| {
            if let Some(value) = value {
                vars.insert(key.to_string(), value);
            }
        };

        put("entity_id", self.entity_id.map(|v| v.to_string()));
        put("entity_code", self.entity_code.clone());
        put("entity_label", self.entity_label.clone());
        put("currency", self.currency.clone());
        put("amount", self.amount.map(format_amount));
        put("threshold", self.threshold.map(format_amount));
        put("balance", self.balance.map(format_amount));
        put("due_date", self.due_date.map(|d| d.format("%d/%m/%Y").to_string()));
        put("window_days", self.window_days.map(|d| d.to_string()));
        put("message", self.message.clone());
        vars
    }
}

/// Formats an amount with two decimals and space-separated thousands
pub fn format_amount(value: f64) -> String {
    let formatted = format!("{:.2}", value.abs());
    let (int_part, dec_part) = formatted.split_once('.').unwrap_or((&formatted, "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(' ');
        }
        grouped.push(ch);
    }

    let sign = if value < 0.0 { "-" } else { "" };
    format!("{}{},{}", sign, grouped, dec_part)
}
