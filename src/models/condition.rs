//! Structured rule conditions.
//!
//! Conditions are stored as JSON on the rule and parsed on every evaluation:
//!
//! ```json
//! {"type": "threshold", "field": "balance", "op": "lt", "value": 10000}
//! {"type": "date_window", "field": "due_date", "days": 30}
//! {"type": "date_window", "field": "due_date"}
//! {"type": "all", "conditions": [ ... ]}
//! {"type": "any", "conditions": [ ... ]}
//! {"type": "always"}
//! ```
//!
//! An empty object or `null` means "always". Anything that does not match a
//! known shape becomes [`AlertCondition::Unknown`], which evaluates to true.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

use super::context::AlertContext;

/// Numeric comparison operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompareOp {
    #[serde(alias = "<")]
    Lt,
    #[serde(alias = "<=")]
    Lte,
    #[serde(alias = ">")]
    Gt,
    #[serde(alias = ">=")]
    Gte,
    #[serde(alias = "==", alias = "=")]
    Eq,
    #[serde(alias = "!=")]
    Ne,
}

impl CompareOp {
    pub fn compare(&self, actual: f64, limit: f64) -> bool {
        match self {
            CompareOp::Lt => actual < limit,
            CompareOp::Lte => actual <= limit,
            CompareOp::Gt => actual > limit,
            CompareOp::Gte => actual >= limit,
            CompareOp::Eq => (actual - limit).abs() < f64::EPSILON,
            CompareOp::Ne => (actual - limit).abs() >= f64::EPSILON,
        }
    }
}

/// Parsed rule condition
#[derive(Debug, Clone, PartialEq)]
pub enum AlertCondition {
    /// Compare a numeric context field; `value` falls back to the context threshold
    Threshold {
        field: String,
        op: CompareOp,
        value: Option<f64>,
    },
    /// Date field must fall within `[today, today + days]`; `days` falls back
    /// to the context window
    DateWindow { field: String, days: Option<i64> },
    All(Vec<AlertCondition>),
    Any(Vec<AlertCondition>),
    Always,
    /// Unrecognized payload, kept verbatim
    Unknown { raw: serde_json::Value },
}

#[derive(Deserialize)]
struct ThresholdFields {
    field: String,
    op: CompareOp,
    #[serde(default)]
    value: Option<f64>,
}

#[derive(Deserialize)]
struct DateWindowFields {
    field: String,
    #[serde(default)]
    days: Option<i64>,
}

impl AlertCondition {
    pub fn parse(raw: &serde_json::Value) -> Self {
        let object = match raw {
            serde_json::Value::Null => return AlertCondition::Always,
            serde_json::Value::Object(map) if map.is_empty() => return AlertCondition::Always,
            serde_json::Value::Object(map) => map,
            _ => return Self::unknown(raw),
        };

        let Some(kind) = object.get("type").and_then(|t| t.as_str()) else {
            return Self::unknown(raw);
        };

        match kind {
            "always" => AlertCondition::Always,
            "threshold" => match serde_json::from_value::<ThresholdFields>(raw.clone()) {
                Ok(fields) => AlertCondition::Threshold {
                    field: fields.field,
                    op: fields.op,
                    value: fields.value,
                },
                Err(_) => Self::unknown(raw),
            },
            "date_window" => match serde_json::from_value::<DateWindowFields>(raw.clone()) {
                Ok(fields) if fields.days.map_or(true, |d| d >= 0) => AlertCondition::DateWindow {
                    field: fields.field,
                    days: fields.days,
                },
                _ => Self::unknown(raw),
            },
            "all" | "any" => match object.get("conditions").and_then(|c| c.as_array()) {
                Some(children) => {
                    let parsed = children.iter().map(Self::parse).collect();
                    if kind == "all" {
                        AlertCondition::All(parsed)
                    } else {
                        AlertCondition::Any(parsed)
                    }
                }
                None => Self::unknown(raw),
            },
            _ => Self::unknown(raw),
        }
    }

    fn unknown(raw: &serde_json::Value) -> Self {
        AlertCondition::Unknown { raw: raw.clone() }
    }

    /// Evaluates against a context; missing fields and unknown shapes pass
    pub fn evaluate(&self, ctx: &AlertContext, today: NaiveDate) -> bool {
        match self {
            AlertCondition::Always => true,
            AlertCondition::Unknown { raw } => {
                log::debug!("Unrecognized alert condition {}, triggering", raw);
                true
            }
            AlertCondition::Threshold { field, op, value } => {
                let Some(actual) = ctx.numeric(field) else {
                    return true;
                };
                match value.or(ctx.threshold) {
                    Some(limit) => op.compare(actual, limit),
                    None => true,
                }
            }
            AlertCondition::DateWindow { field, days } => {
                match (ctx.date(field), days.or(ctx.window_days)) {
                    (Some(date), Some(days)) => {
                        date >= today && window_end(today, days).map_or(true, |end| date <= end)
                    }
                    _ => true,
                }
            }
            AlertCondition::All(children) => children.iter().all(|c| c.evaluate(ctx, today)),
            // An empty `any` places no constraint
            AlertCondition::Any(children) => {
                children.is_empty() || children.iter().any(|c| c.evaluate(ctx, today))
            }
        }
    }
}

/// Last day of a window starting `today`; `None` when it runs past the calendar
pub fn window_end(today: NaiveDate, days: i64) -> Option<NaiveDate> {
    Duration::try_days(days).and_then(|d| today.checked_add_signed(d))
}
