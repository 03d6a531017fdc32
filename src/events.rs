//! Business event codes accepted by the dispatcher.

use serde::{Deserialize, Serialize};

/// Closed set of business events that can raise alerts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventCode {
    MarketCreated,
    PaymentReceived,
    DisbursementValidated,
    TreasuryLow,
    DeadlineApproaching,
}

impl EventCode {
    pub const ALL: [EventCode; 5] = [
        EventCode::MarketCreated,
        EventCode::PaymentReceived,
        EventCode::DisbursementValidated,
        EventCode::TreasuryLow,
        EventCode::DeadlineApproaching,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventCode::MarketCreated => "MARKET_CREATED",
            EventCode::PaymentReceived => "PAYMENT_RECEIVED",
            EventCode::DisbursementValidated => "DISBURSEMENT_VALIDATED",
            EventCode::TreasuryLow => "TREASURY_LOW",
            EventCode::DeadlineApproaching => "DEADLINE_APPROACHING",
        }
    }

    /// Code of the alert rule this event fires
    pub fn alert_code(&self) -> &'static str {
        match self {
            EventCode::MarketCreated => "MARCHE_CREE",
            EventCode::PaymentReceived => "PAIEMENT_RECU",
            EventCode::DisbursementValidated => "DECAISSEMENT_VALIDE",
            EventCode::TreasuryLow => "TRESORERIE_FAIBLE",
            EventCode::DeadlineApproaching => "DEADLINE_APPROCHANT",
        }
    }
}

impl std::fmt::Display for EventCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EventCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventCode::ALL
            .into_iter()
            .find(|code| code.as_str() == s)
            .ok_or_else(|| format!("Unknown event code '{}'", s))
    }
}
