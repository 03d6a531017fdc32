//! Channel senders using the Strategy pattern.
//!
//! Every channel kind (email, SMS, push, webhook, in-app) implements
//! [`ChannelSender`]. A sender gets the stored channel config, a destination
//! and an already rendered message, and reports the outcome without ever
//! returning an error. Credentials resolve stored config first, then
//! environment defaults, then compiled defaults.

pub mod email;
pub mod in_app;
pub mod push;
pub mod sms;
pub mod webhook;

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::error::AppResult;
use crate::models::ChannelKind;

pub use email::EmailSender;
pub use in_app::InAppSender;
pub use push::PushSender;
pub use sms::SmsSender;
pub use webhook::WebhookSender;

/// Transport-level timeout for HTTP based senders
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

// =============================================================================
// Delivery Result
// =============================================================================

/// Outcome of one delivery attempt
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryResult {
    pub delivered: bool,
    /// HTTP status code (if applicable)
    pub http_status: Option<u16>,
    pub error: Option<String>,
}

impl DeliveryResult {
    pub fn delivered(http_status: Option<u16>) -> Self {
        Self {
            delivered: true,
            http_status,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>, http_status: Option<u16>) -> Self {
        Self {
            delivered: false,
            http_status,
            error: Some(error.into()),
        }
    }
}

// =============================================================================
// Channel Sender Trait
// =============================================================================

#[async_trait]
pub trait ChannelSender: Send + Sync {
    fn kind(&self) -> ChannelKind;

    /// Attempts delivery of a rendered message to `destination`
    async fn send(
        &self,
        config: &serde_json::Value,
        destination: &str,
        subject: &str,
        body: &str,
    ) -> DeliveryResult;

    /// Validates stored channel configuration before it is saved
    fn validate_config(&self, config: &serde_json::Value) -> AppResult<()>;
}

/// Creates the sender for a channel kind with environment defaults
pub fn create_sender(kind: ChannelKind) -> Arc<dyn ChannelSender> {
    match kind {
        ChannelKind::Email => Arc::new(EmailSender::new()),
        ChannelKind::Sms => Arc::new(SmsSender::new()),
        ChannelKind::Push => Arc::new(PushSender::new()),
        ChannelKind::Webhook => Arc::new(WebhookSender::new()),
        ChannelKind::InApp => Arc::new(InAppSender),
    }
}

// =============================================================================
// Sender Registry
// =============================================================================

/// Senders available to the engine, one per channel kind
#[derive(Clone, Default)]
pub struct SenderRegistry {
    senders: HashMap<ChannelKind, Arc<dyn ChannelSender>>,
}

impl SenderRegistry {
    /// Registry with the built-in sender of every channel kind
    pub fn from_env() -> Self {
        ChannelKind::ALL
            .into_iter()
            .fold(Self::default(), |registry, kind| {
                registry.with_sender(create_sender(kind))
            })
    }

    /// Registers (or replaces) the sender for its channel kind
    pub fn with_sender(mut self, sender: Arc<dyn ChannelSender>) -> Self {
        self.senders.insert(sender.kind(), sender);
        self
    }

    pub fn get(&self, kind: ChannelKind) -> Option<Arc<dyn ChannelSender>> {
        self.senders.get(&kind).cloned()
    }
}

// =============================================================================
// HTTP Helpers
// =============================================================================

pub(crate) fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .unwrap_or_default()
}

/// Parses a stored config, treating `null` as all defaults
pub(crate) fn parse_config<T>(config: &serde_json::Value) -> Result<T, serde_json::Error>
where
    T: serde::de::DeserializeOwned + Default,
{
    if config.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(config.clone())
}

/// Sends a prepared request and maps the response to a delivery outcome
pub(crate) async fn deliver_http(request: reqwest::RequestBuilder) -> DeliveryResult {
    match request.send().await {
        Ok(response) => {
            let status = response.status().as_u16();
            if response.status().is_success() {
                DeliveryResult::delivered(Some(status))
            } else {
                let error_body = response.text().await.unwrap_or_default();
                let error_msg = if error_body.is_empty() {
                    format!("HTTP {}", status)
                } else {
                    format!("HTTP {}: {}", status, truncate(&error_body, 200))
                };
                DeliveryResult::failed(error_msg, Some(status))
            }
        }
        Err(e) => {
            let error_msg = if e.is_timeout() {
                "Request timed out".to_string()
            } else if e.is_connect() {
                "Connection failed".to_string()
            } else {
                format!("Request failed: {}", e)
            };
            DeliveryResult::failed(error_msg, None)
        }
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}…", &s[..idx]),
        None => s.to_string(),
    }
}

/// Checks that a gateway URL parses and uses HTTP(S)
pub(crate) fn validate_http_url(raw: &str, what: &str) -> AppResult<()> {
    use crate::error::AppError;

    let parsed = url::Url::parse(raw)
        .map_err(|_| AppError::Validation(format!("Invalid {} URL format", what)))?;

    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(AppError::Validation(format!(
            "{} URL must use HTTP or HTTPS",
            what
        )));
    }

    Ok(())
}
