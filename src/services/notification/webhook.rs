//! Webhook sender.
//!
//! Sends alerts as HTTP POST requests with JSON payloads, signed with
//! HMAC-SHA256 when a secret is configured.

use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;

use super::{deliver_http, http_client, parse_config, validate_http_url, ChannelSender, DeliveryResult};
use crate::error::{AppError, AppResult};
use crate::models::{ChannelKind, WebhookConfig};

type HmacSha256 = Hmac<Sha256>;

#[derive(Serialize)]
struct WebhookPayload<'a> {
    subject: &'a str,
    body: &'a str,
    sent_at: String,
}

/// Webhook sender
pub struct WebhookSender {
    client: reqwest::Client,
}

impl WebhookSender {
    pub fn new() -> Self {
        Self {
            client: http_client(),
        }
    }

    /// Generates HMAC-SHA256 signature over `timestamp.payload`
    fn generate_signature(secret: &str, timestamp: &str, payload: &[u8]) -> Result<String, String> {
        let signature_payload = format!("{}.{}", timestamp, String::from_utf8_lossy(payload));
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|e| format!("Invalid webhook secret: {}", e))?;
        mac.update(signature_payload.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// The recipient URL wins; the configured URL is the fallback
    fn target_url<'a>(destination: &'a str, config: &'a WebhookConfig) -> Option<&'a str> {
        let destination = destination.trim();
        if !destination.is_empty() {
            Some(destination)
        } else {
            config.url.as_deref()
        }
    }
}

impl Default for WebhookSender {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChannelSender for WebhookSender {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Webhook
    }

    async fn send(
        &self,
        config: &serde_json::Value,
        destination: &str,
        subject: &str,
        body: &str,
    ) -> DeliveryResult {
        let config: WebhookConfig = match parse_config(config) {
            Ok(c) => c,
            Err(e) => return DeliveryResult::failed(format!("Invalid webhook config: {}", e), None),
        };

        let Some(url) = Self::target_url(destination, &config) else {
            return DeliveryResult::failed("Webhook URL not configured", None);
        };

        if let Err(e) = validate_http_url(url, "Webhook") {
            return DeliveryResult::failed(e.to_string(), None);
        }

        let now = Utc::now();
        let payload = WebhookPayload {
            subject,
            body,
            sent_at: now.to_rfc3339(),
        };
        let payload_bytes = match serde_json::to_vec(&payload) {
            Ok(b) => b,
            Err(e) => {
                return DeliveryResult::failed(format!("Failed to serialize payload: {}", e), None)
            }
        };

        let timestamp = now.timestamp().to_string();

        let mut request = self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .header("X-Treso-Timestamp", &timestamp);

        if let Some(ref secret) = config.secret {
            let signature = match Self::generate_signature(secret, &timestamp, &payload_bytes) {
                Ok(signature) => signature,
                Err(e) => return DeliveryResult::failed(e, None),
            };
            request = request.header("X-Treso-Signature", format!("sha256={}", signature));
        }

        if let Some(ref headers) = config.headers {
            for (key, value) in headers {
                request = request.header(key.as_str(), value.as_str());
            }
        }

        deliver_http(request.body(payload_bytes)).await
    }

    fn validate_config(&self, config: &serde_json::Value) -> AppResult<()> {
        let webhook_config: WebhookConfig = parse_config(config)
            .map_err(|e| AppError::Validation(format!("Invalid webhook config: {}", e)))?;

        if let Some(ref url) = webhook_config.url {
            validate_http_url(url, "Webhook")?;
        }

        Ok(())
    }
}
