//! SMS sender posting to an HTTP gateway.

use async_trait::async_trait;
use serde::Serialize;

use super::{deliver_http, http_client, parse_config, validate_http_url, ChannelSender, DeliveryResult};
use crate::error::{AppError, AppResult};
use crate::models::{ChannelKind, SmsConfig};

const DEFAULT_SENDER: &str = "TRESO";

#[derive(Serialize)]
struct SmsRequest<'a> {
    from: &'a str,
    to: &'a str,
    text: &'a str,
}

pub struct SmsSender {
    client: reqwest::Client,
    global_gateway_url: Option<String>,
    global_api_key: Option<String>,
    global_sender: String,
}

impl SmsSender {
    pub fn new() -> Self {
        Self {
            client: http_client(),
            global_gateway_url: std::env::var("SMS_GATEWAY_URL").ok(),
            global_api_key: std::env::var("SMS_API_KEY").ok(),
            global_sender: std::env::var("SMS_SENDER")
                .unwrap_or_else(|_| DEFAULT_SENDER.to_string()),
        }
    }

    /// Accepts an optional leading `+`, digits, spaces, dots and dashes
    fn is_valid_phone(phone: &str) -> bool {
        let digits = phone.strip_prefix('+').unwrap_or(phone);
        let digit_count = digits.chars().filter(|c| c.is_ascii_digit()).count();

        digit_count >= 6
            && digits
                .chars()
                .all(|c| c.is_ascii_digit() || matches!(c, ' ' | '.' | '-'))
    }

    fn normalize_phone(phone: &str) -> String {
        phone
            .chars()
            .filter(|c| c.is_ascii_digit() || *c == '+')
            .collect()
    }
}

impl Default for SmsSender {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChannelSender for SmsSender {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Sms
    }

    async fn send(
        &self,
        config: &serde_json::Value,
        destination: &str,
        _subject: &str,
        body: &str,
    ) -> DeliveryResult {
        let config: SmsConfig = match parse_config(config) {
            Ok(c) => c,
            Err(e) => return DeliveryResult::failed(format!("Invalid SMS config: {}", e), None),
        };

        let gateway_url = match config.gateway_url.or_else(|| self.global_gateway_url.clone()) {
            Some(url) => url,
            None => return DeliveryResult::failed("SMS gateway not configured", None),
        };

        if !Self::is_valid_phone(destination) {
            return DeliveryResult::failed(format!("Invalid phone number: {}", destination), None);
        }

        let sender = config
            .sender
            .unwrap_or_else(|| self.global_sender.clone());
        let to = Self::normalize_phone(destination);

        let mut request = self.client.post(&gateway_url).json(&SmsRequest {
            from: &sender,
            to: &to,
            text: body,
        });

        if let Some(api_key) = config.api_key.or_else(|| self.global_api_key.clone()) {
            request = request.bearer_auth(api_key);
        }

        deliver_http(request).await
    }

    fn validate_config(&self, config: &serde_json::Value) -> AppResult<()> {
        let sms_config: SmsConfig = parse_config(config)
            .map_err(|e| AppError::Validation(format!("Invalid SMS config: {}", e)))?;

        match sms_config.gateway_url.as_ref().or(self.global_gateway_url.as_ref()) {
            Some(url) => validate_http_url(url, "SMS gateway"),
            None => Err(AppError::Validation(
                "SMS gateway URL must be configured either globally or per-channel".to_string(),
            )),
        }
    }
}
