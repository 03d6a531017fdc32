//! Push sender posting to an HTTP push gateway.
//!
//! The destination is the user id the gateway maps to device tokens.

use async_trait::async_trait;
use serde::Serialize;

use super::{deliver_http, http_client, parse_config, validate_http_url, ChannelSender, DeliveryResult};
use crate::error::{AppError, AppResult};
use crate::models::{ChannelKind, PushConfig};

#[derive(Serialize)]
struct PushRequest<'a> {
    to: &'a str,
    notification: PushNotification<'a>,
}

#[derive(Serialize)]
struct PushNotification<'a> {
    title: &'a str,
    body: &'a str,
}

pub struct PushSender {
    client: reqwest::Client,
    global_gateway_url: Option<String>,
    global_server_key: Option<String>,
}

impl PushSender {
    pub fn new() -> Self {
        Self {
            client: http_client(),
            global_gateway_url: std::env::var("PUSH_GATEWAY_URL").ok(),
            global_server_key: std::env::var("PUSH_SERVER_KEY").ok(),
        }
    }
}

impl Default for PushSender {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChannelSender for PushSender {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Push
    }

    async fn send(
        &self,
        config: &serde_json::Value,
        destination: &str,
        subject: &str,
        body: &str,
    ) -> DeliveryResult {
        let config: PushConfig = match parse_config(config) {
            Ok(c) => c,
            Err(e) => return DeliveryResult::failed(format!("Invalid push config: {}", e), None),
        };

        let Some(gateway_url) = config.gateway_url.or_else(|| self.global_gateway_url.clone())
        else {
            return DeliveryResult::failed("Push gateway not configured", None);
        };

        if destination.trim().is_empty() {
            return DeliveryResult::failed("Missing push destination", None);
        }

        let mut request = self.client.post(&gateway_url).json(&PushRequest {
            to: destination,
            notification: PushNotification {
                title: subject,
                body,
            },
        });

        if let Some(key) = config.server_key.or_else(|| self.global_server_key.clone()) {
            request = request.header("Authorization", format!("key={}", key));
        }

        deliver_http(request).await
    }

    fn validate_config(&self, config: &serde_json::Value) -> AppResult<()> {
        let push_config: PushConfig = parse_config(config)
            .map_err(|e| AppError::Validation(format!("Invalid push config: {}", e)))?;

        match push_config
            .gateway_url
            .as_ref()
            .or(self.global_gateway_url.as_ref())
        {
            Some(url) => validate_http_url(url, "Push gateway"),
            None => Err(AppError::Validation(
                "Push gateway URL must be configured either globally or per-channel".to_string(),
            )),
        }
    }
}
