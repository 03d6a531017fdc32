//! In-app sender.
//!
//! The stored notification row is the delivery itself, so sending only
//! checks that a user is addressed.

use async_trait::async_trait;

use super::{ChannelSender, DeliveryResult};
use crate::error::AppResult;
use crate::models::ChannelKind;

pub struct InAppSender;

#[async_trait]
impl ChannelSender for InAppSender {
    fn kind(&self) -> ChannelKind {
        ChannelKind::InApp
    }

    async fn send(
        &self,
        _config: &serde_json::Value,
        destination: &str,
        _subject: &str,
        _body: &str,
    ) -> DeliveryResult {
        if destination.trim().is_empty() {
            DeliveryResult::failed("In-app notification requires a user", None)
        } else {
            DeliveryResult::delivered(None)
        }
    }

    fn validate_config(&self, _config: &serde_json::Value) -> AppResult<()> {
        Ok(())
    }
}
