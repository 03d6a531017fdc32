//! Email sender.
//!
//! Sends alerts via SMTP using the lettre crate, as a plain text part with
//! an HTML alternative.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::{Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use super::{parse_config, ChannelSender, DeliveryResult};
use crate::error::{AppError, AppResult};
use crate::models::{ChannelKind, EmailConfig};

const DEFAULT_FROM_ADDRESS: &str = "alertes@treso.local";
const DEFAULT_SMTP_PORT: u16 = 587;

/// Email sender
pub struct EmailSender {
    // Global SMTP configuration (fallback if channel doesn't specify)
    global_smtp_host: Option<String>,
    global_smtp_port: u16,
    global_smtp_username: Option<String>,
    global_smtp_password: Option<String>,
    global_from_address: String,
}

/// SMTP settings after applying channel config over global defaults
#[derive(Debug, PartialEq)]
struct SmtpSettings {
    host: String,
    port: u16,
    credentials: Option<(String, String)>,
    from_address: String,
}

impl EmailSender {
    /// Creates a new email sender with global SMTP settings from environment
    pub fn new() -> Self {
        Self {
            global_smtp_host: std::env::var("SMTP_HOST").ok(),
            global_smtp_port: std::env::var("SMTP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(DEFAULT_SMTP_PORT),
            global_smtp_username: std::env::var("SMTP_USERNAME").ok(),
            global_smtp_password: std::env::var("SMTP_PASSWORD").ok(),
            global_from_address: std::env::var("SMTP_FROM")
                .unwrap_or_else(|_| DEFAULT_FROM_ADDRESS.to_string()),
        }
    }

    /// Channel config overrides global settings
    fn resolve(&self, config: &EmailConfig) -> Option<SmtpSettings> {
        let host = config
            .smtp_host
            .clone()
            .or_else(|| self.global_smtp_host.clone())?;

        let username = config
            .smtp_username
            .clone()
            .or_else(|| self.global_smtp_username.clone());
        let password = config
            .smtp_password
            .clone()
            .or_else(|| self.global_smtp_password.clone());

        Some(SmtpSettings {
            host,
            port: config.smtp_port.unwrap_or(self.global_smtp_port),
            credentials: username.zip(password),
            from_address: config
                .from_address
                .clone()
                .unwrap_or_else(|| self.global_from_address.clone()),
        })
    }

    /// Wraps the plain text body in a minimal HTML layout
    fn format_html(subject: &str, body: &str) -> String {
        let paragraphs = body
            .split("\n\n")
            .map(|p| format!("<p>{}</p>", html_escape(p).replace('\n', "<br>")))
            .collect::<Vec<_>>()
            .join("\n            ");

        format!(
            r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
</head>
<body style="font-family: -apple-system, 'Segoe UI', Roboto, sans-serif; background-color: #f3f4f6; padding: 20px;">
    <div style="max-width: 600px; margin: 0 auto; background-color: #ffffff; border-radius: 8px; overflow: hidden;">
        <div style="background-color: #1e3a8a; padding: 16px 24px;">
            <h1 style="color: #ffffff; margin: 0; font-size: 18px;">{subject}</h1>
        </div>
        <div style="padding: 24px; font-size: 14px; color: #374151; line-height: 1.5;">
            {paragraphs}
        </div>
    </div>
</body>
</html>"#,
            subject = html_escape(subject),
            paragraphs = paragraphs,
        )
    }

    fn build_message(
        from_address: &str,
        to: Mailbox,
        subject: &str,
        body: &str,
    ) -> Result<Message, String> {
        let from: Mailbox = from_address
            .parse()
            .or_else(|_| DEFAULT_FROM_ADDRESS.parse())
            .map_err(|e| format!("Invalid from address: {}", e))?;

        Message::builder()
            .from(from)
            .to(to)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(body.to_string()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(Self::format_html(subject, body)),
                    ),
            )
            .map_err(|e| format!("Failed to build email: {}", e))
    }

    fn build_transport(
        settings: &SmtpSettings,
    ) -> Result<AsyncSmtpTransport<Tokio1Executor>, String> {
        // Port 465 = implicit TLS (SMTPS), anything else = STARTTLS
        let builder = if settings.port == 465 {
            let tls_params = TlsParameters::new(settings.host.clone())
                .map_err(|e| format!("Invalid TLS parameters for SMTP host: {}", e))?;

            AsyncSmtpTransport::<Tokio1Executor>::relay(&settings.host)
                .map(|b| b.port(settings.port).tls(Tls::Wrapper(tls_params)))
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.host)
                .map(|b| b.port(settings.port))
        }
        .map_err(|e| format!("Invalid SMTP host: {}", e))?;

        let transport = match &settings.credentials {
            Some((username, password)) => builder
                .credentials(Credentials::new(username.clone(), password.clone()))
                .build(),
            None => builder.build(),
        };

        Ok(transport)
    }
}

impl Default for EmailSender {
    fn default() -> Self {
        Self::new()
    }
}

/// Simple HTML escaping for email content
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[async_trait]
impl ChannelSender for EmailSender {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Email
    }

    async fn send(
        &self,
        config: &serde_json::Value,
        destination: &str,
        subject: &str,
        body: &str,
    ) -> DeliveryResult {
        let config: EmailConfig = match parse_config(config) {
            Ok(c) => c,
            Err(e) => return DeliveryResult::failed(format!("Invalid email config: {}", e), None),
        };

        let Some(settings) = self.resolve(&config) else {
            return DeliveryResult::failed("SMTP host not configured", None);
        };

        let to: Mailbox = match destination.parse() {
            Ok(addr) => addr,
            Err(_) => {
                return DeliveryResult::failed(
                    format!("Invalid email recipient: {}", destination),
                    None,
                )
            }
        };

        let email = match Self::build_message(&settings.from_address, to, subject, body) {
            Ok(email) => email,
            Err(e) => return DeliveryResult::failed(e, None),
        };

        let mailer = match Self::build_transport(&settings) {
            Ok(mailer) => mailer,
            Err(e) => return DeliveryResult::failed(e, None),
        };

        match mailer.send(email).await {
            Ok(_) => {
                log::debug!("Email sent successfully to {}", destination);
                DeliveryResult::delivered(None)
            }
            Err(e) => DeliveryResult::failed(
                format!("Failed to send email to {}: {}", destination, e),
                None,
            ),
        }
    }

    fn validate_config(&self, config: &serde_json::Value) -> AppResult<()> {
        let email_config: EmailConfig = parse_config(config)
            .map_err(|e| AppError::Validation(format!("Invalid email config: {}", e)))?;

        if email_config.smtp_host.is_none() && self.global_smtp_host.is_none() {
            return Err(AppError::Validation(
                "SMTP host must be configured either globally or per-channel".to_string(),
            ));
        }

        if let Some(ref from) = email_config.from_address {
            from.parse::<Mailbox>()
                .map_err(|_| AppError::Validation(format!("Invalid from address: {}", from)))?;
        }

        Ok(())
    }
}
