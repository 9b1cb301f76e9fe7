//! Messaging gateways
//!
//! A gateway delivers one text message to one recipient. [`TwilioGateway`]
//! talks to the Twilio Messages API; [`LogGateway`] only logs (dry run).

use async_trait::async_trait;
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

pub const TWILIO_API_BASE: &str = "https://api.twilio.com";

/// HTTP timeout for a single gateway request
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Twilio WhatsApp sandbox sender
pub const DEFAULT_FROM_NUMBER: &str = "+14155238886";

const WHATSAPP_PREFIX: &str = "whatsapp:";
const USER_AGENT: &str = concat!("wildwatch-da/", env!("CARGO_PKG_VERSION"));

/// Single-delivery errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Gateway rejected message ({0}): {1}")]
    Rejected(u16, String),

    #[error("delivery timed out after {0} ms")]
    Timeout(u64),
}

/// Delivery channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Channel {
    #[default]
    WhatsApp,
    Sms,
}

impl Channel {
    /// Address as the gateway expects it on this channel
    pub fn address(&self, number: &str) -> String {
        match self {
            Channel::WhatsApp if !number.starts_with(WHATSAPP_PREFIX) => {
                format!("{}{}", WHATSAPP_PREFIX, number)
            }
            _ => number.to_string(),
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::WhatsApp => f.write_str("whatsapp"),
            Channel::Sms => f.write_str("sms"),
        }
    }
}

impl FromStr for Channel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "whatsapp" => Ok(Channel::WhatsApp),
            "sms" => Ok(Channel::Sms),
            other => Err(format!("unknown channel '{}' (expected whatsapp or sms)", other)),
        }
    }
}

/// Messaging gateway contract
#[async_trait]
pub trait MessagingGateway: Send + Sync {
    /// Gateway identifier for logs and health output
    fn name(&self) -> &'static str;

    async fn send(&self, recipient: &str, message: &str) -> Result<(), DeliveryError>;
}

/// Twilio account settings
#[derive(Debug, Clone)]
pub struct TwilioConfig {
    pub api_base: String,
    pub account_sid: String,
    pub auth_token: String,
    pub from_number: String,
    pub channel: Channel,
}

#[derive(Debug, Deserialize)]
struct TwilioErrorBody {
    message: Option<String>,
}

/// Twilio Messages API gateway
pub struct TwilioGateway {
    http_client: reqwest::Client,
    config: TwilioConfig,
}

impl TwilioGateway {
    pub fn new(config: TwilioConfig, timeout: Duration) -> Result<Self, DeliveryError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| DeliveryError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            config,
        })
    }

    pub fn messages_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.config.api_base.trim_end_matches('/'),
            self.config.account_sid
        )
    }

    /// Twilio error JSON carries a human-readable `message`; anything else is passed through
    fn error_text(body: String) -> String {
        serde_json::from_str::<TwilioErrorBody>(&body)
            .ok()
            .and_then(|b| b.message)
            .unwrap_or(body)
    }
}

#[async_trait]
impl MessagingGateway for TwilioGateway {
    fn name(&self) -> &'static str {
        "twilio"
    }

    async fn send(&self, recipient: &str, message: &str) -> Result<(), DeliveryError> {
        let from = self.config.channel.address(&self.config.from_number);
        let to = self.config.channel.address(recipient);
        let params = [("From", from.as_str()), ("To", to.as_str()), ("Body", message)];

        let response = self
            .http_client
            .post(self.messages_url())
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .form(&params)
            .send()
            .await
            .map_err(|e| DeliveryError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DeliveryError::Rejected(status.as_u16(), Self::error_text(body)));
        }

        tracing::debug!(to = %to, channel = %self.config.channel, "Twilio accepted message");
        Ok(())
    }
}

/// Dry-run gateway: logs each delivery and reports success
#[derive(Debug, Default)]
pub struct LogGateway;

#[async_trait]
impl MessagingGateway for LogGateway {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn send(&self, recipient: &str, message: &str) -> Result<(), DeliveryError> {
        tracing::info!(recipient = %recipient, message = %message, "Dry run: alert not sent");
        Ok(())
    }
}
