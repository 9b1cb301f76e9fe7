//! Settings resolution for wildwatch-da
//!
//! Priority per setting: CLI → ENV → TOML → compiled default. CLI and ENV
//! arrive together as [`SettingsOverrides`] (clap resolves the two); the TOML
//! tier comes from `wildwatch_common::config`.

use crate::services::messaging_gateway::{Channel, TwilioConfig, DEFAULT_FROM_NUMBER, TWILIO_API_BASE};
use crate::services::carousel::{DEFAULT_AUTOPLAY, DEFAULT_TRANSITION};
use std::time::Duration;
use tracing::info;
use wildwatch_common::config::TomlConfig;
use wildwatch_common::{Error, Result};

pub const DEFAULT_PORT: u16 = 5810;
pub const DEFAULT_CLASSIFIER_ENDPOINT: &str = "http://localhost:5000";
pub const DEFAULT_CLASSIFIER_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_LOG_FILTER: &str = "wildwatch_da=info,tower_http=info";

/// Values supplied on the command line or through the environment
#[derive(Debug, Clone, Default)]
pub struct SettingsOverrides {
    pub port: Option<u16>,
    pub classifier_endpoint: Option<String>,
    pub classifier_timeout_ms: Option<u64>,
    pub account_sid: Option<String>,
    pub auth_token: Option<String>,
    pub from_number: Option<String>,
    pub channel: Option<String>,
    pub delivery_timeout_ms: Option<u64>,
    pub twilio_api_base: Option<String>,
    pub recipients: Vec<String>,
    pub autoplay_ms: Option<u64>,
    pub transition_ms: Option<u64>,
    pub log_level: Option<String>,
}

/// Gateway settings after resolution
#[derive(Debug, Clone, PartialEq)]
pub struct GatewaySettings {
    pub api_base: String,
    pub account_sid: Option<String>,
    pub auth_token: Option<String>,
    pub from_number: String,
    pub channel: Channel,
    pub delivery_timeout: Option<Duration>,
}

/// Fully resolved service settings
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub port: u16,
    pub classifier_endpoint: String,
    pub classifier_timeout: Duration,
    pub gateway: GatewaySettings,
    pub recipients: Vec<String>,
    pub autoplay: Duration,
    pub transition: Duration,
    pub log_filter: String,
}

impl Settings {
    pub fn resolve(overrides: SettingsOverrides, toml: &TomlConfig) -> Result<Self> {
        let channel = match overrides.channel.or_else(|| toml.gateway.channel.clone()) {
            Some(raw) => raw.parse::<Channel>().map_err(Error::Config)?,
            None => Channel::default(),
        };

        let recipients = if !overrides.recipients.is_empty() {
            overrides.recipients
        } else {
            toml.recipients.clone()
        };
        let recipients: Vec<String> = recipients
            .into_iter()
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty())
            .collect();

        let settings = Self {
            port: overrides.port.or(toml.port).unwrap_or(DEFAULT_PORT),
            classifier_endpoint: overrides
                .classifier_endpoint
                .or_else(|| toml.classifier.endpoint.clone())
                .unwrap_or_else(|| DEFAULT_CLASSIFIER_ENDPOINT.to_string()),
            classifier_timeout: overrides
                .classifier_timeout_ms
                .or(toml.classifier.timeout_ms)
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_CLASSIFIER_TIMEOUT),
            gateway: GatewaySettings {
                api_base: overrides
                    .twilio_api_base
                    .unwrap_or_else(|| TWILIO_API_BASE.to_string()),
                account_sid: non_blank(overrides.account_sid)
                    .or_else(|| non_blank(toml.gateway.account_sid.clone())),
                auth_token: non_blank(overrides.auth_token)
                    .or_else(|| non_blank(toml.gateway.auth_token.clone())),
                from_number: overrides
                    .from_number
                    .or_else(|| toml.gateway.from_number.clone())
                    .unwrap_or_else(|| DEFAULT_FROM_NUMBER.to_string()),
                channel,
                delivery_timeout: overrides
                    .delivery_timeout_ms
                    .or(toml.gateway.delivery_timeout_ms)
                    .map(Duration::from_millis),
            },
            recipients,
            autoplay: overrides
                .autoplay_ms
                .or(toml.carousel.autoplay_ms)
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_AUTOPLAY),
            transition: overrides
                .transition_ms
                .or(toml.carousel.transition_ms)
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_TRANSITION),
            log_filter: overrides
                .log_level
                .or_else(|| toml.logging.level.clone())
                .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string()),
        };

        if settings.autoplay.is_zero() {
            return Err(Error::Config("carousel.autoplay_ms must be > 0".to_string()));
        }

        info!(
            port = settings.port,
            classifier = %settings.classifier_endpoint,
            channel = %settings.gateway.channel,
            recipients = settings.recipients.len(),
            "Settings resolved"
        );

        Ok(settings)
    }

    /// Twilio account settings; fails when credentials are missing
    pub fn twilio_config(&self) -> Result<TwilioConfig> {
        let account_sid = self.gateway.account_sid.clone().ok_or_else(|| {
            Error::Config(
                "Twilio account SID not configured (--account-sid, TWILIO_SID or gateway.account_sid)"
                    .to_string(),
            )
        })?;
        let auth_token = self.gateway.auth_token.clone().ok_or_else(|| {
            Error::Config(
                "Twilio auth token not configured (--auth-token, TWILIO_AUTH_TOKEN or gateway.auth_token)"
                    .to_string(),
            )
        })?;

        Ok(TwilioConfig {
            api_base: self.gateway.api_base.clone(),
            account_sid,
            auth_token,
            from_number: self.gateway.from_number.clone(),
            channel: self.gateway.channel,
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::resolve(SettingsOverrides::default(), &TomlConfig::default()).unwrap();
        assert_eq!(settings.port, DEFAULT_PORT);
        assert_eq!(settings.classifier_endpoint, DEFAULT_CLASSIFIER_ENDPOINT);
        assert_eq!(settings.gateway.channel, Channel::WhatsApp);
        assert_eq!(settings.gateway.from_number, DEFAULT_FROM_NUMBER);
        assert_eq!(settings.autoplay, Duration::from_millis(6000));
        assert_eq!(settings.transition, Duration::from_millis(1000));
        assert_eq!(settings.log_filter, DEFAULT_LOG_FILTER);
        assert!(settings.recipients.is_empty());
    }

    #[test]
    fn test_overrides_beat_toml() {
        let toml: TomlConfig = toml::from_str(
            r#"
                port = 6000
                recipients = ["+15550001"]

                [classifier]
                endpoint = "http://toml:5000"

                [gateway]
                channel = "sms"
            "#,
        )
        .unwrap();

        let overrides = SettingsOverrides {
            port: Some(7000),
            recipients: vec!["+15559999".to_string()],
            ..Default::default()
        };

        let settings = Settings::resolve(overrides, &toml).unwrap();
        assert_eq!(settings.port, 7000);
        assert_eq!(settings.recipients, vec!["+15559999"]);
        // Not overridden: TOML wins over default
        assert_eq!(settings.classifier_endpoint, "http://toml:5000");
        assert_eq!(settings.gateway.channel, Channel::Sms);
    }

    #[test]
    fn test_blank_recipients_dropped() {
        let overrides = SettingsOverrides {
            recipients: vec![" +15550001 ".to_string(), "  ".to_string()],
            ..Default::default()
        };
        let settings = Settings::resolve(overrides, &TomlConfig::default()).unwrap();
        assert_eq!(settings.recipients, vec!["+15550001"]);
    }

    #[test]
    fn test_unknown_channel_is_config_error() {
        let overrides = SettingsOverrides {
            channel: Some("fax".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            Settings::resolve(overrides, &TomlConfig::default()),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_twilio_config_requires_credentials() {
        let settings = Settings::resolve(SettingsOverrides::default(), &TomlConfig::default()).unwrap();
        assert!(settings.twilio_config().is_err());

        let overrides = SettingsOverrides {
            account_sid: Some("AC123".to_string()),
            auth_token: Some("secret".to_string()),
            ..Default::default()
        };
        let settings = Settings::resolve(overrides, &TomlConfig::default()).unwrap();
        let twilio = settings.twilio_config().unwrap();
        assert_eq!(twilio.account_sid, "AC123");
        assert_eq!(twilio.api_base, TWILIO_API_BASE);
    }
}
