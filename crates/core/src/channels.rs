//! Outbound messenger channels and their configuration.
//!
//! A channel's configuration is a closed sum type ([`ChannelConfig`]) with one
//! variant per channel, so validation is checked exhaustively at compile time
//! instead of probing JSON fields at runtime.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Channel
// ---------------------------------------------------------------------------

/// A specific outbound messaging provider/mode.
///
/// The string form matches `messenger_settings.channel` and
/// `notification_logs.channel`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Whatsapp,
    WhatsappWeb,
    Telegram,
    Max,
    MaxWeb,
    Sms,
}

impl Channel {
    pub const ALL: [Channel; 6] = [
        Channel::Whatsapp,
        Channel::WhatsappWeb,
        Channel::Telegram,
        Channel::Max,
        Channel::MaxWeb,
        Channel::Sms,
    ];

    /// Order in which the autopilot falls back when a client has no
    /// preferred channel (or the preferred one is not configured).
    pub const DISPATCH_PRIORITY: [Channel; 6] = [
        Channel::Telegram,
        Channel::Whatsapp,
        Channel::Max,
        Channel::WhatsappWeb,
        Channel::MaxWeb,
        Channel::Sms,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Channel::Whatsapp => "whatsapp",
            Channel::WhatsappWeb => "whatsapp_web",
            Channel::Telegram => "telegram",
            Channel::Max => "max",
            Channel::MaxWeb => "max_web",
            Channel::Sms => "sms",
        }
    }

    /// Human-readable name used in configuration error messages.
    pub fn display_name(self) -> &'static str {
        match self {
            Channel::Whatsapp => "WhatsApp",
            Channel::WhatsappWeb => "WhatsApp Web",
            Channel::Telegram => "Telegram",
            Channel::Max => "Max",
            Channel::MaxWeb => "Max Web",
            Channel::Sms => "SMS",
        }
    }

    /// Whether the platform has an API sender for this channel.
    ///
    /// Rows for channels without one wait in the queue for an operator.
    pub fn supports_automatic_send(self) -> bool {
        matches!(self, Channel::Whatsapp | Channel::Telegram | Channel::Max)
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Channel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Channel::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("Unknown channel '{s}'"))
    }
}

// ---------------------------------------------------------------------------
// Per-channel configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WhatsappMode {
    /// Sends go through an operator-maintained browser session.
    #[default]
    Web,
    BusinessApi,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WhatsappConfig {
    pub mode: WhatsappMode,
    pub api_key: Option<String>,
    pub phone_number_id: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TelegramConnection {
    /// Bot API over HTTPS.
    #[default]
    Bot,
    /// User session over MTProto.
    #[serde(alias = "mtproto")]
    User,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    pub bot_token: Option<String>,
    pub connection_type: TelegramConnection,
    pub session_string: Option<String>,
    pub api_id: Option<i64>,
    pub api_hash: Option<String>,
}

impl TelegramConfig {
    /// Whether this configuration talks MTProto and therefore has no
    /// push-based read receipts.
    pub fn is_user_session(&self) -> bool {
        self.connection_type == TelegramConnection::User
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaxConfig {
    pub api_key: Option<String>,
}

/// Browser-bridge channels (`whatsapp_web`, `max_web`) carry no credential.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebSessionConfig {
    pub session_label: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmsConfig {
    pub sender_name: Option<String>,
}

/// Channel configuration, one variant per [`Channel`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "channel", content = "config", rename_all = "snake_case")]
pub enum ChannelConfig {
    Whatsapp(WhatsappConfig),
    WhatsappWeb(WebSessionConfig),
    Telegram(TelegramConfig),
    Max(MaxConfig),
    MaxWeb(WebSessionConfig),
    Sms(SmsConfig),
}

impl ChannelConfig {
    /// Decode the stored JSON `config` column for `channel`.
    pub fn decode(channel: Channel, config: &serde_json::Value) -> Result<Self, serde_json::Error> {
        // A NULL / missing config behaves like an empty object.
        let value = if config.is_null() {
            serde_json::Value::Object(Default::default())
        } else {
            config.clone()
        };
        Ok(match channel {
            Channel::Whatsapp => ChannelConfig::Whatsapp(serde_json::from_value(value)?),
            Channel::WhatsappWeb => ChannelConfig::WhatsappWeb(serde_json::from_value(value)?),
            Channel::Telegram => ChannelConfig::Telegram(serde_json::from_value(value)?),
            Channel::Max => ChannelConfig::Max(serde_json::from_value(value)?),
            Channel::MaxWeb => ChannelConfig::MaxWeb(serde_json::from_value(value)?),
            Channel::Sms => ChannelConfig::Sms(serde_json::from_value(value)?),
        })
    }

    /// Encode back into the JSON stored in `messenger_settings.config`.
    pub fn encode(&self) -> serde_json::Value {
        let encoded = match self {
            ChannelConfig::Whatsapp(c) => serde_json::to_value(c),
            ChannelConfig::WhatsappWeb(c) | ChannelConfig::MaxWeb(c) => serde_json::to_value(c),
            ChannelConfig::Telegram(c) => serde_json::to_value(c),
            ChannelConfig::Max(c) => serde_json::to_value(c),
            ChannelConfig::Sms(c) => serde_json::to_value(c),
        };
        // Plain structs of strings/ints always serialize.
        encoded.unwrap_or(serde_json::Value::Null)
    }

    pub fn channel(&self) -> Channel {
        match self {
            ChannelConfig::Whatsapp(_) => Channel::Whatsapp,
            ChannelConfig::WhatsappWeb(_) => Channel::WhatsappWeb,
            ChannelConfig::Telegram(_) => Channel::Telegram,
            ChannelConfig::Max(_) => Channel::Max,
            ChannelConfig::MaxWeb(_) => Channel::MaxWeb,
            ChannelConfig::Sms(_) => Channel::Sms,
        }
    }
}

/// A decoded `messenger_settings` row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelSetting {
    pub is_active: bool,
    pub config: ChannelConfig,
}

impl ChannelSetting {
    pub fn channel(&self) -> Channel {
        self.config.channel()
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Outcome of validating one channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelValidation {
    pub is_configured: bool,
    pub requires_manual_confirmation: bool,
    pub error_reason: Option<String>,
}

impl ChannelValidation {
    fn configured() -> Self {
        Self {
            is_configured: true,
            requires_manual_confirmation: false,
            error_reason: None,
        }
    }

    fn manual() -> Self {
        Self {
            is_configured: true,
            requires_manual_confirmation: true,
            error_reason: None,
        }
    }

    fn not_configured(reason: String) -> Self {
        Self {
            is_configured: false,
            requires_manual_confirmation: false,
            error_reason: Some(reason),
        }
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |v| v.trim().is_empty())
}

/// Validate a channel's setting row.
///
/// Rules, in order:
/// 1. no row -> not configured ("channel not set up");
/// 2. inactive -> not configured ("channel disabled"), whatever the config says;
/// 3. channel-specific minimum credentials;
/// 4. browser-session modes are configured but need manual confirmation;
/// 5. everything else is configured.
pub fn validate_setting(channel: Channel, setting: Option<&ChannelSetting>) -> ChannelValidation {
    let name = channel.display_name();
    let Some(setting) = setting else {
        return ChannelValidation::not_configured(format!("{name}: channel not set up"));
    };
    if !setting.is_active {
        return ChannelValidation::not_configured(format!("{name}: channel disabled"));
    }

    match &setting.config {
        ChannelConfig::Whatsapp(cfg) => match cfg.mode {
            WhatsappMode::BusinessApi if is_blank(&cfg.api_key) => {
                ChannelValidation::not_configured(format!(
                    "{name}: Business API mode requires an API key"
                ))
            }
            WhatsappMode::BusinessApi => ChannelValidation::configured(),
            WhatsappMode::Web => ChannelValidation::manual(),
        },
        ChannelConfig::Telegram(cfg) => match cfg.connection_type {
            TelegramConnection::Bot if is_blank(&cfg.bot_token) => {
                ChannelValidation::not_configured(format!("{name}: bot mode requires a bot token"))
            }
            TelegramConnection::User if is_blank(&cfg.session_string) => {
                ChannelValidation::not_configured(format!(
                    "{name}: user mode requires an authorized session"
                ))
            }
            TelegramConnection::Bot | TelegramConnection::User => ChannelValidation::configured(),
        },
        ChannelConfig::Max(cfg) if is_blank(&cfg.api_key) => {
            ChannelValidation::not_configured(format!("{name}: an API key is required"))
        }
        ChannelConfig::Max(_) => ChannelValidation::configured(),
        ChannelConfig::WhatsappWeb(_) | ChannelConfig::MaxWeb(_) => ChannelValidation::manual(),
        ChannelConfig::Sms(_) => ChannelValidation::configured(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn setting(channel: Channel, active: bool, config: serde_json::Value) -> ChannelSetting {
        ChannelSetting {
            is_active: active,
            config: ChannelConfig::decode(channel, &config).unwrap(),
        }
    }

    #[test]
    fn missing_row_is_not_set_up() {
        let v = validate_setting(Channel::Telegram, None);
        assert!(!v.is_configured);
        assert_eq!(v.error_reason.as_deref(), Some("Telegram: channel not set up"));
    }

    #[test]
    fn inactive_is_never_configured() {
        let s = setting(Channel::Max, false, serde_json::json!({"api_key": "k"}));
        let v = validate_setting(Channel::Max, Some(&s));
        assert!(!v.is_configured);
        assert_eq!(v.error_reason.as_deref(), Some("Max: channel disabled"));
    }

    #[test]
    fn whatsapp_web_mode_requires_manual_confirmation() {
        let s = setting(Channel::Whatsapp, true, serde_json::json!({"mode": "web"}));
        let v = validate_setting(Channel::Whatsapp, Some(&s));
        assert!(v.is_configured);
        assert!(v.requires_manual_confirmation);
        assert!(v.error_reason.is_none());
    }

    #[test]
    fn whatsapp_business_api_with_empty_key_is_not_configured() {
        let s = setting(
            Channel::Whatsapp,
            true,
            serde_json::json!({"mode": "business_api", "api_key": ""}),
        );
        let v = validate_setting(Channel::Whatsapp, Some(&s));
        assert!(!v.is_configured);
        assert!(v.error_reason.unwrap().contains("API key"));
    }

    #[test]
    fn whatsapp_business_api_with_key_is_configured() {
        let s = setting(
            Channel::Whatsapp,
            true,
            serde_json::json!({"mode": "business_api", "api_key": "EAAG"}),
        );
        let v = validate_setting(Channel::Whatsapp, Some(&s));
        assert!(v.is_configured);
        assert!(!v.requires_manual_confirmation);
    }

    #[test]
    fn telegram_bot_needs_token() {
        let s = setting(Channel::Telegram, true, serde_json::json!({"connection_type": "bot"}));
        assert!(!validate_setting(Channel::Telegram, Some(&s)).is_configured);

        let s = setting(
            Channel::Telegram,
            true,
            serde_json::json!({"connection_type": "bot", "bot_token": "1:x"}),
        );
        assert!(validate_setting(Channel::Telegram, Some(&s)).is_configured);
    }

    #[test]
    fn telegram_user_mode_needs_session() {
        let s = setting(
            Channel::Telegram,
            true,
            serde_json::json!({"connection_type": "mtproto", "bot_token": "1:x"}),
        );
        let v = validate_setting(Channel::Telegram, Some(&s));
        assert!(!v.is_configured);
        assert!(v.error_reason.unwrap().contains("session"));
    }

    #[test]
    fn max_needs_api_key() {
        let s = setting(Channel::Max, true, serde_json::json!({"api_key": "   "}));
        assert!(!validate_setting(Channel::Max, Some(&s)).is_configured);
    }

    #[test]
    fn sms_defaults_to_configured() {
        let s = setting(Channel::Sms, true, serde_json::Value::Null);
        let v = validate_setting(Channel::Sms, Some(&s));
        assert!(v.is_configured);
        assert!(!v.requires_manual_confirmation);
    }

    #[test]
    fn web_bridge_channels_are_manual() {
        for channel in [Channel::WhatsappWeb, Channel::MaxWeb] {
            let s = setting(channel, true, serde_json::json!({}));
            let v = validate_setting(channel, Some(&s));
            assert!(v.is_configured && v.requires_manual_confirmation, "{channel}");
        }
    }

    #[test]
    fn decode_encode_keeps_fields() {
        let cfg = ChannelConfig::decode(
            Channel::Telegram,
            &serde_json::json!({"connection_type": "user", "session_string": "s", "api_id": 7}),
        )
        .unwrap();
        let encoded = cfg.encode();
        assert_eq!(encoded["connection_type"], "user");
        assert_eq!(encoded["api_id"], 7);
        assert_eq!(cfg.channel(), Channel::Telegram);
    }

    #[test]
    fn channel_round_trips_through_str() {
        for channel in Channel::ALL {
            assert_eq!(channel.as_str().parse::<Channel>().unwrap(), channel);
        }
        assert!("pigeon".parse::<Channel>().is_err());
    }
}
