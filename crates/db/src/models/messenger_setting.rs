//! Messenger channel settings models.

use courier_core::channels::{Channel, ChannelConfig, ChannelSetting};
use courier_core::error::CoreError;
use courier_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from `messenger_settings`.
///
/// `config` is stored as JSON and decoded into [`ChannelConfig`] on demand;
/// the `channel` column is constrained to the known channel names.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct MessengerSetting {
    pub id: DbId,
    pub user_id: DbId,
    pub channel: String,
    pub is_active: bool,
    #[serde(skip_serializing)]
    pub config: serde_json::Value,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl MessengerSetting {
    /// Parse the channel column.
    pub fn channel(&self) -> Result<Channel, CoreError> {
        self.channel.parse::<Channel>().map_err(CoreError::Internal)
    }

    /// Decode the row into its typed domain form.
    pub fn to_domain(&self) -> Result<ChannelSetting, CoreError> {
        let channel = self.channel()?;
        let config = ChannelConfig::decode(channel, &self.config).map_err(|e| {
            CoreError::Configuration(format!(
                "{}: stored configuration is malformed ({e})",
                channel.display_name()
            ))
        })?;
        Ok(ChannelSetting {
            is_active: self.is_active,
            config,
        })
    }
}

/// DTO for creating or replacing a channel's settings.
#[derive(Debug, Clone, Deserialize)]
pub struct UpsertMessengerSetting {
    pub is_active: bool,
    #[serde(default)]
    pub config: serde_json::Value,
}
