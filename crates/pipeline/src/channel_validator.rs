//! Channel validation against an agent's stored messenger settings.

use std::sync::Arc;

use courier_core::channels::{validate_setting, Channel, ChannelSetting, ChannelValidation};
use courier_core::types::DbId;
use courier_db::models::messenger_setting::MessengerSetting;
use serde::Serialize;

use crate::error::StoreError;
use crate::store::SettingsStore;

/// A channel that passed validation, with its decoded configuration.
#[derive(Debug, Clone)]
pub struct UsableChannel {
    pub channel: Channel,
    pub setting: ChannelSetting,
    pub requires_manual_confirmation: bool,
}

/// Validation verdict for one channel, as reported to the settings UI.
#[derive(Debug, Clone, Serialize)]
pub struct ChannelReport {
    pub channel: Channel,
    #[serde(flatten)]
    pub validation: ChannelValidation,
}

#[derive(Clone)]
pub struct ChannelValidator {
    store: Arc<dyn SettingsStore>,
}

impl ChannelValidator {
    pub fn new(store: Arc<dyn SettingsStore>) -> Self {
        Self { store }
    }

    pub async fn validate(
        &self,
        user_id: DbId,
        channel: Channel,
    ) -> Result<ChannelValidation, StoreError> {
        let rows = self.store.channel_settings(user_id).await?;
        Ok(evaluate(channel, find_row(&rows, channel)).0)
    }

    /// Every known channel, in declaration order.
    pub async fn validate_all(&self, user_id: DbId) -> Result<Vec<ChannelReport>, StoreError> {
        let rows = self.store.channel_settings(user_id).await?;
        Ok(Channel::ALL
            .into_iter()
            .map(|channel| ChannelReport {
                channel,
                validation: evaluate(channel, find_row(&rows, channel)).0,
            })
            .collect())
    }

    /// True iff at least one channel is active and passes validation.
    pub async fn has_any_active_channel(&self, user_id: DbId) -> Result<bool, StoreError> {
        Ok(!self.configured_channels(user_id).await?.is_empty())
    }

    /// Channels able to carry a message, in dispatch priority order.
    pub async fn configured_channels(&self, user_id: DbId) -> Result<Vec<UsableChannel>, StoreError> {
        let rows = self.store.channel_settings(user_id).await?;
        Ok(Channel::DISPATCH_PRIORITY
            .into_iter()
            .filter_map(|channel| match evaluate(channel, find_row(&rows, channel)) {
                (validation, Some(setting)) if validation.is_configured => Some(UsableChannel {
                    channel,
                    setting,
                    requires_manual_confirmation: validation.requires_manual_confirmation,
                }),
                _ => None,
            })
            .collect())
    }
}

fn find_row(rows: &[MessengerSetting], channel: Channel) -> Option<&MessengerSetting> {
    rows.iter().find(|r| r.channel == channel.as_str())
}

/// Decode and validate one row. A row whose stored config cannot be decoded
/// is reported as not configured.
fn evaluate(
    channel: Channel,
    row: Option<&MessengerSetting>,
) -> (ChannelValidation, Option<ChannelSetting>) {
    let Some(row) = row else {
        return (validate_setting(channel, None), None);
    };
    match row.to_domain() {
        Ok(setting) => (validate_setting(channel, Some(&setting)), Some(setting)),
        Err(e) => {
            tracing::warn!(user_id = row.user_id, channel = %channel, error = %e, "Undecodable channel config");
            // Inactive wins over anything the config says.
            let reason = if row.is_active {
                "stored configuration is malformed"
            } else {
                "channel disabled"
            };
            let validation = ChannelValidation {
                is_configured: false,
                requires_manual_confirmation: false,
                error_reason: Some(format!("{}: {reason}", channel.display_name())),
            };
            (validation, None)
        }
    }
}
