use std::time::Duration;

use chrono::{FixedOffset, Offset, Utc};
use courier_core::error::CoreError;
use courier_events::ProviderEndpoints;

/// Pipeline configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// How long cached audit rules and blacklist stay fresh.
    pub audit_cache_ttl: Duration,
    /// Per-call bound on provider requests and protocol session operations.
    pub provider_timeout: Duration,
    pub endpoints: ProviderEndpoints,
    /// Offset of the agents' local calendar from UTC.
    pub autopilot_utc_offset: FixedOffset,
    pub autopilot_check_interval: Duration,
    pub reconcile_interval: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            audit_cache_ttl: Duration::from_millis(1000),
            provider_timeout: Duration::from_secs(15),
            endpoints: ProviderEndpoints::default(),
            autopilot_utc_offset: Utc.fix(),
            autopilot_check_interval: Duration::from_secs(60),
            reconcile_interval: Duration::from_secs(300),
        }
    }
}

impl PipelineConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                          | Default                             |
    /// |----------------------------------|-------------------------------------|
    /// | `AUDIT_CACHE_TTL_MS`             | `1000`                              |
    /// | `PROVIDER_TIMEOUT_SECS`          | `15`                                |
    /// | `MTPROTO_BRIDGE_URL`             | unset (user-session features off)   |
    /// | `TELEGRAM_API_BASE`              | `https://api.telegram.org`          |
    /// | `WHATSAPP_API_BASE`              | `https://graph.facebook.com/v19.0`  |
    /// | `MAX_API_BASE`                   | `https://botapi.max.ru`             |
    /// | `AUTOPILOT_UTC_OFFSET_MINUTES`   | `0`                                 |
    /// | `AUTOPILOT_CHECK_INTERVAL_SECS`  | `60`                                |
    /// | `RECONCILE_INTERVAL_SECS`        | `300`                               |
    pub fn from_env() -> Result<Self, CoreError> {
        let defaults = Self::default();
        let default_endpoints = defaults.endpoints.clone();

        let offset_minutes: i32 = parse_var("AUTOPILOT_UTC_OFFSET_MINUTES", 0)?;
        let autopilot_utc_offset = FixedOffset::east_opt(offset_minutes * 60).ok_or_else(|| {
            CoreError::Configuration(format!(
                "AUTOPILOT_UTC_OFFSET_MINUTES out of range: {offset_minutes}"
            ))
        })?;

        Ok(Self {
            audit_cache_ttl: Duration::from_millis(parse_var("AUDIT_CACHE_TTL_MS", 1000)?),
            provider_timeout: Duration::from_secs(parse_var("PROVIDER_TIMEOUT_SECS", 15)?),
            endpoints: ProviderEndpoints {
                telegram_api_base: string_var("TELEGRAM_API_BASE")
                    .unwrap_or(default_endpoints.telegram_api_base),
                whatsapp_api_base: string_var("WHATSAPP_API_BASE")
                    .unwrap_or(default_endpoints.whatsapp_api_base),
                max_api_base: string_var("MAX_API_BASE").unwrap_or(default_endpoints.max_api_base),
                mtproto_bridge_url: string_var("MTPROTO_BRIDGE_URL"),
            },
            autopilot_utc_offset,
            autopilot_check_interval: Duration::from_secs(parse_var(
                "AUTOPILOT_CHECK_INTERVAL_SECS",
                60,
            )?),
            reconcile_interval: Duration::from_secs(parse_var("RECONCILE_INTERVAL_SECS", 300)?),
        })
    }
}

fn string_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T, CoreError> {
    match string_var(name) {
        None => Ok(default),
        Some(raw) => raw
            .parse()
            .map_err(|_| CoreError::Configuration(format!("{name} has an invalid value '{raw}'"))),
    }
}
