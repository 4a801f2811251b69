//! Shared query parameter types for API handlers.

use courier_core::types::Timestamp;
use serde::Deserialize;

use crate::error::{AppError, AppResult};

/// Generic pagination parameters (`?limit=&offset=`).
///
/// Values are clamped with `courier_db::clamp_limit` / `clamp_offset`.
#[derive(Debug, Default, Deserialize)]
pub struct PaginationParams {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Parse an optional RFC 3339 timestamp query value.
pub fn parse_timestamp(name: &str, value: Option<&str>) -> AppResult<Option<Timestamp>> {
    value
        .map(|v| {
            v.parse::<Timestamp>()
                .map_err(|_| AppError::BadRequest(format!("'{name}' must be an RFC 3339 timestamp")))
        })
        .transpose()
}
