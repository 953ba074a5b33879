//! HTTP handlers for dispatch-service.
//!
//! The handlers are a thin command/query surface over the services layer;
//! validation and DTO shaping happen here, business rules do not.

pub mod bills;
pub mod releases;
pub mod sessions;
pub mod sync;

use crate::error::DispatchError;
use crate::services::voucher::parse_amount_paise;

/// Parse a decimal money string from a request into paise.
pub(crate) fn parse_money(field: &str, value: &str) -> Result<i64, DispatchError> {
    parse_amount_paise(value)
        .ok_or_else(|| DispatchError::InvalidAmount(format!("{field}: {value:?}")))
}

/// Parse an optional money field, treating absence as zero.
pub(crate) fn parse_money_opt(field: &str, value: Option<&str>) -> Result<i64, DispatchError> {
    match value {
        Some(v) if !v.trim().is_empty() => parse_money(field, v),
        _ => Ok(0),
    }
}
