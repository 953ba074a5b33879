//! Validation and normalization of raw upstream vouchers.
//!
//! Both transport channels yield [`RawVoucher`] records with untyped string
//! fields. Normalization rejects records missing a voucher number, date,
//! party, or a positive amount; dates are canonicalized from the formats the
//! upstream emits; amounts are parsed from decimal strings into paise.

use crate::models::PaymentMode;
use crate::services::metrics::record_date_fallback;
use crate::services::narration::{classify_mode, extract_bill_ref};
use crate::services::upstream::RawVoucher;
use chrono::{NaiveDate, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use std::str::FromStr;
use thiserror::Error;
use tracing::warn;

/// Why a raw record was dropped during normalization.
#[derive(Debug, Error)]
pub enum VoucherParseError {
    #[error("missing {0}")]
    MissingField(&'static str),

    #[error("unparsable amount {0:?}")]
    BadAmount(String),

    #[error("non-positive amount {0:?}")]
    NonPositiveAmount(String),
}

/// A validated bill ready for upsert.
#[derive(Debug, Clone)]
pub struct BillUpsert {
    pub voucher_no: String,
    pub bill_date: NaiveDate,
    pub party: String,
    pub amount_paise: i64,
}

/// A validated receipt ready for upsert, with narration-derived fields.
#[derive(Debug, Clone)]
pub struct ReceiptUpsert {
    pub receipt_no: String,
    pub receipt_date: NaiveDate,
    pub party: String,
    pub amount_paise: i64,
    pub mode: PaymentMode,
    pub reference: Option<String>,
    pub bill_ref: Option<String>,
}

/// Parse an upstream date. The upstream emits `YYYYMMDD` natively; manual
/// exports use `DD-MM-YYYY`, and canonical `YYYY-MM-DD` round-trips.
pub fn parse_voucher_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    NaiveDate::parse_from_str(trimmed, "%Y%m%d")
        .or_else(|_| NaiveDate::parse_from_str(trimmed, "%d-%m-%Y"))
        .or_else(|_| NaiveDate::parse_from_str(trimmed, "%Y-%m-%d"))
        .ok()
}

/// Parse a decimal amount string into paise, rounding sub-paise fractions.
pub fn parse_amount_paise(raw: &str) -> Option<i64> {
    let cleaned = raw.trim().replace(',', "");
    let amount = Decimal::from_str(&cleaned).ok()?;
    (amount * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
}

fn required<'a>(value: &'a str, field: &'static str) -> Result<&'a str, VoucherParseError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(VoucherParseError::MissingField(field))
    } else {
        Ok(trimmed)
    }
}

fn normalize_date(raw: &RawVoucher) -> Result<NaiveDate, VoucherParseError> {
    let date_str = required(&raw.date, "date")?;
    match parse_voucher_date(date_str) {
        Some(date) => Ok(date),
        None => {
            // Lossy fallback for garbled but present dates: keep the record,
            // stamp it with today, and make the substitution observable.
            warn!(
                voucher_no = %raw.voucher_no,
                raw_date = %raw.date,
                "Unparsable voucher date, falling back to current date"
            );
            record_date_fallback();
            Ok(Utc::now().date_naive())
        }
    }
}

fn normalize_amount(raw: &str) -> Result<i64, VoucherParseError> {
    let amount_str = required(raw, "amount")?;
    let paise =
        parse_amount_paise(amount_str).ok_or_else(|| VoucherParseError::BadAmount(raw.into()))?;
    if paise <= 0 {
        return Err(VoucherParseError::NonPositiveAmount(raw.into()));
    }
    Ok(paise)
}

/// Validate and normalize a raw sales voucher.
pub fn normalize_bill(raw: &RawVoucher) -> Result<BillUpsert, VoucherParseError> {
    let voucher_no = required(&raw.voucher_no, "voucher number")?.to_string();
    let party = required(&raw.party, "party name")?.to_string();
    let bill_date = normalize_date(raw)?;
    let amount_paise = normalize_amount(&raw.amount)?;

    Ok(BillUpsert {
        voucher_no,
        bill_date,
        party,
        amount_paise,
    })
}

/// Validate and normalize a raw receipt voucher, classifying its narration.
pub fn normalize_receipt(raw: &RawVoucher) -> Result<ReceiptUpsert, VoucherParseError> {
    let receipt_no = required(&raw.voucher_no, "voucher number")?.to_string();
    let party = required(&raw.party, "party name")?.to_string();
    let receipt_date = normalize_date(raw)?;
    let amount_paise = normalize_amount(&raw.amount)?;
    let narration = raw.narration.as_deref();

    Ok(ReceiptUpsert {
        receipt_no,
        receipt_date,
        party,
        amount_paise,
        mode: classify_mode(narration),
        reference: raw.narration.clone().filter(|n| !n.trim().is_empty()),
        bill_ref: extract_bill_ref(narration),
    })
}
