//! Derived status calculations.
//!
//! Nothing here touches the store: payment position, release state, and
//! session cash arithmetic are all pure functions over already-loaded rows,
//! recomputed on every read.

use crate::models::{BillFinancials, BillStatus, ReleaseState, ReleaseVariant};

/// Derive the payment position of a bill from its amount and the sum of
/// mapped receipts. A surplus is reported in `overpaid_paise` while
/// `remaining_due_paise` clamps at zero.
pub fn derive_financials(amount_paise: i64, receipt_total_paise: i64) -> BillFinancials {
    let status = if receipt_total_paise == 0 {
        BillStatus::Due
    } else if receipt_total_paise >= amount_paise {
        BillStatus::Paid
    } else {
        BillStatus::PartPaid
    };

    BillFinancials {
        receipt_total_paise,
        remaining_due_paise: (amount_paise - receipt_total_paise).max(0),
        overpaid_paise: (receipt_total_paise - amount_paise).max(0),
        status,
    }
}

/// Derive the release state of a bill from its registry row.
///
/// `variant` is the registry variant column when a release exists;
/// `delivered` reports whether a transporter release has a recorded
/// delivery.
pub fn derive_release_state(variant: Option<&str>, delivered: bool) -> ReleaseState {
    match variant.map(ReleaseVariant::from_str) {
        None => ReleaseState::Ready,
        Some(ReleaseVariant::SelfPickup) => ReleaseState::ReleasedSelf,
        Some(ReleaseVariant::Transporter) if delivered => ReleaseState::Delivered,
        Some(ReleaseVariant::Transporter) => ReleaseState::InTransit,
    }
}

/// Cash a closing cashier should be holding: the opening float plus cash
/// taken at the counter, minus petty cash paid out, plus the net of till
/// adjustments.
pub fn expected_cash_paise(
    opening_float_paise: i64,
    hint_cash_paise: i64,
    petty_cash_paise: i64,
    adjustment_net_paise: i64,
) -> i64 {
    opening_float_paise + hint_cash_paise - petty_cash_paise + adjustment_net_paise
}

/// Difference between counted and expected cash. Negative means a shortage.
pub fn variance_paise(counted_paise: i64, expected_paise: i64) -> i64 {
    counted_paise - expected_paise
}

/// Whether the absolute variance breaches the supervisory threshold.
pub fn breaches_threshold(variance_paise: i64, threshold_paise: i64) -> bool {
    variance_paise.abs() > threshold_paise
}
