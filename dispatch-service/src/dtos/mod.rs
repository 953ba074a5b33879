//! Request and response DTOs for the HTTP surface.
//!
//! Money crosses the boundary as decimal strings ("1234.50"); internally
//! everything is integer paise.

use crate::models::{
    CashierSession, GateLogEntry, PaymentHint, PettyCashEntry, Receipt, Release,
    ReleaseSelfDetail, ReleaseTransporterDetail, TillAdjustment,
};
use crate::services::sessions::SessionView;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Render paise as a decimal string with two fraction digits.
pub fn format_paise(paise: i64) -> String {
    Decimal::new(paise, 2).to_string()
}

// ============================================================================
// Sync
// ============================================================================

#[derive(Debug, Serialize)]
pub struct SyncRunResponse {
    pub outcome: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bills_synced: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipts_synced: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mapped_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bills_skipped: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipts_skipped: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct ProbeResponse {
    pub method: String,
}

// ============================================================================
// Bills & Dashboard
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ReceiptDto {
    pub receipt_no: String,
    pub receipt_date: NaiveDate,
    pub party: String,
    pub amount: String,
    pub mode: String,
    pub reference: Option<String>,
    pub bill_ref: Option<String>,
    pub bill_no: Option<String>,
}

impl From<&Receipt> for ReceiptDto {
    fn from(r: &Receipt) -> Self {
        Self {
            receipt_no: r.receipt_no.clone(),
            receipt_date: r.receipt_date,
            party: r.party.clone(),
            amount: format_paise(r.amount_paise),
            mode: r.mode.clone(),
            reference: r.reference.clone(),
            bill_ref: r.bill_ref.clone(),
            bill_no: r.bill_no.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PaymentHintDto {
    pub hint_id: Uuid,
    pub bill_no: String,
    pub session_id: Uuid,
    pub cashier: String,
    pub cash: String,
    pub cheque: String,
    pub digital: String,
    pub reference: Option<String>,
    pub created_utc: DateTime<Utc>,
}

impl From<&PaymentHint> for PaymentHintDto {
    fn from(h: &PaymentHint) -> Self {
        Self {
            hint_id: h.hint_id,
            bill_no: h.bill_no.clone(),
            session_id: h.session_id,
            cashier: h.cashier.clone(),
            cash: format_paise(h.cash_paise),
            cheque: format_paise(h.cheque_paise),
            digital: format_paise(h.digital_paise),
            reference: h.reference.clone(),
            created_utc: h.created_utc,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SelfDetailDto {
    pub receiver_name: String,
    pub receiver_phone: String,
}

impl From<&ReleaseSelfDetail> for SelfDetailDto {
    fn from(d: &ReleaseSelfDetail) -> Self {
        Self {
            receiver_name: d.receiver_name.clone(),
            receiver_phone: d.receiver_phone.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TransporterDetailDto {
    pub transporter_name: String,
    pub vehicle_no: String,
    pub driver_name: String,
    pub driver_phone: String,
    pub lr_no: Option<String>,
    pub delivered_utc: Option<DateTime<Utc>>,
    pub pod_reference: Option<String>,
}

impl From<&ReleaseTransporterDetail> for TransporterDetailDto {
    fn from(d: &ReleaseTransporterDetail) -> Self {
        Self {
            transporter_name: d.transporter_name.clone(),
            vehicle_no: d.vehicle_no.clone(),
            driver_name: d.driver_name.clone(),
            driver_phone: d.driver_phone.clone(),
            lr_no: d.lr_no.clone(),
            delivered_utc: d.delivered_utc,
            pod_reference: d.pod_reference.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ReleaseDto {
    pub bill_no: String,
    pub gatepass_no: String,
    pub variant: String,
    pub released_by: String,
    pub approved_by: Option<String>,
    pub approval: String,
    pub released_utc: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub self_pickup: Option<SelfDetailDto>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transporter: Option<TransporterDetailDto>,
}

impl ReleaseDto {
    pub fn new(
        release: &Release,
        self_detail: Option<&ReleaseSelfDetail>,
        transporter_detail: Option<&ReleaseTransporterDetail>,
    ) -> Self {
        Self {
            bill_no: release.bill_no.clone(),
            gatepass_no: release.gatepass_no.clone(),
            variant: release.variant.clone(),
            released_by: release.released_by.clone(),
            approved_by: release.approved_by.clone(),
            approval: release.approval.clone(),
            released_utc: release.released_utc,
            self_pickup: self_detail.map(SelfDetailDto::from),
            transporter: transporter_detail.map(TransporterDetailDto::from),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct GateLogDto {
    pub gatepass_no: String,
    pub bill_no: String,
    pub logged_by: String,
    pub vehicle_no: Option<String>,
    pub remarks: Option<String>,
    pub logged_utc: DateTime<Utc>,
}

impl From<&GateLogEntry> for GateLogDto {
    fn from(e: &GateLogEntry) -> Self {
        Self {
            gatepass_no: e.gatepass_no.clone(),
            bill_no: e.bill_no.clone(),
            logged_by: e.logged_by.clone(),
            vehicle_no: e.vehicle_no.clone(),
            remarks: e.remarks.clone(),
            logged_utc: e.logged_utc,
        }
    }
}

/// The full view of a bill the counter works from.
#[derive(Debug, Serialize)]
pub struct BillDetailResponse {
    pub voucher_no: String,
    pub bill_date: NaiveDate,
    pub party: String,
    pub amount: String,
    pub receipt_total: String,
    pub remaining_due: String,
    pub overpaid: String,
    pub status: String,
    pub release_state: String,
    pub last_sync_utc: DateTime<Utc>,
    pub receipts: Vec<ReceiptDto>,
    pub payment_hints: Vec<PaymentHintDto>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release: Option<ReleaseDto>,
    pub gate_log: Vec<GateLogDto>,
}

#[derive(Debug, Deserialize)]
pub struct DashboardQuery {
    pub date: NaiveDate,
}

#[derive(Debug, Default, Serialize)]
pub struct DashboardStatusCounts {
    pub due: u64,
    pub part_paid: u64,
    pub paid: u64,
}

#[derive(Debug, Default, Serialize)]
pub struct DashboardReleaseCounts {
    pub ready: u64,
    pub released_self: u64,
    pub in_transit: u64,
    pub delivered: u64,
}

#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub date: NaiveDate,
    pub bills_total: u64,
    pub by_status: DashboardStatusCounts,
    pub by_release_state: DashboardReleaseCounts,
}

// ============================================================================
// Releases & Gate
// ============================================================================

#[derive(Debug, Deserialize, Validate)]
pub struct SelfReleaseRequest {
    #[validate(length(min = 1, message = "bill_no is required"))]
    pub bill_no: String,
    #[validate(length(min = 1, message = "gatepass_no is required"))]
    pub gatepass_no: String,
    #[validate(length(min = 1, message = "receiver_name is required"))]
    pub receiver_name: String,
    #[validate(length(min = 10, message = "receiver_phone must be at least 10 characters"))]
    pub receiver_phone: String,
    #[validate(length(min = 1, message = "released_by is required"))]
    pub released_by: String,
    pub approved_by: Option<String>,
    pub manager_pin: Option<String>,
    #[serde(default)]
    pub otp_verified: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct TransporterReleaseRequest {
    #[validate(length(min = 1, message = "bill_no is required"))]
    pub bill_no: String,
    #[validate(length(min = 1, message = "gatepass_no is required"))]
    pub gatepass_no: String,
    #[validate(length(min = 1, message = "transporter_name is required"))]
    pub transporter_name: String,
    #[validate(length(min = 1, message = "vehicle_no is required"))]
    pub vehicle_no: String,
    #[validate(length(min = 1, message = "driver_name is required"))]
    pub driver_name: String,
    #[validate(length(min = 10, message = "driver_phone must be at least 10 characters"))]
    pub driver_phone: String,
    pub lr_no: Option<String>,
    #[validate(length(min = 1, message = "released_by is required"))]
    pub released_by: String,
    pub approved_by: Option<String>,
    pub manager_pin: Option<String>,
    #[serde(default)]
    pub otp_verified: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ConfirmDeliveryRequest {
    #[validate(length(min = 1, message = "pod_reference is required"))]
    pub pod_reference: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct GateLogRequest {
    #[validate(length(min = 1, message = "gatepass_no is required"))]
    pub gatepass_no: String,
    #[validate(length(min = 1, message = "logged_by is required"))]
    pub logged_by: String,
    pub vehicle_no: Option<String>,
    pub remarks: Option<String>,
}

// ============================================================================
// Sessions
// ============================================================================

#[derive(Debug, Deserialize, Validate)]
pub struct OpenSessionRequest {
    #[validate(length(min = 1, message = "cashier is required"))]
    pub cashier: String,
    /// Decimal string, e.g. "1000.00".
    #[validate(length(min = 1, message = "opening_float is required"))]
    pub opening_float: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CloseSessionRequest {
    #[validate(length(min = 1, message = "counted_cash is required"))]
    pub counted_cash: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ApproveSessionRequest {
    #[validate(length(min = 1, message = "approved_by is required"))]
    pub approved_by: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct PettyCashRequest {
    #[validate(length(min = 1, message = "amount is required"))]
    pub amount: String,
    #[validate(length(min = 1, message = "purpose is required"))]
    pub purpose: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct TillAdjustmentRequest {
    /// "add" or "remove".
    #[validate(custom(function = "validate_direction"))]
    pub direction: String,
    #[validate(length(min = 1, message = "amount is required"))]
    pub amount: String,
    #[validate(length(min = 1, message = "reason is required"))]
    pub reason: String,
}

fn validate_direction(direction: &str) -> Result<(), validator::ValidationError> {
    match direction {
        "add" | "remove" => Ok(()),
        _ => Err(validator::ValidationError::new(
            "direction must be 'add' or 'remove'",
        )),
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct PaymentHintRequest {
    pub session_id: Uuid,
    #[validate(length(min = 1, message = "bill_no is required"))]
    pub bill_no: String,
    /// Decimal strings; omitted portions default to zero.
    pub cash: Option<String>,
    pub cheque: Option<String>,
    pub digital: Option<String>,
    pub reference: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SessionDto {
    pub session_id: Uuid,
    pub cashier: String,
    pub status: String,
    pub opened_utc: DateTime<Utc>,
    pub closed_utc: Option<DateTime<Utc>>,
    pub opening_float: String,
    pub counted_cash: Option<String>,
    pub expected_cash: Option<String>,
    pub variance: Option<String>,
    pub needs_approval: bool,
    pub approved_by: Option<String>,
}

impl From<&CashierSession> for SessionDto {
    fn from(s: &CashierSession) -> Self {
        Self {
            session_id: s.session_id,
            cashier: s.cashier.clone(),
            status: s.status.clone(),
            opened_utc: s.opened_utc,
            closed_utc: s.closed_utc,
            opening_float: format_paise(s.opening_float_paise),
            counted_cash: s.counted_paise.map(format_paise),
            expected_cash: s.expected_paise.map(format_paise),
            variance: s.variance_paise.map(format_paise),
            needs_approval: s.needs_approval,
            approved_by: s.approved_by.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PettyCashDto {
    pub entry_id: Uuid,
    pub amount: String,
    pub purpose: String,
    pub created_utc: DateTime<Utc>,
}

impl From<&PettyCashEntry> for PettyCashDto {
    fn from(e: &PettyCashEntry) -> Self {
        Self {
            entry_id: e.entry_id,
            amount: format_paise(e.amount_paise),
            purpose: e.purpose.clone(),
            created_utc: e.created_utc,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TillAdjustmentDto {
    pub adjustment_id: Uuid,
    pub direction: String,
    pub amount: String,
    pub reason: String,
    pub created_utc: DateTime<Utc>,
}

impl From<&TillAdjustment> for TillAdjustmentDto {
    fn from(a: &TillAdjustment) -> Self {
        Self {
            adjustment_id: a.adjustment_id,
            direction: a.direction.clone(),
            amount: format_paise(a.amount_paise),
            reason: a.reason.clone(),
            created_utc: a.created_utc,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SessionDetailResponse {
    #[serde(flatten)]
    pub session: SessionDto,
    pub live_expected_cash: String,
    pub payment_hints: Vec<PaymentHintDto>,
    pub petty_cash: Vec<PettyCashDto>,
    pub adjustments: Vec<TillAdjustmentDto>,
}

impl From<&SessionView> for SessionDetailResponse {
    fn from(view: &SessionView) -> Self {
        Self {
            session: SessionDto::from(&view.session),
            live_expected_cash: format_paise(view.live_expected_paise),
            payment_hints: view.hints.iter().map(PaymentHintDto::from).collect(),
            petty_cash: view.petty_cash.iter().map(PettyCashDto::from).collect(),
            adjustments: view
                .adjustments
                .iter()
                .map(TillAdjustmentDto::from)
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_paise_with_two_fraction_digits() {
        assert_eq!(format_paise(123450), "1234.50");
        assert_eq!(format_paise(100), "1.00");
        assert_eq!(format_paise(5), "0.05");
        assert_eq!(format_paise(0), "0.00");
        assert_eq!(format_paise(-50_000), "-500.00");
    }
}
