//! Domain models for dispatch-service.

#![allow(clippy::should_implement_trait)]

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::FromRow;
use uuid::Uuid;

// ============================================================================
// Voucher Models
// ============================================================================

/// Payment mode classified from the receipt narration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentMode {
    Cash,
    Cheque,
    Digital,
}

impl PaymentMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cash => "cash",
            Self::Cheque => "cheque",
            Self::Digital => "digital",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "cheque" => Self::Cheque,
            "digital" => Self::Digital,
            _ => Self::Cash,
        }
    }
}

/// A sales voucher pulled from the upstream accounting package.
#[derive(Debug, Clone, FromRow)]
pub struct Bill {
    pub voucher_no: String,
    pub bill_date: NaiveDate,
    pub party: String,
    pub amount_paise: i64,
    pub last_sync_utc: DateTime<Utc>,
}

/// A receipt voucher. `bill_ref` is the explicit reference extracted from
/// the narration; `bill_no` is the mapping link set once by the auto-mapper.
#[derive(Debug, Clone, FromRow)]
pub struct Receipt {
    pub receipt_no: String,
    pub receipt_date: NaiveDate,
    pub party: String,
    pub amount_paise: i64,
    pub mode: String,
    pub reference: Option<String>,
    pub bill_ref: Option<String>,
    pub bill_no: Option<String>,
    pub last_sync_utc: DateTime<Utc>,
}

// ============================================================================
// Derived Status Models
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BillStatus {
    Due,
    PartPaid,
    Paid,
}

impl BillStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Due => "DUE",
            Self::PartPaid => "PART-PAID",
            Self::Paid => "PAID",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "PAID" => Self::Paid,
            "PART-PAID" => Self::PartPaid,
            _ => Self::Due,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseState {
    Ready,
    ReleasedSelf,
    InTransit,
    Delivered,
}

impl ReleaseState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ready => "READY",
            Self::ReleasedSelf => "RELEASED_SELF",
            Self::InTransit => "IN_TRANSIT",
            Self::Delivered => "DELIVERED",
        }
    }
}

/// Payment position of a bill, recomputed from mapped receipts on read.
/// `remaining_due_paise` is clamped at zero; an excess shows up in
/// `overpaid_paise` instead of going negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BillFinancials {
    pub receipt_total_paise: i64,
    pub remaining_due_paise: i64,
    pub overpaid_paise: i64,
    pub status: BillStatus,
}

/// A bill joined with its receipt total and release columns, as read for
/// status derivation and the dashboard.
#[derive(Debug, Clone, FromRow)]
pub struct BillSnapshot {
    pub voucher_no: String,
    pub bill_date: NaiveDate,
    pub party: String,
    pub amount_paise: i64,
    pub receipt_total_paise: i64,
    pub release_variant: Option<String>,
    pub delivered_utc: Option<DateTime<Utc>>,
}

// ============================================================================
// Cashier Session Models
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Active,
    Closed,
    Approved,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Closed => "closed",
            Self::Approved => "approved",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "closed" => Self::Closed,
            "approved" => Self::Approved,
            _ => Self::Active,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct CashierSession {
    pub session_id: Uuid,
    pub cashier: String,
    pub opened_utc: DateTime<Utc>,
    pub closed_utc: Option<DateTime<Utc>>,
    pub opening_float_paise: i64,
    pub counted_paise: Option<i64>,
    pub expected_paise: Option<i64>,
    pub variance_paise: Option<i64>,
    pub needs_approval: bool,
    pub status: String,
    pub approved_by: Option<String>,
}

/// Cashier-entered record of how a bill was paid at the counter. Hints feed
/// session reconciliation; they never affect the mapped receipt totals.
#[derive(Debug, Clone, FromRow)]
pub struct PaymentHint {
    pub hint_id: Uuid,
    pub bill_no: String,
    pub session_id: Uuid,
    pub cashier: String,
    pub cash_paise: i64,
    pub cheque_paise: i64,
    pub digital_paise: i64,
    pub reference: Option<String>,
    pub created_utc: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct PettyCashEntry {
    pub entry_id: Uuid,
    pub session_id: Uuid,
    pub amount_paise: i64,
    pub purpose: String,
    pub created_utc: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdjustmentDirection {
    Add,
    Remove,
}

impl AdjustmentDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Remove => "remove",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "remove" => Self::Remove,
            _ => Self::Add,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct TillAdjustment {
    pub adjustment_id: Uuid,
    pub session_id: Uuid,
    pub direction: String,
    pub amount_paise: i64,
    pub reason: String,
    pub created_utc: DateTime<Utc>,
}

// ============================================================================
// Release Models
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseVariant {
    SelfPickup,
    Transporter,
}

impl ReleaseVariant {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SelfPickup => "self",
            Self::Transporter => "transporter",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "transporter" => Self::Transporter,
            _ => Self::SelfPickup,
        }
    }
}

/// How a part-paid release was authorized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalKind {
    None,
    Pin,
    Otp,
}

impl ApprovalKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Pin => "pin",
            Self::Otp => "otp",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "pin" => Self::Pin,
            "otp" => Self::Otp,
            _ => Self::None,
        }
    }
}

/// Registry row: one per released bill, one per gatepass, both enforced by
/// the store. Written exactly once and never updated.
#[derive(Debug, Clone, FromRow)]
pub struct Release {
    pub bill_no: String,
    pub gatepass_no: String,
    pub variant: String,
    pub released_by: String,
    pub approved_by: Option<String>,
    pub approval: String,
    pub released_utc: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct ReleaseSelfDetail {
    pub bill_no: String,
    pub receiver_name: String,
    pub receiver_phone: String,
}

#[derive(Debug, Clone, FromRow)]
pub struct ReleaseTransporterDetail {
    pub bill_no: String,
    pub transporter_name: String,
    pub vehicle_no: String,
    pub driver_name: String,
    pub driver_phone: String,
    pub lr_no: Option<String>,
    pub delivered_utc: Option<DateTime<Utc>>,
    pub pod_reference: Option<String>,
}

#[derive(Debug, Clone, FromRow)]
pub struct GateLogEntry {
    pub gatepass_no: String,
    pub bill_no: String,
    pub logged_by: String,
    pub vehicle_no: Option<String>,
    pub remarks: Option<String>,
    pub logged_utc: DateTime<Utc>,
}
