//! Bill detail and dashboard query handlers.

use crate::dtos::{
    BillDetailResponse, DashboardQuery, DashboardReleaseCounts, DashboardResponse,
    DashboardStatusCounts, GateLogDto, PaymentHintDto, ReceiptDto, ReleaseDto,
};
use crate::error::DispatchError;
use crate::models::{BillStatus, ReleaseState, ReleaseVariant};
use crate::services::status::{derive_financials, derive_release_state};
use crate::startup::AppState;
use axum::{
    Json,
    extract::{Path, Query, State},
};
use service_core::error::AppError;

/// Full view of a bill: derived financials, mapped receipts, payment hints,
/// release record, and gate history.
#[tracing::instrument(skip(state))]
pub async fn get_bill(
    State(state): State<AppState>,
    Path(voucher_no): Path<String>,
) -> Result<Json<BillDetailResponse>, AppError> {
    let snapshot = state
        .db
        .bill_snapshot(&voucher_no)
        .await?
        .ok_or_else(|| DispatchError::BillNotFound(voucher_no.clone()))?;

    let financials = derive_financials(snapshot.amount_paise, snapshot.receipt_total_paise);
    let release_state = derive_release_state(
        snapshot.release_variant.as_deref(),
        snapshot.delivered_utc.is_some(),
    );

    let bill = state
        .db
        .get_bill(&voucher_no)
        .await?
        .ok_or_else(|| DispatchError::BillNotFound(voucher_no.clone()))?;
    let receipts = state.db.receipts_for_bill(&voucher_no).await?;
    let hints = state.db.hints_for_bill(&voucher_no).await?;
    let gate_entries = state.db.gate_entries_for_bill(&voucher_no).await?;

    let release = match state.db.get_release(&voucher_no).await? {
        Some(registry) => {
            let (self_detail, transporter_detail) =
                match ReleaseVariant::from_str(&registry.variant) {
                    ReleaseVariant::SelfPickup => {
                        (state.db.get_release_self(&voucher_no).await?, None)
                    }
                    ReleaseVariant::Transporter => {
                        (None, state.db.get_release_transporter(&voucher_no).await?)
                    }
                };
            Some(ReleaseDto::new(
                &registry,
                self_detail.as_ref(),
                transporter_detail.as_ref(),
            ))
        }
        None => None,
    };

    Ok(Json(BillDetailResponse {
        voucher_no: bill.voucher_no,
        bill_date: bill.bill_date,
        party: bill.party,
        amount: crate::dtos::format_paise(bill.amount_paise),
        receipt_total: crate::dtos::format_paise(financials.receipt_total_paise),
        remaining_due: crate::dtos::format_paise(financials.remaining_due_paise),
        overpaid: crate::dtos::format_paise(financials.overpaid_paise),
        status: financials.status.as_str().to_string(),
        release_state: release_state.as_str().to_string(),
        last_sync_utc: bill.last_sync_utc,
        receipts: receipts.iter().map(ReceiptDto::from).collect(),
        payment_hints: hints.iter().map(PaymentHintDto::from).collect(),
        release,
        gate_log: gate_entries.iter().map(GateLogDto::from).collect(),
    }))
}

/// Counts by payment status and release state for bills dated on the query
/// date. Recomputed from the store on every call.
#[tracing::instrument(skip(state))]
pub async fn dashboard(
    State(state): State<AppState>,
    Query(query): Query<DashboardQuery>,
) -> Result<Json<DashboardResponse>, AppError> {
    let snapshots = state.db.bills_for_date(query.date).await?;

    let mut by_status = DashboardStatusCounts::default();
    let mut by_release_state = DashboardReleaseCounts::default();

    for snapshot in &snapshots {
        let financials = derive_financials(snapshot.amount_paise, snapshot.receipt_total_paise);
        match financials.status {
            BillStatus::Due => by_status.due += 1,
            BillStatus::PartPaid => by_status.part_paid += 1,
            BillStatus::Paid => by_status.paid += 1,
        }
        match derive_release_state(
            snapshot.release_variant.as_deref(),
            snapshot.delivered_utc.is_some(),
        ) {
            ReleaseState::Ready => by_release_state.ready += 1,
            ReleaseState::ReleasedSelf => by_release_state.released_self += 1,
            ReleaseState::InTransit => by_release_state.in_transit += 1,
            ReleaseState::Delivered => by_release_state.delivered += 1,
        }
    }

    Ok(Json(DashboardResponse {
        date: query.date,
        bills_total: snapshots.len() as u64,
        by_status,
        by_release_state,
    }))
}
