//! Sync trigger and status handlers.

use crate::dtos::{ProbeResponse, SyncRunResponse};
use crate::services::sync::CycleOutcome;
use crate::startup::AppState;
use axum::{Json, extract::State, http::StatusCode};
use service_core::error::AppError;

/// Trigger a sync cycle now. Funnels through the same single-flight entry
/// point as the scheduler; a cycle already in flight answers 409.
#[tracing::instrument(skip(state))]
pub async fn run_sync(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<SyncRunResponse>), AppError> {
    match state.sync.run_cycle().await? {
        CycleOutcome::Completed(summary) => Ok((
            StatusCode::OK,
            Json(SyncRunResponse {
                outcome: "completed".to_string(),
                bills_synced: Some(summary.bills_synced),
                receipts_synced: Some(summary.receipts_synced),
                mapped_count: Some(summary.mapped_count),
                bills_skipped: Some(summary.bills_skipped),
                receipts_skipped: Some(summary.receipts_skipped),
            }),
        )),
        CycleOutcome::SkippedBusy => Ok((
            StatusCode::CONFLICT,
            Json(SyncRunResponse {
                outcome: "skipped".to_string(),
                bills_synced: None,
                receipts_synced: None,
                mapped_count: None,
                bills_skipped: None,
                receipts_skipped: None,
            }),
        )),
    }
}

/// Snapshot of the sync engine: in-progress flag, last outcome, last summary.
#[tracing::instrument(skip(state))]
pub async fn sync_status(State(state): State<AppState>) -> Json<crate::services::sync::SyncState> {
    Json(state.sync.state())
}

/// Re-probe both upstream channels and report the pinned method.
#[tracing::instrument(skip(state))]
pub async fn probe_source(State(state): State<AppState>) -> Json<ProbeResponse> {
    let method = state.source.probe().await;
    Json(ProbeResponse {
        method: method.as_str().to_string(),
    })
}
