//! Sync pipeline: pulls vouchers from the upstream source, upserts them
//! into the store, and runs the auto-mapper.
//!
//! Exactly one cycle runs at a time. The scheduler tick and the on-demand
//! trigger funnel through the same [`SyncEngine::run_cycle`] entry point; a
//! trigger that arrives mid-cycle is skipped outright, never queued.

use crate::error::DispatchError;
use crate::services::database::Database;
use crate::services::mapping::map_unmapped;
use crate::services::metrics::{
    record_sync_cycle, record_vouchers_skipped, record_vouchers_synced,
};
use crate::services::upstream::{ConnectionMethod, RawVoucher, SourceRouter, VoucherSource};
use crate::services::voucher::{BillUpsert, ReceiptUpsert, normalize_bill, normalize_receipt};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::sync::{Arc, Mutex};
use tracing::{error, info, instrument, warn};

/// What one completed cycle did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CycleSummary {
    pub bills_synced: u64,
    pub receipts_synced: u64,
    pub mapped_count: u64,
    pub bills_skipped: u64,
    pub receipts_skipped: u64,
}

/// Result of asking for a cycle: it either ran or was skipped because one
/// was already in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    Completed(CycleSummary),
    SkippedBusy,
}

/// Snapshot of the engine for `GET /sync/status`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncState {
    pub in_progress: bool,
    pub last_started_utc: Option<DateTime<Utc>>,
    pub last_finished_utc: Option<DateTime<Utc>>,
    /// `completed`, `failed`, or `skipped`; absent until the first cycle.
    pub last_outcome: Option<String>,
    pub last_error: Option<String>,
    pub last_summary: Option<CycleSummary>,
}

pub struct SyncEngine {
    db: Database,
    source: Arc<SourceRouter>,
    window_days: i64,
    /// Single-flight guard. `try_lock` failing means a cycle is running.
    guard: tokio::sync::Mutex<()>,
    state: Mutex<SyncState>,
}

impl SyncEngine {
    pub fn new(db: Database, source: Arc<SourceRouter>, window_days: i64) -> Self {
        Self {
            db,
            source,
            window_days,
            guard: tokio::sync::Mutex::new(()),
            state: Mutex::new(SyncState::default()),
        }
    }

    pub fn state(&self) -> SyncState {
        self.state.lock().expect("sync state lock poisoned").clone()
    }

    /// Run one sync cycle, or skip if one is already in flight.
    ///
    /// The guard is released when `_permit` drops, on every exit path, so a
    /// failed cycle can never wedge the scheduler.
    #[instrument(skip(self))]
    pub async fn run_cycle(&self) -> Result<CycleOutcome, DispatchError> {
        let Ok(_permit) = self.guard.try_lock() else {
            info!("Sync cycle already in progress, skipping trigger");
            record_sync_cycle("skipped");
            return Ok(CycleOutcome::SkippedBusy);
        };

        {
            let mut state = self.state.lock().expect("sync state lock poisoned");
            state.in_progress = true;
            state.last_started_utc = Some(Utc::now());
        }

        let result = self.run_cycle_inner().await;

        let mut state = self.state.lock().expect("sync state lock poisoned");
        state.in_progress = false;
        state.last_finished_utc = Some(Utc::now());
        match &result {
            Ok(summary) => {
                state.last_outcome = Some("completed".to_string());
                state.last_error = None;
                state.last_summary = Some(*summary);
                record_sync_cycle("completed");
            }
            Err(e) => {
                state.last_outcome = Some("failed".to_string());
                state.last_error = Some(e.to_string());
                record_sync_cycle("failed");
            }
        }
        drop(state);

        result.map(CycleOutcome::Completed)
    }

    async fn run_cycle_inner(&self) -> Result<CycleSummary, DispatchError> {
        if self.source.method() == ConnectionMethod::None {
            return Err(DispatchError::SourceUnavailable(
                "no upstream channel connected; cycle skipped until next probe".to_string(),
            ));
        }

        let from = (Utc::now() - Duration::days(self.window_days)).date_naive();
        let mut summary = CycleSummary::default();

        // Bills phase. A store failure here fails the whole cycle; the
        // receipts phase is not attempted until the next tick.
        let raw_bills = self
            .source
            .fetch_bills(from)
            .await
            .map_err(|e| DispatchError::SourceUnavailable(e.to_string()))?;
        let (bills, bills_skipped) = normalize_bills(&raw_bills);
        summary.bills_skipped = bills_skipped;
        summary.bills_synced = self.db.upsert_bills(&bills).await?;
        record_vouchers_synced("bill", summary.bills_synced);
        record_vouchers_skipped("bill", bills_skipped);

        // Receipts phase.
        let raw_receipts = self
            .source
            .fetch_receipts(from)
            .await
            .map_err(|e| DispatchError::SourceUnavailable(e.to_string()))?;
        let (receipts, receipts_skipped) = normalize_receipts(&raw_receipts);
        summary.receipts_skipped = receipts_skipped;
        summary.receipts_synced = self.db.upsert_receipts(&receipts).await?;
        record_vouchers_synced("receipt", summary.receipts_synced);
        record_vouchers_skipped("receipt", receipts_skipped);

        summary.mapped_count = map_unmapped(&self.db).await?;

        info!(
            bills_synced = summary.bills_synced,
            receipts_synced = summary.receipts_synced,
            mapped_count = summary.mapped_count,
            bills_skipped = summary.bills_skipped,
            receipts_skipped = summary.receipts_skipped,
            "Sync cycle completed"
        );

        Ok(summary)
    }
}

fn normalize_bills(raw: &[RawVoucher]) -> (Vec<BillUpsert>, u64) {
    let mut bills = Vec::with_capacity(raw.len());
    let mut skipped = 0;
    for record in raw {
        match normalize_bill(record) {
            Ok(bill) => bills.push(bill),
            Err(e) => {
                warn!(voucher_no = %record.voucher_no, error = %e, "Dropping malformed bill voucher");
                skipped += 1;
            }
        }
    }
    (bills, skipped)
}

fn normalize_receipts(raw: &[RawVoucher]) -> (Vec<ReceiptUpsert>, u64) {
    let mut receipts = Vec::with_capacity(raw.len());
    let mut skipped = 0;
    for record in raw {
        match normalize_receipt(record) {
            Ok(receipt) => receipts.push(receipt),
            Err(e) => {
                warn!(voucher_no = %record.voucher_no, error = %e, "Dropping malformed receipt voucher");
                skipped += 1;
            }
        }
    }
    (receipts, skipped)
}

/// Scheduler loop: trigger a cycle every `interval_secs`. Runs until the
/// process stops; a failed or skipped cycle never stops the loop.
pub async fn run_scheduler(engine: Arc<SyncEngine>, interval_secs: u64) {
    let mut interval = tokio::time::interval(std::time::Duration::from_secs(interval_secs));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    info!(interval_secs = interval_secs, "Sync scheduler started");

    loop {
        interval.tick().await;
        if let Err(e) = engine.run_cycle().await {
            error!(error = %e, "Scheduled sync cycle failed");
        }
    }
}
